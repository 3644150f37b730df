// handlers/public/system.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::services::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "learnhub-api",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Learning platform backend: courses, join requests and timed tests",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/register (public - token acquisition)",
                "auth": "/api/auth/whoami (protected)",
                "courses": "/api/courses[/:course] (protected)",
                "content": "/api/sections/:section, /api/blocks/:block (protected)",
                "tests": "/api/tests/:test[/questions|/sessions] (protected)",
                "sessions": "/api/sessions/:token (protected)",
                "admin": "/api/admin/* (staff only)",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
