// handlers/public/auth.rs - POST /auth/register handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{generate_jwt, Claims};
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AppState;
use crate::types::GlobalRole;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default = "default_role")]
    pub role: GlobalRole,
}

fn default_role() -> GlobalRole {
    GlobalRole::Student
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
    pub token: String,
    pub expires_in: u64,
}

/// POST /auth/register - create a student or teacher account and issue a token
///
/// Teachers start `on_moderation` and cannot author courses until staff
/// approve them.
pub async fn register_post(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<RegisterResponse> {
    let user = state.users().register(body.username.trim(), body.role).await?;

    let security = &state.config.security;
    let token = generate_jwt(&Claims::for_user(&user, security), &security.jwt_secret)?;

    Ok(ApiResponse::created(RegisterResponse {
        user,
        token,
        expires_in: security.jwt_expiry_hours * 3600,
    }))
}
