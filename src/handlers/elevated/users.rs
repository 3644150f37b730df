// handlers/elevated/users.rs - GET /api/admin/users, PUT /api/admin/users/:user/status

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AppState;
use crate::types::{GlobalRole, ModerationStatus};

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<GlobalRole>,
    pub status: Option<ModerationStatus>,
}

/// GET /api/admin/users[?role=teacher&status=on_moderation]
pub async fn users_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Vec<User>> {
    Ok(ApiResponse::success(
        state.users().list_users(&principal, filter.role, filter.status).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ModerationStatus,
}

/// PUT /api/admin/users/:user/status - approve or reject a teacher
pub async fn user_status_put(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(
        state.users().moderate(&principal, user_id, body.status).await?,
    ))
}
