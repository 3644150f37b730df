// handlers/elevated/members.rs - staff overrides on course membership

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AppState;
use crate::types::CourseRole;

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[serde(default = "default_role")]
    pub role: CourseRole,
}

fn default_role() -> CourseRole {
    CourseRole::Student
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: CourseRole,
}

/// POST /api/admin/courses/:course/members
pub async fn member_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
    Json(body): Json<AddMemberRequest>,
) -> ApiResult<()> {
    state
        .membership()
        .admin_add_member(&principal, course_id, body.user_id, body.role)
        .await?;
    Ok(ApiResponse::no_content())
}

/// DELETE /api/admin/courses/:course/members/:user
pub async fn member_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((course_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    state.membership().admin_remove_member(&principal, course_id, user_id).await?;
    Ok(ApiResponse::no_content())
}

/// PUT /api/admin/courses/:course/members/:user/role - any course role
pub async fn member_role_put(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((course_id, user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SetRoleRequest>,
) -> ApiResult<()> {
    state
        .membership()
        .admin_set_role(&principal, course_id, user_id, body.role)
        .await?;
    Ok(ApiResponse::no_content())
}
