// handlers/protected/courses.rs - /api/courses handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::Course;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::courses::{CourseInfo, CourseSettings, NewCourse};
use crate::services::AppState;
use crate::types::CourseRole;

/// POST /api/courses - create a course with its first section and lection
pub async fn course_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<NewCourse>,
) -> ApiResult<Course> {
    let course = state.courses().create_course(&principal, body).await?;
    Ok(ApiResponse::created(course))
}

/// GET /api/courses/:course - course overview with sections and blocks
pub async fn course_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<CourseInfo> {
    Ok(ApiResponse::success(state.courses().course_info(&principal, course_id).await?))
}

/// PATCH /api/courses/:course - title, description, accessibility, join code
pub async fn course_patch(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
    Json(body): Json<CourseSettings>,
) -> ApiResult<Course> {
    Ok(ApiResponse::success(
        state.courses().update_settings(&principal, course_id, body).await?,
    ))
}

/// DELETE /api/courses/:course
pub async fn course_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<()> {
    state.courses().delete_course(&principal, course_id).await?;
    Ok(ApiResponse::no_content())
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub course_id: Uuid,
    pub role: Option<CourseRole>,
}

/// GET /api/courses/:course/role - the caller's effective role
pub async fn role_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<RoleResponse> {
    let role = state.membership().my_role(&principal, course_id).await?;
    Ok(ApiResponse::success(RoleResponse { course_id, role }))
}
