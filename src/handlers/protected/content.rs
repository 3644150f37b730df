// handlers/protected/content.rs - section and block handlers
//
// Sections:  /api/courses/:course/sections, /api/sections/:section
// Blocks:    /api/sections/:section/blocks, /api/blocks/:block
// Swaps:     /api/swap/sections, /api/swap/blocks

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::{CourseSection, SectionContent};
use crate::handlers::SwapRequest;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::courses::{BlockPatch, BlockView, NewBlock};
use crate::services::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SectionBody {
    pub section_name: Option<String>,
}

/// GET /api/courses/:course/sections
pub async fn sections_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Vec<CourseSection>> {
    Ok(ApiResponse::success(state.courses().list_sections(&principal, course_id).await?))
}

/// POST /api/courses/:course/sections - append a section; name defaults to SectionN
pub async fn section_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
    body: Option<Json<SectionBody>>,
) -> ApiResult<CourseSection> {
    let name = body.and_then(|Json(b)| b.section_name);
    let section = state.courses().create_section(&principal, course_id, name).await?;
    Ok(ApiResponse::created(section))
}

/// PATCH /api/sections/:section - rename
pub async fn section_patch(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(section_id): Path<Uuid>,
    Json(body): Json<SectionBody>,
) -> ApiResult<CourseSection> {
    let name = body.section_name.unwrap_or_default();
    Ok(ApiResponse::success(
        state.courses().rename_section(&principal, section_id, name).await?,
    ))
}

/// DELETE /api/sections/:section - removes its blocks too
pub async fn section_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(section_id): Path<Uuid>,
) -> ApiResult<()> {
    state.courses().delete_section(&principal, section_id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/swap/sections
pub async fn sections_swap(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<SwapRequest>,
) -> ApiResult<()> {
    state.courses().swap_sections(&principal, body.first, body.second).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/sections/:section/blocks
pub async fn blocks_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(section_id): Path<Uuid>,
) -> ApiResult<Vec<SectionContent>> {
    Ok(ApiResponse::success(state.courses().list_blocks(&principal, section_id).await?))
}

/// POST /api/sections/:section/blocks - lection or test block
pub async fn block_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(section_id): Path<Uuid>,
    Json(body): Json<NewBlock>,
) -> ApiResult<BlockView> {
    let view = state.courses().create_block(&principal, section_id, body).await?;
    Ok(ApiResponse::created(view))
}

/// GET /api/blocks/:block - block content plus test config for test blocks
pub async fn block_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(block_id): Path<Uuid>,
) -> ApiResult<BlockView> {
    Ok(ApiResponse::success(state.courses().get_block(&principal, block_id).await?))
}

/// PATCH /api/blocks/:block
pub async fn block_patch(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(block_id): Path<Uuid>,
    Json(body): Json<BlockPatch>,
) -> ApiResult<SectionContent> {
    Ok(ApiResponse::success(
        state.courses().update_block(&principal, block_id, body).await?,
    ))
}

/// DELETE /api/blocks/:block
pub async fn block_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(block_id): Path<Uuid>,
) -> ApiResult<()> {
    state.courses().delete_block(&principal, block_id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/swap/blocks
pub async fn blocks_swap(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<SwapRequest>,
) -> ApiResult<()> {
    state.courses().swap_blocks(&principal, body.first, body.second).await?;
    Ok(ApiResponse::no_content())
}
