// handlers/elevated/sweep.rs - POST /api/admin/sweep

use axum::{extract::State, Extension};
use serde::Serialize;

use crate::auth::Principal;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{permissions, AppState};

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub finished: usize,
}

/// Close every expired session now instead of waiting for the periodic sweep
pub async fn sweep_post(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<SweepResponse> {
    permissions::require_staff(&principal)?;
    let finished = state.sessions().sweep_expired().await?;
    Ok(ApiResponse::success(SweepResponse { finished }))
}
