// handlers/protected/auth.rs - GET /api/auth/whoami handler

use axum::Extension;

use crate::auth::Principal;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/auth/whoami - the user the bearer token resolves to, as stored now
pub async fn whoami_get(Extension(principal): Extension<Principal>) -> ApiResult<Principal> {
    Ok(ApiResponse::success(principal))
}
