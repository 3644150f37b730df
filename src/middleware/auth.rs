use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{decode_jwt, Principal};
use crate::error::ApiError;
use crate::services::AppState;

/// JWT authentication middleware: validates the bearer token, reloads the user
/// so role and moderation status are current, and injects a `Principal`
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;
    let claims = decode_jwt(&token, &state.config.security.jwt_secret)?;

    let mut tx = state.store.begin().await?;
    let user = tx.user_by_id(claims.sub).await?.ok_or_else(|| {
        tracing::warn!("Token for unknown user {} ({})", claims.username, claims.sub);
        ApiError::unauthorized("User no longer exists")
    })?;
    drop(tx);

    tracing::debug!("Authenticated {} as {}", user.username, user.role);
    request.extensions_mut().insert(Principal::from(user));

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
