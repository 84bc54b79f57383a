//! Authentication middleware for protected routes.
//!
//! Extracts the bearer token, verifies it, resolves the subject to a local
//! `Principal` (provisioning on first sight) and stores the principal in
//! request extensions for handlers.

use crate::errors::QsError;
use crate::models::Principal;
use crate::routes::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

fn extract_bearer_token(req: &Request) -> Result<&str, QsError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "qs.middleware.auth", "Missing Authorization header");
            QsError::TokenInvalid
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "qs.middleware.auth", "Invalid Authorization header format");
            QsError::TokenInvalid
        })
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 with `INVALID_TOKEN` when the token is missing or fails verification
/// - 401 with `ACCESS_DENIED` when the subject cannot be resolved
/// - otherwise continues with the `Principal` in extensions
#[instrument(skip_all, name = "qs.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, QsError> {
    let token = extract_bearer_token(&req)?;

    let subject = state.verifier.verify(token).await?;
    let principal: Principal = state.identity.resolve(&subject).await?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}
