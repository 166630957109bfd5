//! JWT authentication middleware.
//!
//! Extracts the token from `Authorization: Bearer <token>` and
//! validates it through the directory service, which checks the
//! signature, the expiry, and that the session has not been revoked.
//! The decoded `Claims` are stored in request extensions for handlers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use directory::service::DirectoryService;
use esurat_core::ServiceError;

/// Paths reachable without a token.
fn is_public_path(path: &str) -> bool {
    matches!(path, "/" | "/health" | "/version" | "/directory/login")
}

pub async fn auth_middleware(
    State(directory): State<Arc<DirectoryService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if is_public_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::Unauthorized("missing authorization token".into()))?;

    let claims = directory.verify_token(token)?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
