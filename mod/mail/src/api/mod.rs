mod catalog;
mod dispositions;
mod incoming;
mod outgoing;
mod stats;

use std::sync::Arc;

use axum::Router;

use esurat_core::{Claims, ServiceError};

use crate::service::MailService;

/// Shared application state.
pub type AppState = Arc<MailService>;

/// Guard for endpoints writing the incoming register.
fn require_incoming_input(claims: &Claims) -> Result<(), ServiceError> {
    if claims.can_input_incoming {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(
            "you are not allowed to register incoming mail".into(),
        ))
    }
}

/// Guard for endpoints writing the outgoing register.
fn require_outgoing_input(claims: &Claims) -> Result<(), ServiceError> {
    if claims.can_input_outgoing {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(
            "you are not allowed to register outgoing mail".into(),
        ))
    }
}

/// Build the mail API router.
///
/// All routes are relative — the caller nests them under `/mail` and
/// layers the JWT middleware on top.
pub fn build_router(svc: Arc<MailService>) -> Router {
    Router::new()
        .merge(incoming::routes())
        .merge(outgoing::routes())
        .merge(dispositions::routes())
        .merge(catalog::routes())
        .merge(stats::routes())
        .with_state(svc)
}
