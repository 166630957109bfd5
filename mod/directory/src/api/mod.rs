mod login;
mod me;
mod users;

use std::sync::Arc;

use axum::Router;

use esurat_core::{Claims, ServiceError};

use crate::service::DirectoryService;

/// Shared application state.
pub type AppState = Arc<DirectoryService>;

/// Guard for account-management endpoints.
fn require_superadmin(claims: &Claims) -> Result<(), ServiceError> {
    if claims.is_superadmin() {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(
            "superadmin privileges required".into(),
        ))
    }
}

/// Build the directory API router.
///
/// All routes are relative — the caller nests them under `/directory`
/// and layers the JWT middleware on top.
pub fn build_router(svc: Arc<DirectoryService>) -> Router {
    Router::new()
        .merge(login::routes())
        .merge(me::routes())
        .merge(users::routes())
        .with_state(svc)
}
