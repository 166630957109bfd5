//! Administrative endpoints.

use axum::extract::{Extension, State};
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use esurat_core::{Claims, ServiceError};

use crate::routes::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/reset", post(reset))
        .with_state(state)
}

/// POST /admin/reset — wipe the whole deployment back to its seeded
/// state: ledger tables, number counters, accounts, and sessions. The
/// classification catalog is kept. Superadmin only.
async fn reset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    if !claims.is_superadmin() {
        return Err(ServiceError::PermissionDenied(
            "superadmin privileges required".into(),
        ));
    }

    info!("factory reset requested by {}", claims.name);
    let mail = state.mail.reset_ledger()?;
    let directory = state.directory.reset_accounts()?;

    // Keep the operator-configured credential across the re-seed.
    if let Some(sa) = &state.config.superadmin {
        state
            .directory
            .apply_password_hash("superadmin", &sa.password_hash)?;
    }

    Ok(Json(serde_json::json!({
        "mail": mail,
        "directory": directory,
    })))
}
