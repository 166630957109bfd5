//! Route registration — module routes + system endpoints.

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;

use directory::service::DirectoryService;
use mail::service::MailService;

use crate::auth_middleware;
use crate::config::ServerConfig;

/// Application shared state.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<DirectoryService>,
    pub mail: Arc<MailService>,
    pub config: Arc<ServerConfig>,
}

/// Build the complete router.
///
/// Module routers are already `Router<()>` (they called `.with_state()`
/// internally) and get nested under `/{module_name}`. The JWT
/// middleware wraps everything; public paths pass through inside it.
pub fn build_router(state: AppState, module_routes: Vec<(&str, Router)>) -> Router {
    let directory = state.directory.clone();

    let system_routes = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/version", get(version));

    let mut app: Router<()> = Router::new()
        .merge(crate::admin::routes(state))
        .merge(system_routes);

    for (name, router) in module_routes {
        app = app.nest(&format!("/{}", name), router);
    }

    app.layer(middleware::from_fn_with_state(
        directory,
        auth_middleware::auth_middleware,
    ))
}

async fn index() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "esuratd",
        "modules": ["directory", "mail"],
    }))
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "esuratd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
