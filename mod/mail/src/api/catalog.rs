use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use esurat_core::ServiceError;

use crate::api::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/classifications", get(list_classifications))
        .route("/signatories", get(list_signatories))
}

async fn list_classifications(
    State(svc): State<AppState>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let groups = svc.classifications()?;
    Ok(Json(serde_json::json!({"items": groups})))
}

async fn list_signatories(State(svc): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({"items": svc.signatories()}))
}
