use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use esurat_core::ServiceError;

use crate::api::AppState;
use crate::service::MailStats;

pub fn routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}

async fn get_stats(State(svc): State<AppState>) -> Result<Json<MailStats>, ServiceError> {
    Ok(Json(svc.stats()?))
}
