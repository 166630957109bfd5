use axum::extract::{Extension, Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};

use esurat_core::{Claims, ListParams, ListResult, ServiceError};

use crate::api::AppState;
use crate::model::{Disposition, RouteCommand};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dispositions", get(list_dispositions))
        .route("/dispositions/targets", get(route_targets))
        .route("/dispositions/{id}", get(get_disposition))
        .route("/dispositions/{id}/route", put(route_disposition))
}

async fn list_dispositions(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<Disposition>>, ServiceError> {
    Ok(Json(svc.list_dispositions(&params, &claims)?))
}

/// Users the caller may route dispositions to. Claims-driven, the same
/// for every disposition the caller can act on.
async fn route_targets(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let targets = svc.route_targets(&claims)?;
    Ok(Json(serde_json::json!({"items": targets})))
}

async fn get_disposition(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Disposition>, ServiceError> {
    Ok(Json(svc.get_disposition_for(&id, &claims)?))
}

async fn route_disposition(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(cmd): Json<RouteCommand>,
) -> Result<Json<Disposition>, ServiceError> {
    Ok(Json(svc.route_disposition(&id, &claims, cmd)?))
}
