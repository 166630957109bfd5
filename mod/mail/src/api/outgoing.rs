use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use esurat_core::{Claims, ListParams, ListResult, ServiceError};

use crate::api::{AppState, require_outgoing_input};
use crate::model::{CreateOutgoingMail, OutgoingMail};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/outgoing", get(list_outgoing).post(create_outgoing))
        .route("/outgoing/{id}", get(get_outgoing).put(update_outgoing))
}

async fn list_outgoing(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<OutgoingMail>>, ServiceError> {
    Ok(Json(svc.list_outgoing(&params)?))
}

async fn create_outgoing(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<CreateOutgoingMail>,
) -> Result<(StatusCode, Json<OutgoingMail>), ServiceError> {
    require_outgoing_input(&claims)?;
    Ok((StatusCode::CREATED, Json(svc.add_outgoing_mail(input)?)))
}

async fn get_outgoing(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OutgoingMail>, ServiceError> {
    Ok(Json(svc.get_outgoing(&id)?))
}

async fn update_outgoing(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<OutgoingMail>, ServiceError> {
    require_outgoing_input(&claims)?;
    Ok(Json(svc.update_outgoing(&id, patch)?))
}
