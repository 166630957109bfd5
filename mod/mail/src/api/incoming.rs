use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use esurat_core::{Claims, ListParams, ListResult, ServiceError};

use crate::api::{AppState, require_incoming_input};
use crate::model::{CreateIncomingMail, IncomingMail};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/incoming", get(list_incoming).post(create_incoming))
        .route("/incoming/{id}", get(get_incoming).put(update_incoming))
}

async fn list_incoming(
    State(svc): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResult<IncomingMail>>, ServiceError> {
    Ok(Json(svc.list_incoming(&params)?))
}

async fn create_incoming(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<CreateIncomingMail>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    require_incoming_input(&claims)?;
    let (mail, disposition) = svc.add_incoming_mail(input)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "mail": mail,
            "disposition": disposition,
        })),
    ))
}

async fn get_incoming(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IncomingMail>, ServiceError> {
    Ok(Json(svc.get_incoming(&id)?))
}

async fn update_incoming(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<IncomingMail>, ServiceError> {
    require_incoming_input(&claims)?;
    Ok(Json(svc.update_incoming(&id, patch)?))
}
