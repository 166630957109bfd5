use axum::extract::{Extension, State};
use axum::routing::post;
use axum::{Json, Router};

use esurat_core::{Claims, ServiceError};

use crate::api::AppState;
use crate::model::LoginRequest;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// POST /directory/login — the only public directory endpoint.
async fn login(
    State(svc): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let resp = svc.login(&body.username, &body.password)?;
    Ok(Json(serde_json::to_value(resp).unwrap()))
}

/// POST /directory/logout — revoke the calling session.
async fn logout(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<axum::http::StatusCode, ServiceError> {
    svc.revoke_session(&claims.sid)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
