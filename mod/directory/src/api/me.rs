use axum::extract::{Extension, State};
use axum::routing::get;
use axum::{Json, Router};

use esurat_core::{Claims, ServiceError};

use crate::api::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

/// GET /directory/me — the current session identity.
///
/// Under substitution the stored permissions are the substitute's own;
/// the effective ones live in the claims, so they are layered on here
/// together with the `originalUser` marker.
async fn me(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let user = svc.get_user_record(&claims.sub)?;

    let mut view = user.public_json();
    if let Some(obj) = view.as_object_mut() {
        obj.insert(
            "canInputIncoming".into(),
            serde_json::json!(claims.can_input_incoming),
        );
        obj.insert(
            "canInputOutgoing".into(),
            serde_json::json!(claims.can_input_outgoing),
        );
        if let Some(original) = &claims.original_user {
            obj.insert("originalUser".into(), serde_json::json!(original));
        }
    }

    Ok(Json(view))
}
