use axum::extract::{Extension, Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

use esurat_core::{Claims, ListParams, ServiceError};

use crate::api::{AppState, require_superadmin};
use crate::model::{CreateUser, UpdateAuthority, UpdatePermissions};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/{id}/authority", put(update_authority))
        .route("/users/{id}/permissions", put(update_permissions))
        .route("/users/{id}/subordinates", get(get_subordinates))
}

/// Query parameters for the user list. Kept flat because axum's Query
/// extractor cannot flatten ListParams next to extra fields.
#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

async fn list_users(
    State(svc): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let mut params = ListParams::default();
    if let Some(limit) = query.limit {
        params.limit = limit;
    }
    if let Some(offset) = query.offset {
        params.offset = offset;
    }
    params.q = query.q;

    let result = svc.search_users(&params, query.role.as_deref())?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}

async fn create_user(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<CreateUser>,
) -> Result<(axum::http::StatusCode, Json<serde_json::Value>), ServiceError> {
    require_superadmin(&claims)?;
    let user = svc.create_user(input)?;
    Ok((axum::http::StatusCode::CREATED, Json(user.public_json())))
}

async fn get_user(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let user = svc.get_user_record(&id)?;
    Ok(Json(user.public_json()))
}

async fn update_user(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    require_superadmin(&claims)?;
    let user = svc.update_user(&id, patch)?;
    Ok(Json(user.public_json()))
}

async fn delete_user(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<axum::http::StatusCode, ServiceError> {
    require_superadmin(&claims)?;
    svc.delete_user(&id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn update_authority(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(input): Json<UpdateAuthority>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    require_superadmin(&claims)?;
    let user = svc.update_authority(&id, input)?;
    Ok(Json(user.public_json()))
}

async fn update_permissions(
    State(svc): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(input): Json<UpdatePermissions>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    require_superadmin(&claims)?;
    let user = svc.update_permissions(&id, input)?;
    Ok(Json(user.public_json()))
}

async fn get_subordinates(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    use esurat_core::UserDirectory;
    let subordinates = svc.direct_subordinates(&id)?;
    Ok(Json(serde_json::json!({"items": subordinates})))
}
