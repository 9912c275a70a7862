//! Client sync endpoints.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use accountant_core::sync::{
    SyncPullRequest, SyncPullResponse, SyncPushRequest, SyncPushResponse, SyncStatusResponse,
};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::main_lib::AppState;

async fn push(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<SyncPushRequest>,
) -> ApiResult<Json<SyncPushResponse>> {
    Ok(Json(state.sync_service.push(&user.user_id, body).await?))
}

async fn pull(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<SyncPullRequest>,
) -> ApiResult<Json<SyncPullResponse>> {
    Ok(Json(state.sync_service.pull(&user.user_id, body)?))
}

async fn status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<SyncStatusResponse>> {
    Ok(Json(state.sync_service.status(&user.user_id)?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync/push", post(push))
        .route("/sync/pull", post(pull))
        .route("/sync/status", get(status))
}
