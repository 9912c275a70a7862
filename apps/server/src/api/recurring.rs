//! Recurring schedule endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use accountant_core::recurring::{
    NewRecurringSchedule, RecurringSchedule, RecurringScheduleList, RecurringScheduleUpdate,
    RecurringTriggerResult,
};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::main_lib::AppState;

#[derive(Debug, Deserialize)]
struct ListSchedulesQuery {
    is_active: Option<bool>,
    skip: Option<i64>,
    limit: Option<i64>,
}

async fn list_schedules(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListSchedulesQuery>,
) -> ApiResult<Json<RecurringScheduleList>> {
    let list = state.recurring_service.list_schedules(
        &user.user_id,
        query.is_active,
        query.skip,
        query.limit,
    )?;
    Ok(Json(list))
}

async fn create_schedule(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<NewRecurringSchedule>,
) -> ApiResult<(StatusCode, Json<RecurringSchedule>)> {
    let schedule = state
        .recurring_service
        .create_schedule(&user.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

async fn trigger(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<RecurringTriggerResult>> {
    let result = state.recurring_service.trigger(&user.user_id).await?;
    info!(
        "Recurring trigger for user {}: {} schedules, {} instances",
        user.user_id,
        result.processed_count,
        result.created_transaction_ids.len()
    );
    Ok(Json(result))
}

async fn get_schedule(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(schedule_id): Path<String>,
) -> ApiResult<Json<RecurringSchedule>> {
    Ok(Json(
        state
            .recurring_service
            .get_schedule(&user.user_id, &schedule_id)?,
    ))
}

async fn update_schedule(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(schedule_id): Path<String>,
    Json(body): Json<RecurringScheduleUpdate>,
) -> ApiResult<Json<RecurringSchedule>> {
    let schedule = state
        .recurring_service
        .update_schedule(&user.user_id, &schedule_id, body)
        .await?;
    Ok(Json(schedule))
}

async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(schedule_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .recurring_service
        .delete_schedule(&user.user_id, &schedule_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recurring", get(list_schedules).post(create_schedule))
        .route("/recurring/trigger", post(trigger))
        .route(
            "/recurring/:schedule_id",
            get(get_schedule).put(update_schedule).delete(delete_schedule),
        )
}
