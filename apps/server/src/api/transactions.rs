//! Transaction endpoints. Every write moves the wallet balance with it.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use accountant_core::transactions::{
    NewTransaction, Transaction, TransactionFilters, TransactionList, TransactionType,
    TransactionUpdate,
};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::main_lib::AppState;

#[derive(Debug, Deserialize)]
struct ListTransactionsQuery {
    wallet_id: Option<Uuid>,
    is_income: Option<bool>,
    #[serde(rename = "type")]
    transaction_type: Option<TransactionType>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    skip: Option<i64>,
    limit: Option<i64>,
}

impl From<ListTransactionsQuery> for TransactionFilters {
    fn from(query: ListTransactionsQuery) -> Self {
        TransactionFilters {
            wallet_id: query.wallet_id,
            is_income: query.is_income,
            transaction_type: query.transaction_type,
            start_date: query.start_date,
            end_date: query.end_date,
            skip: query.skip,
            limit: query.limit,
        }
    }
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> ApiResult<Json<TransactionList>> {
    let list = state
        .transaction_service
        .list_transactions(&user.user_id, query.into())?;
    Ok(Json(list))
}

async fn create_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<NewTransaction>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let transaction = state
        .transaction_service
        .create_transaction(&user.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(transaction_id): Path<String>,
) -> ApiResult<Json<Transaction>> {
    Ok(Json(
        state
            .transaction_service
            .get_transaction(&user.user_id, &transaction_id)?,
    ))
}

async fn update_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(transaction_id): Path<String>,
    Json(body): Json<TransactionUpdate>,
) -> ApiResult<Json<Transaction>> {
    let transaction = state
        .transaction_service
        .update_transaction(&user.user_id, &transaction_id, body)
        .await?;
    Ok(Json(transaction))
}

async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(transaction_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .transaction_service
        .delete_transaction(&user.user_id, &transaction_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route(
            "/transactions/:transaction_id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}
