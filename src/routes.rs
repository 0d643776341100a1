use std::sync::Arc;

use axum::{
    extract::{Path, Query, State as AxumState},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, models::Checkout, state::State, store::Scope};

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

pub async fn list_orders_handler(
    AxumState(state): AxumState<Arc<State>>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state.orders.list_orders(&Scope::All).await?;

    Ok(Json(orders))
}

pub async fn user_orders_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state.orders.list_orders(&Scope::User(user_id)).await?;

    Ok(Json(orders))
}

pub async fn create_order_handler(
    AxumState(state): AxumState<Arc<State>>,
    Json(checkout): Json<Checkout>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders.create_order(checkout).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn advance_order_handler(
    AxumState(state): AxumState<Arc<State>>,
    Path(order_id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders.advance_status(order_id).await?;

    Ok(Json(order))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountParams {
    user_id: Option<String>,
}

pub async fn active_count_handler(
    AxumState(state): AxumState<Arc<State>>,
    Query(params): Query<CountParams>,
) -> Result<impl IntoResponse, AppError> {
    let scope = match params.user_id {
        Some(user_id) => Scope::User(user_id),
        None => Scope::All,
    };
    let count = state.orders.count_active(&scope).await?;

    Ok(Json(json!({ "activeOrders": count })))
}
