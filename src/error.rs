use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid quantity for item {0}")]
    InvalidQuantity(String),

    #[error("Negative price for item {0}")]
    NegativePrice(String),

    #[error("Order total is out of range")]
    TotalOverflow,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Order is already delivered")]
    AlreadyDelivered,

    #[error("Order was updated concurrently, try again")]
    Conflict,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::EmptyCart
            | AppError::MissingField(_)
            | AppError::InvalidQuantity(_)
            | AppError::NegativePrice(_)
            | AppError::TotalOverflow => StatusCode::BAD_REQUEST,
            AppError::OrderNotFound | AppError::Store(StoreError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            AppError::AlreadyDelivered
            | AppError::Conflict
            | AppError::Store(StoreError::Conflict { .. })
            | AppError::Store(StoreError::KeyInUse) => StatusCode::CONFLICT,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
