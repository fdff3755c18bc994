use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::AppError;
use crate::domain::format_cents;

use super::dto::BaseResponse;

pub fn app_error_to_response(err: AppError) -> Response {
    match err {
        AppError::NotFound(username) => {
            json_error(StatusCode::NOT_FOUND, format!("user {username} not found"))
        }
        AppError::AccountAlreadyExists(username) => {
            json_error(StatusCode::CONFLICT, format!("user {username} already exists"))
        }
        AppError::InsufficientFunds {
            balance, required, ..
        } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!(
                "insufficient balance: have {}, need {}",
                format_cents(balance),
                format_cents(required)
            ),
        ),
        AppError::InvalidAmount(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        AppError::Storage(e) => {
            tracing::error!(error = ?e, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(BaseResponse::error(message))).into_response()
}

/// Response for a handler that panicked. The panic message is logged, never
/// sent to the client.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = detail, "handler panicked");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}
