//! Error response boundary.
//!
//! # Responsibilities
//! - Turn any `GatewayError` into the uniform JSON 500
//!
//! # Design Decisions
//! - Every failure kind maps to 500; the kind is only visible in the message
//! - The message carries the full error chain, stamp URI included

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Body of every gateway-generated error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

impl ErrorBody {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            message: message.into(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::internal(self.detail())),
        )
            .into_response()
    }
}
