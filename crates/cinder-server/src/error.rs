//! HTTP error mapping
//!
//! Every failure leaves the process healthy and becomes a status code with a
//! JSON [`ErrorBody`]. Internal details are logged, never returned.

use std::time::Duration;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use cinder_paste::PasteError;
use thiserror::Error;
use tracing::error;

use crate::api::ErrorBody;

/// Errors surfaced by the HTTP API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Paste not found")]
    NotFound,

    #[error("Paste has expired")]
    Expired,

    #[error("Password required")]
    PasswordRequired,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("Content too large")]
    PayloadTooLarge,

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound | ApiError::Expired => StatusCode::NOT_FOUND,
            ApiError::PasswordRequired => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            // Oversized content is a client error like any other bad body
            ApiError::PayloadTooLarge | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PasteError> for ApiError {
    fn from(err: PasteError) -> Self {
        match err {
            PasteError::NotFound => ApiError::NotFound,
            PasteError::Expired => ApiError::Expired,
            PasteError::PasswordRequired => ApiError::PasswordRequired,
            PasteError::PayloadTooLarge { .. } => ApiError::PayloadTooLarge,
            PasteError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!(error = %detail, "Request failed");
        }

        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            requires_password: matches!(self, ApiError::PasswordRequired),
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
        }
        response
    }
}
