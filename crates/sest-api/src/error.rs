//! HTTP error mapping.
//!
//! Every failure leaves the API as `{"code": ..., "message": ...}` with a
//! status chosen per cause. Client mistakes are 4xx; storage and internal
//! faults are 500 and logged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sest_engine::IngestError;
use sest_types::ChannelId;
use sest_types::api::ErrorBody;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Malformed or inconsistent management input (400)
    #[error("{message}")]
    Invalid { code: &'static str, message: String },

    /// Missing resource, or one the caller does not own (404)
    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    /// Missing or invalid bearer token (401)
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Duplicate user or target (409)
    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn channel_not_found(id: ChannelId) -> Self {
        Self::not_found("CHANNEL_NOT_FOUND", format!("Channel {} does not exist.", id))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Ingest(IngestError::ChannelNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Ingest(IngestError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Ingest(_) => StatusCode::BAD_REQUEST,
            Self::Invalid { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Ingest(e) => e.code(),
            Self::Invalid { code, .. } | Self::NotFound { code, .. } | Self::Conflict { code, .. } => *code,
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Internals stay in the log.
        let message = if status.is_server_error() {
            error!(code, "{:#}", self);
            "Internal server error.".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                code: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sest_engine::{AuthError, ShapeError};

    #[test]
    fn client_causes_are_bad_requests() {
        let cases = [
            ApiError::from(IngestError::from(AuthError::MissingWriteKey)),
            ApiError::from(IngestError::from(AuthError::WrongWriteKey)),
            ApiError::from(IngestError::from(ShapeError::NoFields)),
            ApiError::from(IngestError::EmptyValue { position: 2 }),
            ApiError::invalid("INVALID_RULE", "bad"),
        ];
        for e in cases {
            assert_eq!(e.status_code(), StatusCode::BAD_REQUEST, "{}", e.error_code());
        }
    }

    #[test]
    fn statuses_and_codes() {
        let e = ApiError::from(IngestError::ChannelNotFound(4));
        assert_eq!((e.status_code(), e.error_code()), (StatusCode::NOT_FOUND, "CHANNEL_NOT_FOUND"));

        let e = ApiError::from(IngestError::Storage(anyhow::anyhow!("disk full")));
        assert_eq!((e.status_code(), e.error_code()), (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"));

        let e = ApiError::Unauthorized("missing bearer token");
        assert_eq!((e.status_code(), e.error_code()), (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"));

        let e = ApiError::conflict("USER_EXISTS", "taken");
        assert_eq!(e.status_code(), StatusCode::CONFLICT);
    }
}
