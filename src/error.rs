//! Error types and the mapping from error kinds to HTTP responses

use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub const INVALID_ZIPCODE: &str = "invalid zipcode";
pub const ZIPCODE_NOT_FOUND: &str = "can not find zipcode";
pub const INTERNAL_ERROR: &str = "internal error";

/// Request outcome for every failure in the resolution pipeline
#[derive(Error, Debug)]
pub enum CepError {
    /// The postal code failed the length check
    #[error("invalid zipcode: expected 8 characters, got {length}")]
    InvalidInput { length: usize },

    /// The geocoding collaborator returned no candidates
    #[error("no location found for zipcode {postal_code}")]
    NotFound { postal_code: String },

    /// A collaborator call failed
    #[error("{service} call failed: {source}")]
    Upstream {
        service: &'static str,
        #[source]
        source: UpstreamError,
    },

    /// Anything not classified above
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Why a collaborator call failed
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("request cancelled")]
    Cancelled,
}

impl CepError {
    pub fn upstream(service: &'static str, source: UpstreamError) -> Self {
        Self::Upstream { service, source }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// JSON error body shared by both services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: u16,
}

/// Decides the externally visible status and message for a [`CepError`].
///
/// The two services disagree only on the status used for a rejected postal
/// code, so the mapper carries that one status and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMapper {
    invalid_input: StatusCode,
}

impl ErrorMapper {
    /// Mapping used by the resolver service
    pub const RESOLVER: Self = Self {
        invalid_input: StatusCode::UNPROCESSABLE_ENTITY,
    };

    /// Mapping used by the gateway service
    pub const GATEWAY: Self = Self {
        invalid_input: StatusCode::BAD_REQUEST,
    };

    #[must_use]
    pub fn map(&self, err: &CepError) -> (StatusCode, ErrorBody) {
        let (status, message) = match err {
            CepError::InvalidInput { .. } => (self.invalid_input, INVALID_ZIPCODE),
            CepError::NotFound { .. } => (StatusCode::NOT_FOUND, ZIPCODE_NOT_FOUND),
            CepError::Upstream { .. } | CepError::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
            }
        };

        (
            status,
            ErrorBody {
                message: message.to_string(),
                code: status.as_u16(),
            },
        )
    }

    /// Logs the cause and renders the structured error response
    pub fn respond(&self, err: &CepError) -> Response {
        match err {
            CepError::Upstream { .. } | CepError::Internal { .. } => error!(error = %err, "request failed"),
            CepError::InvalidInput { .. } | CepError::NotFound { .. } => warn!(error = %err, "request rejected"),
        }

        let (status, body) = self.map(err);
        json_response(status, &body)
    }

    /// Response used when nothing more specific is available, e.g. after a panic
    #[must_use]
    pub fn internal_response() -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        json_response(
            status,
            &ErrorBody {
                message: INTERNAL_ERROR.to_string(),
                code: status.as_u16(),
            },
        )
    }
}

fn json_response(status: StatusCode, body: &ErrorBody) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            Body::from(bytes),
        )
            .into_response(),
        Err(_) => status.into_response(),
    }
}
