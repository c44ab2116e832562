use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::users::error::{ServiceError, StoreError};

pub const REPOSITORY_ERROR: &str = "RepositoryError";
pub const SERVICE_ERROR: &str = "ServiceError";
pub const PAYLOAD_ERROR: &str = "ControllerPayloadError";
pub const PARAMETER_ERROR: &str = "ControllerParameterError";

/// Everything a handler can fail with; the only place that knows status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("invalid payload: {0}")]
    Payload(String),

    #[error("invalid {param} parameter: {reason}")]
    Parameter { param: &'static str, reason: String },
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Payload(rejection.body_text())
    }
}

impl ApiError {
    pub fn parameter(param: &'static str, reason: impl Into<String>) -> Self {
        ApiError::Parameter {
            param,
            reason: reason.into(),
        }
    }

    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Service(ServiceError::Store(store)) => {
                let code = match store {
                    StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    StoreError::Conflict(_) => StatusCode::CONFLICT,
                    StoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (code, REPOSITORY_ERROR)
            }
            ApiError::Service(ServiceError::Hash(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, SERVICE_ERROR)
            }
            ApiError::Service(ServiceError::PasswdDoNotMatch) => {
                (StatusCode::UNAUTHORIZED, SERVICE_ERROR)
            }
            ApiError::Service(_) => (StatusCode::BAD_REQUEST, SERVICE_ERROR),
            ApiError::Payload(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, PAYLOAD_ERROR),
            ApiError::Parameter { .. } => (StatusCode::BAD_REQUEST, PARAMETER_ERROR),
        }
    }
}

/// JSON shape of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub status: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            if let ApiError::Service(svc) = &self {
                warn!(error = %self, subject = ?svc.subject(), "request rejected");
            } else {
                warn!(error = %self, "request rejected");
            }
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                code: status.as_u16(),
                status: kind.to_string(),
                message,
            }),
        )
            .into_response()
    }
}
