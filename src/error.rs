//! Crate-wide error taxonomy and its mapping onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("query transport error: {0}")]
    QueryTransportError(String),

    #[error("query response error: {0}")]
    QueryResponseError(String),

    #[error("query decode error: {0}")]
    QueryDecodeError(String),

    #[error("calc input error: field {field} value {value:?}")]
    CalcInputError { field: String, value: String },

    #[error("merkle error: {0}")]
    MerkleError(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("on-chain revert: {0}")]
    OnChainRevertError(String),

    #[error("on-chain timeout: {0}")]
    OnChainTimeoutError(String),

    #[error("cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    ConfigError(String),
}

impl OrchestratorError {
    fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::NotFound(_) => "NotFound",
            Self::QueryTransportError(_) => "QueryTransportError",
            Self::QueryResponseError(_) => "QueryResponseError",
            Self::QueryDecodeError(_) => "QueryDecodeError",
            Self::CalcInputError { .. } => "CalcInputError",
            Self::MerkleError(_) => "MerkleError",
            Self::StoreError(_) => "StoreError",
            Self::OnChainRevertError(_) => "OnChainRevertError",
            Self::OnChainTimeoutError(_) => "OnChainTimeoutError",
            Self::Cancelled => "Cancelled",
            Self::ConfigError(_) => "ConfigError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::QueryTransportError(_) => StatusCode::BAD_GATEWAY,
            Self::QueryResponseError(_) => StatusCode::BAD_GATEWAY,
            Self::QueryDecodeError(_) => StatusCode::BAD_GATEWAY,
            Self::CalcInputError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MerkleError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::OnChainRevertError(_) => StatusCode::BAD_GATEWAY,
            Self::OnChainTimeoutError(_) => StatusCode::GATEWAY_TIMEOUT,
            // 499 isn't a registered status; axum requires a valid StatusCode so
            // we use the closest meaningful standard code instead of a u16 hack.
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(kind = body.error, message = %body.message, "request failed");
        } else {
            tracing::warn!(kind = body.error, message = %body.message, "request rejected");
        }
        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
