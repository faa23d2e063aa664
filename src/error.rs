use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::StoreError;
use crate::services::{ErrorKind, TransactionError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("unsupported content type: {0:?}")]
    UnsupportedContentType(String),

    #[error("invalid request body: {0}")]
    InvalidRequest(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Transaction(e) => transaction_status(e),
            AppError::UnsupportedContentType(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Transaction(e) => e.kind().as_str(),
            AppError::UnsupportedContentType(_) => "unsupported_content_type",
            AppError::InvalidRequest(_) => "invalid_request",
        }
    }
}

fn transaction_status(error: &TransactionError) -> StatusCode {
    match error.kind() {
        kind if kind.is_validation() => StatusCode::BAD_REQUEST,
        ErrorKind::NoGatewayAvailable => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::AllGatewaysUnhealthy => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::PersistenceFailed
            if matches!(error, TransactionError::PersistenceFailed(StoreError::NotFound(_))) =>
        {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
