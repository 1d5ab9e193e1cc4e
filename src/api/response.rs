use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::error::LedgerError;

pub const STATUS_OK: &str = "OK";
pub const STATUS_ERROR: &str = "Error";

/// Message returned for anything the caller cannot fix.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// Envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: STATUS_OK,
            code: StatusCode::OK.as_u16(),
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Failure of a request, before or inside the ledger.
#[derive(Debug)]
pub enum ApiError {
    /// Rejected before reaching the ledger (bad path, query or body).
    BadRequest(String),
    Ledger(LedgerError),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Ledger(LedgerError::Internal(_)) => INTERNAL_ERROR_MESSAGE.to_string(),
            ApiError::Ledger(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Ledger(LedgerError::Internal(err)) = &self {
            error!(error = %format!("{:#}", err), "internal error while handling request");
        }

        let status = self.status();
        let body = ApiResponse::<()> {
            status: STATUS_ERROR,
            code: status.as_u16(),
            data: None,
            error: Some(self.message()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (LedgerError::WalletNotFound("w".into()).into(), StatusCode::BAD_REQUEST),
            (LedgerError::IncorrectAmount.into(), StatusCode::BAD_REQUEST),
            (LedgerError::AddressesEqual.into(), StatusCode::BAD_REQUEST),
            (LedgerError::InvalidRequest(0).into(), StatusCode::BAD_REQUEST),
            (
                LedgerError::InsufficientFunds {
                    address: "w".into(),
                    balance: 0,
                    required: 1,
                }
                .into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                LedgerError::Internal(anyhow::anyhow!("database is locked")).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{:?}", err);
        }
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err: ApiError = LedgerError::Internal(anyhow::anyhow!("secret path")).into();
        assert_eq!(err.message(), INTERNAL_ERROR_MESSAGE);
    }
}
