use axum::{
    body::Bytes,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{format_cents, units, Cents, Transaction, Wallet};

use super::response::{ApiError, ApiResponse};
use super::AppState;

pub const TRANSFER_OK_MESSAGE: &str = "transfer completed";

/// Body of `POST /api/send`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub from: String,
    pub to: String,
    #[serde(with = "units")]
    pub amount: Cents,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub count: Option<String>,
}

/// `GET /api/wallet/{address}/balance`
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<ApiResponse<Wallet>, ApiError> {
    let wallet = state.balances.wallet_balance(&address).await.map_err(|e| {
        warn!(op = "handlers.wallet.get_balance", %address, error = %e, "balance lookup failed");
        ApiError::from(e)
    })?;
    Ok(ApiResponse::ok(wallet))
}

/// `GET /api/transactions?count=N`
pub async fn get_last_transactions(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<ApiResponse<Vec<Transaction>>, ApiError> {
    let raw = params.count.unwrap_or_default();
    let count: i64 = raw.trim().parse().map_err(|_| {
        warn!(op = "handlers.transaction.get_last", count = %raw, "count is not a number");
        ApiError::BadRequest(format!("invalid count: {:?}", raw))
    })?;

    let transactions = state
        .transactions
        .last_transactions(count)
        .await
        .map_err(|e| {
            warn!(op = "handlers.transaction.get_last", count, error = %e, "history lookup failed");
            ApiError::from(e)
        })?;
    Ok(ApiResponse::ok(transactions))
}

/// `POST /api/send` with `{"from": .., "to": .., "amount": ..}`
///
/// The body is read raw so an empty body and malformed JSON both answer 400
/// with the envelope, whatever the content type.
pub async fn send(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<&'static str>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        warn!(op = "handlers.transaction.send", "request body is empty");
        return Err(ApiError::BadRequest("request body is required".to_string()));
    }

    let request: SendRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(op = "handlers.transaction.send", error = %e, "failed to decode request body");
        ApiError::BadRequest("invalid JSON body".to_string())
    })?;

    let record = state
        .transfers
        .make_transfer(&request.from, &request.to, request.amount)
        .await
        .map_err(|e| {
            warn!(op = "handlers.transaction.send", from = %request.from, to = %request.to, error = %e, "transfer failed");
            ApiError::from(e)
        })?;

    info!(
        from = %record.from,
        to = %record.to,
        amount = %format_cents(record.amount),
        "transfer completed"
    );
    Ok(ApiResponse::ok(TRANSFER_OK_MESSAGE))
}

/// `GET /api/wallets`
pub async fn list_wallets(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Wallet>>, ApiError> {
    let wallets = state.wallets.all_wallets().await?;
    Ok(ApiResponse::ok(wallets))
}

/// `GET /health`
pub async fn health() -> ApiResponse<&'static str> {
    ApiResponse::ok("ok")
}
