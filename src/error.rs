use thiserror::Error;

use crate::domain::{format_cents, Address, Cents};

/// Errors surfaced by ledger operations.
///
/// The first five variants are expected outcomes that callers map to client
/// errors. `Internal` covers storage, connectivity and anything unexpected;
/// its detail is for logs only.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Wallet not found: {0}")]
    WalletNotFound(Address),

    #[error("Transfer amount must be greater than zero")]
    IncorrectAmount,

    #[error(
        "Insufficient funds in wallet {address}: balance {}, required {}",
        units(.balance),
        units(.required)
    )]
    InsufficientFunds {
        address: Address,
        balance: Cents,
        required: Cents,
    },

    #[error("Sender and recipient addresses are the same")]
    AddressesEqual,

    #[error("Count must be greater than zero, got {0}")]
    InvalidRequest(i64),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl LedgerError {
    /// True for the domain outcomes a caller can correct.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LedgerError::Internal(_))
    }
}

fn units(cents: &Cents) -> String {
    format_cents(*cents)
}

pub type LedgerResult<T> = Result<T, LedgerError>;
