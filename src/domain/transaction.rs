use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::{units, Address, Cents};
use crate::error::LedgerError;

/// Wire format for transaction times, e.g. "15:04:05 02-01-2006".
pub const TIME_FORMAT: &str = "%H:%M:%S %d-%m-%Y";

/// An immutable record of money moved from one wallet to another.
/// Records are append-only; the store assigns the timestamp at commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    /// Always positive
    #[serde(with = "units")]
    pub amount: Cents,
    #[serde(rename = "time", serialize_with = "serialize_time")]
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        from: impl Into<Address>,
        to: impl Into<Address>,
        amount: Cents,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
            timestamp,
        }
    }
}

fn serialize_time<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format(TIME_FORMAT))
}

/// Checks that hold before any storage is touched, in this order:
/// the amount must be positive, then the two addresses must differ.
pub fn validate_transfer(from: &str, to: &str, amount: Cents) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::IncorrectAmount);
    }
    if from == to {
        return Err(LedgerError::AddressesEqual);
    }
    Ok(())
}

/// Validate a history page size.
pub fn validate_count(count: i64) -> Result<i64, LedgerError> {
    if count <= 0 {
        return Err(LedgerError::InvalidRequest(count));
    }
    Ok(count)
}
