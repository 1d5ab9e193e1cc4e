use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{units, Cents};

/// Wallet addresses are opaque strings. Seeded wallets use v4 UUIDs.
pub type Address = String;

/// Generate a fresh wallet address.
pub fn generate_address() -> Address {
    Uuid::new_v4().to_string()
}

/// A wallet as seen by callers: its address and current balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address: Address,
    #[serde(with = "units")]
    pub balance: Cents,
}

impl Wallet {
    pub fn new(address: impl Into<Address>, balance: Cents) -> Self {
        Self {
            address: address.into(),
            balance,
        }
    }

    pub fn can_cover(&self, amount: Cents) -> bool {
        self.balance >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_addresses_are_unique_uuids() {
        let a = generate_address();
        let b = generate_address();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_can_cover() {
        let wallet = Wallet::new("w", 10000);
        assert!(wallet.can_cover(10000));
        assert!(wallet.can_cover(1));
        assert!(!wallet.can_cover(10001));
    }

    #[test]
    fn test_wallet_json_shape() {
        let json = serde_json::to_value(Wallet::new("abc", 10000)).unwrap();
        assert_eq!(json, serde_json::json!({"address": "abc", "balance": 100.0}));
    }
}
