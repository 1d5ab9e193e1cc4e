use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use crate::domain::{
    generate_address, validate_count, validate_transfer, Address, Cents, Transaction, Wallet,
};
use crate::error::{LedgerError, LedgerResult};

/// Process-local ledger with the same rules as [`LedgerStore`](super::LedgerStore).
///
/// One mutex guards balances and history together, so every transfer is
/// serialized. Nothing survives the process; meant for tests and demos.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    balances: HashMap<Address, Cents>,
    /// Creation order, for listing
    order: Vec<Address>,
    /// Oldest first
    history: Vec<Transaction>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `count` fresh wallets with `balance` cents each.
    pub fn seeded(count: usize, balance: Cents) -> Self {
        let store = Self::new();
        for _ in 0..count {
            store.insert_wallet(generate_address(), balance);
        }
        store
    }

    /// Add a wallet, replacing the balance if the address already exists.
    pub fn insert_wallet(&self, address: impl Into<Address>, balance: Cents) -> Wallet {
        let address = address.into();
        let mut inner = self.inner.lock();
        if inner.balances.insert(address.clone(), balance).is_none() {
            inner.order.push(address.clone());
        }
        Wallet::new(address, balance)
    }

    pub fn get_balance(&self, address: &str) -> LedgerResult<Wallet> {
        let inner = self.inner.lock();
        inner
            .balances
            .get(address)
            .map(|balance| Wallet::new(address, *balance))
            .ok_or_else(|| LedgerError::WalletNotFound(address.to_string()))
    }

    pub fn list_wallets(&self) -> Vec<Wallet> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .map(|address| Wallet::new(address.clone(), inner.balances[address]))
            .collect()
    }

    pub fn transfer(&self, from: &str, to: &str, amount: Cents) -> LedgerResult<Transaction> {
        validate_transfer(from, to, amount)?;

        let mut inner = self.inner.lock();
        let sender = inner
            .balances
            .get(from)
            .map(|balance| Wallet::new(from, *balance))
            .ok_or_else(|| LedgerError::WalletNotFound(from.to_string()))?;
        if !inner.balances.contains_key(to) {
            return Err(LedgerError::WalletNotFound(to.to_string()));
        }
        if !sender.can_cover(amount) {
            return Err(LedgerError::InsufficientFunds {
                address: sender.address,
                balance: sender.balance,
                required: amount,
            });
        }

        if let Some(balance) = inner.balances.get_mut(from) {
            *balance -= amount;
        }
        if let Some(balance) = inner.balances.get_mut(to) {
            *balance += amount;
        }

        let record = Transaction::new(from, to, amount, Utc::now());
        inner.history.push(record.clone());
        Ok(record)
    }

    pub fn recent_transactions(&self, count: i64) -> LedgerResult<Vec<Transaction>> {
        let count = validate_count(count)?;
        let take = usize::try_from(count).unwrap_or(usize::MAX);

        let inner = self.inner.lock();
        Ok(inner.history.iter().rev().take(take).cloned().collect())
    }
}
