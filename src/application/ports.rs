//! Narrow capabilities the HTTP layer depends on, one per use site.
//!
//! Both [`LedgerStore`] and [`MemoryStore`] implement all of them, and tests
//! can swap in a fake for any single one.

use async_trait::async_trait;

use crate::domain::{Cents, Transaction, Wallet};
use crate::error::LedgerResult;
use crate::storage::{LedgerStore, MemoryStore};

/// Looks up a wallet's balance.
#[async_trait]
pub trait BalanceReader: Send + Sync {
    async fn wallet_balance(&self, address: &str) -> LedgerResult<Wallet>;
}

/// Reads the most recent transactions.
#[async_trait]
pub trait TransactionsReader: Send + Sync {
    async fn last_transactions(&self, count: i64) -> LedgerResult<Vec<Transaction>>;
}

/// Applies transfers.
#[async_trait]
pub trait TransferMaker: Send + Sync {
    async fn make_transfer(&self, from: &str, to: &str, amount: Cents)
        -> LedgerResult<Transaction>;
}

/// Lists every wallet.
#[async_trait]
pub trait WalletsReader: Send + Sync {
    async fn all_wallets(&self) -> LedgerResult<Vec<Wallet>>;
}

/// Everything a full ledger backend provides.
pub trait Ledger: BalanceReader + TransactionsReader + TransferMaker + WalletsReader {}

impl<T> Ledger for T where T: BalanceReader + TransactionsReader + TransferMaker + WalletsReader {}

#[async_trait]
impl BalanceReader for LedgerStore {
    async fn wallet_balance(&self, address: &str) -> LedgerResult<Wallet> {
        self.get_balance(address).await
    }
}

#[async_trait]
impl TransactionsReader for LedgerStore {
    async fn last_transactions(&self, count: i64) -> LedgerResult<Vec<Transaction>> {
        self.recent_transactions(count).await
    }
}

#[async_trait]
impl TransferMaker for LedgerStore {
    async fn make_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Cents,
    ) -> LedgerResult<Transaction> {
        self.transfer(from, to, amount).await
    }
}

#[async_trait]
impl WalletsReader for LedgerStore {
    async fn all_wallets(&self) -> LedgerResult<Vec<Wallet>> {
        self.list_wallets().await
    }
}

#[async_trait]
impl BalanceReader for MemoryStore {
    async fn wallet_balance(&self, address: &str) -> LedgerResult<Wallet> {
        self.get_balance(address)
    }
}

#[async_trait]
impl TransactionsReader for MemoryStore {
    async fn last_transactions(&self, count: i64) -> LedgerResult<Vec<Transaction>> {
        self.recent_transactions(count)
    }
}

#[async_trait]
impl TransferMaker for MemoryStore {
    async fn make_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Cents,
    ) -> LedgerResult<Transaction> {
        self.transfer(from, to, amount)
    }
}

#[async_trait]
impl WalletsReader for MemoryStore {
    async fn all_wallets(&self) -> LedgerResult<Vec<Wallet>> {
        Ok(self.list_wallets())
    }
}
