// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use payledger::config::{SeedConfig, StorageConfig};
use payledger::LedgerStore;
use tempfile::TempDir;

pub const ALICE: &str = "wallet-a";
pub const BOB: &str = "wallet-b";
pub const CAROL: &str = "wallet-c";

/// Storage settings pointing at a fresh database inside `dir`.
pub fn storage_config(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        path: dir.path().join("test.db"),
        ..StorageConfig::default()
    }
}

/// Helper to create a migrated, empty store with a temporary database
pub async fn test_store() -> Result<(LedgerStore, TempDir)> {
    let temp_dir = TempDir::new()?;
    let store = LedgerStore::connect(&storage_config(&temp_dir)).await?;
    store.migrate().await?;
    Ok((store, temp_dir))
}

/// Helper to open a store the way the binary does, seeding it
pub async fn seeded_store(seed: &SeedConfig) -> Result<(LedgerStore, TempDir)> {
    let temp_dir = TempDir::new()?;
    let store = LedgerStore::open(&storage_config(&temp_dir), seed).await?;
    Ok((store, temp_dir))
}

/// Test fixture: known wallets with known balances
pub struct StandardWallets;

impl StandardWallets {
    /// A = 100.00, B = 50.00
    pub async fn create_pair(store: &LedgerStore) -> Result<()> {
        store.insert_wallet(ALICE, 10_000).await?;
        store.insert_wallet(BOB, 5_000).await?;
        Ok(())
    }

    /// A = 100.00, B = 50.00, C = 0.00
    pub async fn create_trio(store: &LedgerStore) -> Result<()> {
        Self::create_pair(store).await?;
        store.insert_wallet(CAROL, 0).await?;
        Ok(())
    }
}

/// Sum of all balances, in cents.
pub async fn total_balance(store: &LedgerStore) -> Result<i64> {
    Ok(store.list_wallets().await?.iter().map(|w| w.balance).sum())
}
