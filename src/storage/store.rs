use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Connection, Executor, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use crate::config::{SeedConfig, StorageConfig};
use crate::domain::{
    build_integrity_report, format_cents, generate_address, validate_count, validate_transfer,
    Address, Cents, IntegrityReport, IntegrityStats, Transaction, Wallet,
};
use crate::error::{LedgerError, LedgerResult};

use super::MIGRATION_001_INITIAL;

const SELECT_BALANCE: &str = "SELECT balance_cents FROM wallets WHERE address = ?";

const UPDATE_BALANCE: &str =
    "UPDATE wallets SET balance_cents = balance_cents + ? WHERE address = ?";

const INSERT_WALLET: &str = "INSERT INTO wallets (address, balance_cents) VALUES (?, ?)";

const INSERT_TRANSACTION: &str = r#"
    INSERT INTO transactions (from_address, to_address, amount_cents, created_at)
    VALUES (?, ?, ?, ?)
"#;

const SELECT_RECENT: &str = r#"
    SELECT from_address, to_address, amount_cents, created_at
    FROM transactions
    ORDER BY created_at DESC, id DESC
    LIMIT ?
"#;

/// Statements on the request path. They are prepared once at startup so a
/// schema mismatch fails `open` instead of the first request, and stay in each
/// connection's statement cache until `close`.
const HOT_STATEMENTS: [&str; 5] = [
    SELECT_BALANCE,
    UPDATE_BALANCE,
    INSERT_WALLET,
    INSERT_TRANSACTION,
    SELECT_RECENT,
];

/// Opens a write transaction that holds the database write lock from the start.
const BEGIN_IMMEDIATE: &str = "BEGIN IMMEDIATE";

/// Upper bound on address collisions tolerated while seeding.
const MAX_SEED_COLLISIONS: usize = 64;

/// SQLite-backed ledger: wallet balances plus the append-only transaction log.
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Wrap an existing pool. The schema is not touched.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database file named in the config, creating it if missing.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", config.path.display()))?;

        Ok(Self::new(pool))
    }

    /// Connect, migrate, check the hot statements and seed an empty wallet set.
    pub async fn open(config: &StorageConfig, seed: &SeedConfig) -> Result<Self> {
        let store = Self::connect(config).await?;
        store.migrate().await?;
        store.verify_statements().await?;
        store.seed_with(seed, generate_address).await?;
        info!(path = %config.path.display(), "ledger store ready");
        Ok(store)
    }

    /// Create tables, indices and triggers if they do not exist.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    async fn verify_statements(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;

        for sql in HOT_STATEMENTS {
            (&mut *conn)
                .prepare(sql)
                .await
                .with_context(|| format!("Failed to prepare statement: {}", sql.trim()))?;
        }
        Ok(())
    }

    /// Seed the wallet table if it is empty. Returns how many wallets were created.
    ///
    /// A uniqueness violation on insert means the generated address is taken;
    /// a new one is drawn. Any other failure aborts the whole seed.
    #[instrument(skip(self, next_address))]
    pub async fn seed_with<F>(&self, seed: &SeedConfig, mut next_address: F) -> Result<usize>
    where
        F: FnMut() -> Address,
    {
        let mut tx = self
            .pool
            .begin_with(BEGIN_IMMEDIATE)
            .await
            .context("Failed to begin seeding")?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallets")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count wallets")?;
        if existing > 0 {
            debug!(existing, "wallets present, skipping seed");
            return Ok(0);
        }

        let mut created = 0;
        let mut collisions = 0;
        while created < seed.wallet_count {
            let address = next_address();
            let result = sqlx::query(INSERT_WALLET)
                .bind(&address)
                .bind(seed.initial_balance)
                .execute(&mut *tx)
                .await;

            match result {
                Ok(_) => created += 1,
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    collisions += 1;
                    warn!(%address, "address collision while seeding, regenerating");
                    if collisions >= MAX_SEED_COLLISIONS {
                        bail!("Gave up seeding after {} address collisions", collisions);
                    }
                }
                Err(e) => return Err(e).context("Failed to insert seed wallet"),
            }
        }

        tx.commit().await.context("Failed to commit seed wallets")?;

        info!(
            created,
            balance = %format_cents(seed.initial_balance),
            "seeded wallets"
        );
        Ok(created)
    }

    // ========================
    // Wallet operations
    // ========================

    /// Current balance of the wallet at `address`.
    ///
    /// Reads the latest committed state without taking any lock.
    pub async fn get_balance(&self, address: &str) -> LedgerResult<Wallet> {
        let balance = fetch_balance(&self.pool, address)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(address.to_string()))?;
        Ok(Wallet::new(address, balance))
    }

    /// All wallets in creation order.
    pub async fn list_wallets(&self) -> LedgerResult<Vec<Wallet>> {
        let rows = sqlx::query("SELECT address, balance_cents FROM wallets ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list wallets")?;

        Ok(rows
            .iter()
            .map(|row| Wallet::new(row.get::<String, _>("address"), row.get("balance_cents")))
            .collect())
    }

    /// Provision a wallet with an opening balance.
    pub async fn insert_wallet(&self, address: &str, balance: Cents) -> LedgerResult<Wallet> {
        if balance < 0 {
            return Err(LedgerError::IncorrectAmount);
        }

        sqlx::query(INSERT_WALLET)
            .bind(address)
            .bind(balance)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert wallet {}", address))?;

        Ok(Wallet::new(address, balance))
    }

    // ========================
    // Transaction operations
    // ========================

    /// Move `amount` cents from one wallet to another and log it.
    ///
    /// Every read and write happens inside one `BEGIN IMMEDIATE` transaction,
    /// so the sufficiency check and the debit see the same balance. Returning
    /// early from any step drops the transaction, which rolls it back.
    #[instrument(skip(self, amount), fields(amount = %format_cents(amount)))]
    pub async fn transfer(&self, from: &str, to: &str, amount: Cents) -> LedgerResult<Transaction> {
        validate_transfer(from, to, amount)?;

        let mut tx = self
            .pool
            .begin_with(BEGIN_IMMEDIATE)
            .await
            .context("Failed to begin transfer")?;

        let sender = fetch_balance(&mut *tx, from)
            .await?
            .map(|balance| Wallet::new(from, balance))
            .ok_or_else(|| LedgerError::WalletNotFound(from.to_string()))?;
        fetch_balance(&mut *tx, to)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(to.to_string()))?;

        if !sender.can_cover(amount) {
            return Err(LedgerError::InsufficientFunds {
                address: sender.address,
                balance: sender.balance,
                required: amount,
            });
        }

        apply_delta(&mut *tx, from, -amount).await?;
        apply_delta(&mut *tx, to, amount).await?;

        let record = Transaction::new(from, to, amount, Utc::now().trunc_subsecs(6));
        sqlx::query(INSERT_TRANSACTION)
            .bind(&record.from)
            .bind(&record.to)
            .bind(record.amount)
            .bind(encode_timestamp(&record.timestamp))
            .execute(&mut *tx)
            .await
            .context("Failed to record transaction")?;

        tx.commit().await.context("Failed to commit transfer")?;

        debug!("transfer committed");
        Ok(record)
    }

    /// Up to `count` most recent transactions, newest first.
    pub async fn recent_transactions(&self, count: i64) -> LedgerResult<Vec<Transaction>> {
        let count = validate_count(count)?;

        let rows = sqlx::query(SELECT_RECENT)
            .bind(count)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch recent transactions")?;

        Ok(rows
            .iter()
            .map(Self::row_to_transaction)
            .collect::<Result<Vec<_>>>()?)
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let created_at: String = row.get("created_at");

        Ok(Transaction {
            from: row.get("from_address"),
            to: row.get("to_address"),
            amount: row.get("amount_cents"),
            timestamp: DateTime::parse_from_rfc3339(&created_at)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Maintenance
    // ========================

    /// Gather the counters used by the integrity check.
    pub async fn integrity_stats(&self) -> Result<IntegrityStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM wallets) AS wallet_count,
                (SELECT COUNT(*) FROM transactions) AS transaction_count,
                (SELECT COALESCE(SUM(balance_cents), 0) FROM wallets) AS total_balance,
                (SELECT COUNT(*) FROM wallets WHERE balance_cents < 0) AS negative_balances,
                (SELECT COUNT(*) FROM transactions WHERE amount_cents <= 0) AS invalid_amounts,
                (SELECT COUNT(*) FROM transactions WHERE from_address = to_address) AS self_transfers,
                (SELECT COUNT(*)
                 FROM transactions t
                 WHERE NOT EXISTS (SELECT 1 FROM wallets w WHERE w.address = t.from_address)
                    OR NOT EXISTS (SELECT 1 FROM wallets w WHERE w.address = t.to_address)
                ) AS dangling_refs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to gather integrity stats")?;

        Ok(IntegrityStats {
            wallet_count: row.get("wallet_count"),
            transaction_count: row.get("transaction_count"),
            total_balance: row.get("total_balance"),
            negative_balances: row.get("negative_balances"),
            invalid_amounts: row.get("invalid_amounts"),
            self_transfers: row.get("self_transfers"),
            dangling_refs: row.get("dangling_refs"),
        })
    }

    /// Check the ledger invariants against what is stored.
    pub async fn check_integrity(&self) -> Result<IntegrityReport> {
        Ok(build_integrity_report(self.integrity_stats().await?))
    }

    /// Underlying pool, for maintenance and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Release cached statements, checkpoint the WAL and close the pool.
    ///
    /// Every step runs even if an earlier one failed; all failures are
    /// reported together.
    pub async fn close(&self) -> Result<()> {
        let mut errors = Vec::new();

        let mut idle = Vec::new();
        while let Some(conn) = self.pool.try_acquire() {
            idle.push(conn);
        }

        for conn in idle.iter_mut() {
            if let Err(e) = conn.clear_cached_statements().await {
                errors.push(format!("release cached statements: {}", e));
            }
        }

        if let Some(conn) = idle.first_mut() {
            if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(&mut **conn)
                .await
            {
                errors.push(format!("checkpoint: {}", e));
            }
        }

        drop(idle);
        self.pool.close().await;

        if errors.is_empty() {
            info!("ledger store closed");
            Ok(())
        } else {
            Err(anyhow!("Failed to close ledger store: {}", errors.join(", ")))
        }
    }
}

async fn fetch_balance<'e, E>(executor: E, address: &str) -> Result<Option<Cents>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, Cents>(SELECT_BALANCE)
        .bind(address)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch wallet balance")
}

async fn apply_delta<'e, E>(executor: E, address: &str, delta: Cents) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(UPDATE_BALANCE)
        .bind(delta)
        .bind(address)
        .execute(executor)
        .await
        .with_context(|| format!("Failed to update balance of {}", address))?;

    if result.rows_affected() != 1 {
        bail!("Balance update touched {} rows", result.rows_affected());
    }
    Ok(())
}

/// Fixed-width UTC form so that text order matches time order.
fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn empty_store() -> (LedgerStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            path: dir.path().join("ledger.db"),
            ..Default::default()
        };
        let store = LedgerStore::connect(&config).await.unwrap();
        store.migrate().await.unwrap();
        (store, dir)
    }

    #[test]
    fn test_encoded_timestamps_sort_like_times() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = earlier + chrono::Duration::microseconds(1500);

        let a = encode_timestamp(&earlier);
        let b = encode_timestamp(&later);
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(a, "2024-01-01T10:00:00.000000Z");
    }

    #[tokio::test]
    async fn test_seed_retries_on_address_collision() {
        let (store, _dir) = empty_store().await;

        // The generator repeats "dup" twice before producing fresh addresses.
        let mut script = vec!["c", "dup", "b", "dup", "dup", "a"];
        let next = move || script.pop().unwrap().to_string();

        let seed = SeedConfig {
            wallet_count: 4,
            initial_balance: 2500,
        };
        let created = store.seed_with(&seed, next).await.unwrap();
        assert_eq!(created, 4);

        let mut addresses: Vec<_> = store
            .list_wallets()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.address)
            .collect();
        addresses.sort();
        assert_eq!(addresses, vec!["a", "b", "c", "dup"]);
    }

    #[tokio::test]
    async fn test_seed_is_skipped_when_wallets_exist() {
        let (store, _dir) = empty_store().await;
        store.insert_wallet("existing", 100).await.unwrap();

        let created = store
            .seed_with(&SeedConfig::default(), generate_address)
            .await
            .unwrap();
        assert_eq!(created, 0);
        assert_eq!(store.list_wallets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seed_gives_up_on_a_stuck_generator() {
        let (store, _dir) = empty_store().await;

        let result = store
            .seed_with(&SeedConfig::default(), || "same".to_string())
            .await;
        assert!(result.is_err());
        // The failed seed rolled back, including the first insert.
        assert!(store.list_wallets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_releases_everything() {
        let (store, _dir) = empty_store().await;
        store.insert_wallet("a", 100).await.unwrap();

        store.close().await.unwrap();
        assert!(store.pool().is_closed());
    }
}
