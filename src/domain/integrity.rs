use serde::Serialize;

use super::{format_cents, Cents};

/// Raw counters gathered from storage for an integrity check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityStats {
    pub wallet_count: i64,
    pub transaction_count: i64,
    pub total_balance: Cents,
    pub negative_balances: i64,
    pub invalid_amounts: i64,
    pub self_transfers: i64,
    pub dangling_refs: i64,
}

/// Outcome of an integrity check over the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub stats: IntegrityStats,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn build_integrity_report(stats: IntegrityStats) -> IntegrityReport {
    let mut issues = Vec::new();

    if stats.negative_balances > 0 {
        issues.push(format!(
            "{} wallet(s) with a negative balance",
            stats.negative_balances
        ));
    }
    if stats.invalid_amounts > 0 {
        issues.push(format!(
            "{} transaction(s) with a non-positive amount",
            stats.invalid_amounts
        ));
    }
    if stats.self_transfers > 0 {
        issues.push(format!(
            "{} transaction(s) from a wallet to itself",
            stats.self_transfers
        ));
    }
    if stats.dangling_refs > 0 {
        issues.push(format!(
            "{} transaction(s) referencing unknown wallets",
            stats.dangling_refs
        ));
    }
    if stats.total_balance < 0 {
        issues.push(format!(
            "total balance is negative: {}",
            format_cents(stats.total_balance)
        ));
    }

    IntegrityReport { stats, issues }
}
