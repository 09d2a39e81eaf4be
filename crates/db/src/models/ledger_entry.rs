//! Credit ledger entry model (RF-32).
//!
//! Rows are append-only: balances are derived by summing, corrections are
//! offsetting entries. The `kind` column holds the
//! [`EntryKind`](reelforge_core::ledger::EntryKind) label.

use serde::Serialize;
use sqlx::FromRow;

use reelforge_core::types::{DbId, Timestamp};

/// A row from the `ledger_entries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: DbId,
    pub owner_id: DbId,
    /// Signed credit amount: negative for debits, positive otherwise.
    pub amount_credits: i64,
    /// Entry kind label (`purchase`, `generation_debit`, `refund`, `bonus`).
    pub kind: String,
    /// Back-reference to the job that caused this entry, for audit.
    pub job_id: Option<DbId>,
    pub created_at: Timestamp,
}
