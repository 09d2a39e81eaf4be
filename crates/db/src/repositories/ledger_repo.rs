//! Repository for the `ledger_entries` table (RF-32).
//!
//! The debit path is the one place in the system requiring strict
//! consistency: two concurrent debits must never both succeed against an
//! insufficient balance. [`LedgerRepo::debit`] therefore takes a per-owner
//! advisory lock inside its transaction before the sum-check and insert,
//! serializing balance mutations per owner without blocking other owners.

use sqlx::PgPool;

use reelforge_core::ledger::EntryKind;
use reelforge_core::types::DbId;

use crate::models::ledger_entry::LedgerEntry;

/// Column list for `ledger_entries` queries.
const COLUMNS: &str = "id, owner_id, amount_credits, kind, job_id, created_at";

/// Outcome of a debit attempt.
#[derive(Debug)]
pub enum DebitOutcome {
    /// The debit was admitted and inserted.
    Admitted(LedgerEntry),
    /// The owner's balance could not cover the debit. Nothing was written.
    InsufficientBalance { available: i64 },
}

/// Provides append-only operations on the credit ledger.
pub struct LedgerRepo;

impl LedgerRepo {
    /// Derive an owner's balance by summing their entries.
    pub async fn balance(pool: &PgPool, owner_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount_credits), 0)
             FROM ledger_entries WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_one(pool)
        .await
    }

    /// Atomically insert a generation debit if the owner's balance covers
    /// it.
    ///
    /// The transaction takes `pg_advisory_xact_lock(owner_id)` first, so a
    /// concurrent debit for the same owner waits for this one to commit and
    /// then sees its effect in the sum-check.
    pub async fn debit(
        pool: &PgPool,
        owner_id: DbId,
        credits: i64,
        job_id: DbId,
    ) -> Result<DebitOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        let available: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_credits), 0)
             FROM ledger_entries WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        if available < credits {
            tx.rollback().await?;
            return Ok(DebitOutcome::InsufficientBalance { available });
        }

        let query = format!(
            "INSERT INTO ledger_entries (owner_id, amount_credits, kind, job_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let entry = sqlx::query_as::<_, LedgerEntry>(&query)
            .bind(owner_id)
            .bind(-credits)
            .bind(EntryKind::GenerationDebit.as_str())
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DebitOutcome::Admitted(entry))
    }

    /// Insert a positive entry: purchase, bonus, or a refund offsetting a
    /// prior debit. Refunds carry the job link for audit.
    pub async fn credit(
        pool: &PgPool,
        owner_id: DbId,
        credits: i64,
        kind: EntryKind,
        job_id: Option<DbId>,
    ) -> Result<LedgerEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO ledger_entries (owner_id, amount_credits, kind, job_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LedgerEntry>(&query)
            .bind(owner_id)
            .bind(credits)
            .bind(kind.as_str())
            .bind(job_id)
            .fetch_one(pool)
            .await
    }

    /// All entries linked to a job, oldest first. Used by the conservation
    /// checks and reconciliation tooling.
    pub async fn entries_for_job(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ledger_entries
             WHERE job_id = $1
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, LedgerEntry>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    /// All entries for an owner, newest first.
    pub async fn entries_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ledger_entries
             WHERE owner_id = $1
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, LedgerEntry>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }
}
