//! Credit ledger entry kinds and balance arithmetic (RF-17).
//!
//! The ledger is append-only: an owner's balance is the sum of their entry
//! amounts, and corrections are offsetting entries, never updates. The
//! atomic balance-checked insert lives in the persistence layer; the pure
//! arithmetic and invariant checks live here.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Entry kind
// ---------------------------------------------------------------------------

/// Kind of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Credits bought by the owner. Positive amount.
    Purchase,
    /// Cost of a generation job. Negative amount, linked to the job.
    GenerationDebit,
    /// Offset of a prior debit after a failure. Positive amount, linked to
    /// the same job as the debit.
    Refund,
    /// Promotional or goodwill credits. Positive amount.
    Bonus,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::GenerationDebit => "generation_debit",
            Self::Refund => "refund",
            Self::Bonus => "bonus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(Self::Purchase),
            "generation_debit" => Some(Self::GenerationDebit),
            "refund" => Some(Self::Refund),
            "bonus" => Some(Self::Bonus),
            _ => None,
        }
    }

    /// Whether entries of this kind must carry a negative amount.
    pub fn is_debit(self) -> bool {
        matches!(self, Self::GenerationDebit)
    }
}

// ---------------------------------------------------------------------------
// Balance arithmetic
// ---------------------------------------------------------------------------

/// Derive a balance from signed entry amounts.
pub fn balance(amounts: &[i64]) -> i64 {
    amounts.iter().sum()
}

/// Whether a debit of `credits` is admissible against `current_balance`.
///
/// The persistence layer re-checks this under a per-owner lock; this pure
/// form exists for validation before touching the database.
pub fn debit_admissible(current_balance: i64, credits: i64) -> bool {
    credits > 0 && current_balance >= credits
}

/// Validate a debit amount before insert.
pub fn validate_debit_amount(credits: i64) -> Result<(), CoreError> {
    if credits <= 0 {
        return Err(CoreError::Validation(format!(
            "Debit amount must be positive, got {credits}"
        )));
    }
    Ok(())
}

/// Whether a job's linked entries are resolved: they net to zero
/// (debit + refund) or the job legitimately kept its debit (completed work
/// nets to exactly one debit).
///
/// Used by the conservation checks in tests and reconciliation tooling:
/// a terminal-failed job must net to zero, a completed job must net to its
/// single debit.
pub fn entries_net(amounts_linked_to_job: &[i64]) -> i64 {
    amounts_linked_to_job.iter().sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kind_round_trip() {
        for kind in [
            EntryKind::Purchase,
            EntryKind::GenerationDebit,
            EntryKind::Refund,
            EntryKind::Bonus,
        ] {
            assert_eq!(EntryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntryKind::parse("chargeback"), None);
    }

    #[test]
    fn only_generation_debit_is_debit() {
        assert!(EntryKind::GenerationDebit.is_debit());
        assert!(!EntryKind::Purchase.is_debit());
        assert!(!EntryKind::Refund.is_debit());
        assert!(!EntryKind::Bonus.is_debit());
    }

    #[test]
    fn balance_sums_signed_amounts() {
        assert_eq!(balance(&[500, -140, 140, 25]), 525);
        assert_eq!(balance(&[]), 0);
    }

    #[test]
    fn debit_admissible_boundaries() {
        assert!(debit_admissible(140, 140));
        assert!(!debit_admissible(139, 140));
        assert!(!debit_admissible(1000, 0));
        assert!(!debit_admissible(1000, -5));
    }

    #[test]
    fn non_positive_debit_rejected() {
        assert!(validate_debit_amount(0).is_err());
        assert!(validate_debit_amount(-1).is_err());
        assert!(validate_debit_amount(1).is_ok());
    }

    #[test]
    fn refunded_job_nets_to_zero() {
        assert_eq!(entries_net(&[-140, 140]), 0);
    }

    #[test]
    fn completed_job_nets_to_its_debit() {
        assert_eq!(entries_net(&[-140]), -140);
    }
}
