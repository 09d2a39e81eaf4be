//! Job, batch, and batch-item lifecycle statuses plus the job state
//! machine (RF-16).
//!
//! Status discriminants match the seed data order (1-based) in the
//! corresponding `*_statuses` lookup tables, so the same enums serve the
//! persistence layer and the pipeline.

use crate::error::CoreError;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Lowercase label stored in logs and API payloads.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }

            /// Reverse lookup from a database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Generation job lifecycle status.
    JobStatus {
        /// Debited and dispatched (or awaiting dispatch); the only
        /// non-terminal state.
        Processing = 1 => "processing",
        /// Provider succeeded and the result passed the quality gate.
        Completed = 2 => "completed",
        /// Terminal failure: provider error, timeout, or unrecoverable
        /// quality failure. Always refunded.
        Failed = 3 => "failed",
        /// Quality-failed and replaced by a regeneration job. Refunded at
        /// supersession.
        Superseded = 4 => "superseded",
    }
}

define_status_enum! {
    /// Batch aggregate status.
    BatchStatus {
        Pending = 1 => "pending",
        Running = 2 => "running",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

define_status_enum! {
    /// Batch item status.
    ItemStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
        /// Removed by the owner before any dispatch or debit.
        Deleted = 5 => "deleted",
    }
}

// ---------------------------------------------------------------------------
// Job state machine
// ---------------------------------------------------------------------------

/// Valid target statuses reachable from `from`.
///
/// Terminal states return an empty slice; no further transitions are
/// allowed. There is no transition back into `Processing` — a regeneration
/// is a new job row, never a rewind of the old one.
pub fn valid_transitions(from: JobStatus) -> &'static [JobStatus] {
    match from {
        JobStatus::Processing => &[
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Superseded,
        ],
        JobStatus::Completed | JobStatus::Failed | JobStatus::Superseded => &[],
    }
}

/// Check whether a transition is valid.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a transition, returning a descriptive error for invalid ones.
pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Invalid job transition: {} ({}) -> {} ({})",
            from.as_str(),
            from.id(),
            to.as_str(),
            to.id(),
        )))
    }
}

/// Whether a job status is terminal.
pub fn is_terminal(status: JobStatus) -> bool {
    valid_transitions(status).is_empty()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
