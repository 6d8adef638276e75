use thiserror::Error;

use crate::model::ClientIndex;

/// Errors raised by the variant matrix engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// The selection would produce more combinations than allowed. Rows are
    /// left as they were.
    #[error("selection produces {total} combinations, more than the limit of {cap}")]
    CapExceeded { total: usize, cap: usize },

    #[error("unknown attribute group: {0}")]
    UnknownGroup(String),

    #[error("no variant row with client index {0}")]
    RowNotFound(ClientIndex),

    #[error("a submission is already in flight")]
    SubmissionInFlight,

    #[error("no submission is in flight")]
    NoSubmissionInFlight,

    /// The transport reported a failure; local state is unchanged
    #[error("submission failed: {0}")]
    Submission(String),

    /// A remote variant could not be canonicalized and was skipped
    #[error("remote variant #{index} skipped: {reason}")]
    ReconciliationMismatch { index: usize, reason: String },

    #[error("operation not allowed while {0}")]
    InvalidPhase(&'static str),
}

impl MatrixError {
    pub fn is_cap_exceeded(&self) -> bool {
        matches!(self, MatrixError::CapExceeded { .. })
    }
}

pub type MatrixResult<T> = std::result::Result<T, MatrixError>;
