use std::io;
use std::time::Duration;

use medrec_types::TypeError;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("caller not authorized: {0}")]
    Unauthorized(String),

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("submission not acknowledged within {0:?}")]
    SubmissionTimeout(Duration),

    #[error("invalid sequence range: from={from}, to={to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("integrity violation for {subject} at seq {sequence}: {reason}")]
    IntegrityViolation {
        subject: String,
        sequence: u64,
        reason: String,
    },

    #[error("no active consent for {grantee} on {subject}")]
    NoActiveConsent { subject: String, grantee: String },

    #[error("journal error: {0}")]
    Journal(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// What the caller can conclude about ledger state after a failed append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Rejected before any state change; nothing was recorded.
    NotApplied,
    /// The request may or may not have reached the external ledger. The
    /// caller must reconcile (e.g. by listing the subject) before retrying.
    Unknown,
}

impl LedgerError {
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::SubmissionFailed(_) | Self::SubmissionTimeout(_) | Self::Journal(_) => {
                Outcome::Unknown
            }
            _ => Outcome::NotApplied,
        }
    }

    /// Transport-level failures may be retried. For appends the retry is
    /// at-least-once and can record a duplicate entry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SubmissionFailed(_) | Self::SubmissionTimeout(_)
        )
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Internal(format!("{what} lock poisoned"))
    }
}

impl From<TypeError> for LedgerError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::Serialization(msg) => Self::Serialization(msg),
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

/// Failures reported by a [`SubmissionChannel`](crate::SubmissionChannel).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The external ledger refused the caller.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The external ledger could not be reached or failed mid-request.
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

impl From<ChannelError> for LedgerError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Rejected(reason) => Self::Unauthorized(reason),
            ChannelError::Unavailable(reason) => Self::SubmissionFailed(reason),
        }
    }
}

/// Errors produced by the on-disk journal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("journal writer lock poisoned")]
    Poisoned,

    #[error("journal is unusable after a failed write could not be rolled back")]
    Failed,
}

impl From<JournalError> for LedgerError {
    fn from(e: JournalError) -> Self {
        Self::Journal(e.to_string())
    }
}
