use thiserror::Error;

use medrec_ledger::{LedgerError, Outcome};
use medrec_types::TypeError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("no caller identity: {0}")]
    Identity(String),

    #[error("invalid input: {0}")]
    Input(#[from] TypeError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ClientError {
    /// Whether the failed call may have changed ledger state.
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Ledger(e) => e.outcome(),
            Self::Identity(_) | Self::Input(_) => Outcome::NotApplied,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Ledger(e) if e.is_retryable())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
