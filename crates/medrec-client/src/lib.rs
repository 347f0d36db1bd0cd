//! Client adapter for the MedRec ledger.
//!
//! [`LedgerClient`] attaches the active caller identity to submissions and
//! turns ledger entries into the views handed back to callers.

pub mod client;
pub mod error;
pub mod identity;

pub use client::{LedgerClient, RecordView, SubmitReceipt};
pub use error::{ClientError, ClientResult};
pub use identity::{IdentityProvider, StaticIdentity};

pub use medrec_ledger::{LedgerError, Outcome};
pub use medrec_types::{CallerIdentity, TemporalAnchor};
