//! Append-only record ledger for MedRec.
//!
//! This crate is the heart of MedRec. It provides:
//! - [`RecordLedger`], mapping each subject to an ordered, hash-linked
//!   sequence of [`RecordEntry`](medrec_types::RecordEntry) values
//! - `RecordWriter` / `RecordReader` trait boundaries
//! - Collaborator seams: [`Authorizer`] and [`SubmissionChannel`]
//! - Per-subject read consent ([`ConsentRegistry`]) behind the [`ReadGate`] seam
//! - A crash-recoverable [`Journal`] for persistence
//! - Chain validation (sequence numbering, hash links, subject attribution)

pub mod auth;
pub mod channel;
pub mod clock;
pub mod config;
pub mod consent;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod traits;
pub mod validation;

pub use auth::{AllowAll, AllowList, Authorizer};
pub use channel::{Acknowledgment, AppendRequest, LocalChannel, SubmissionChannel};
pub use clock::HybridLogicalClock;
pub use config::{LedgerConfig, SyncMode};
pub use consent::{ConsentAction, ConsentEvent, ConsentRegistry, OpenReads, ReadGate};
pub use error::{ChannelError, JournalError, LedgerError, Outcome};
pub use journal::{Journal, Recovery};
pub use ledger::RecordLedger;
pub use traits::{RecordReader, RecordWriter};
pub use validation::{ChainValidator, ValidationReport, Violation, ViolationKind};
