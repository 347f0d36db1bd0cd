//! Foundation types for the MedRec ledger.
//!
//! Every other MedRec crate depends on `medrec-types`.
//!
//! # Key Types
//!
//! - [`SubjectId`] - Patient identifier, the per-stream key of the ledger
//! - [`RecordPointer`] - Content address of externally stored record data
//! - [`CallerIdentity`] - Already-authenticated identity submitting a record
//! - [`RecordEntry`] - Immutable, hash-linked ledger entry
//! - [`TemporalAnchor`] - Hybrid Logical Clock timestamp
//! - [`RequestId`] - UUID v7 attached to every append request

pub mod entry;
pub mod error;
pub mod identity;
pub mod temporal;

pub use entry::{RecordEntry, RequestId};
pub use error::TypeError;
pub use identity::{CallerIdentity, RecordPointer, SubjectId};
pub use temporal::TemporalAnchor;
