use async_trait::async_trait;

use medrec_types::{CallerIdentity, RecordEntry, SubjectId};

use crate::error::LedgerError;

/// Write boundary for record appends.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn append(
        &self,
        subject: &str,
        pointer: &str,
        caller: &CallerIdentity,
    ) -> Result<RecordEntry, LedgerError>;
}

/// Read boundary for record queries.
///
/// Reads never fail for an unknown subject; they return an empty result.
pub trait RecordReader: Send + Sync {
    fn list(&self, subject: &str) -> Result<Vec<RecordEntry>, LedgerError>;

    fn record_count(&self, subject: &str) -> Result<u64, LedgerError>;

    fn get(&self, subject: &str, sequence: u64) -> Result<Option<RecordEntry>, LedgerError>;

    /// Inclusive range `from..=to`, clipped to the entries that exist.
    fn read_range(
        &self,
        subject: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RecordEntry>, LedgerError>;

    fn subjects(&self) -> Result<Vec<SubjectId>, LedgerError>;
}
