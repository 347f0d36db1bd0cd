use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use medrec_ledger::{ReadGate, RecordReader, RecordWriter};
use medrec_types::{RecordEntry, RecordPointer, RequestId, SubjectId, TemporalAnchor};

use crate::error::ClientResult;
use crate::identity::IdentityProvider;

/// What a caller gets back from a successful submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub sequence: u64,
    pub timestamp: TemporalAnchor,
    pub request_id: RequestId,
}

impl From<&RecordEntry> for SubmitReceipt {
    fn from(entry: &RecordEntry) -> Self {
        Self {
            sequence: entry.sequence(),
            timestamp: entry.timestamp(),
            request_id: entry.request_id(),
        }
    }
}

/// One record as shown to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    pub pointer: String,
    pub sequence: u64,
    pub timestamp: TemporalAnchor,
    pub submitted_by: String,
}

impl From<RecordEntry> for RecordView {
    fn from(entry: RecordEntry) -> Self {
        Self {
            pointer: entry.pointer().as_str().to_string(),
            sequence: entry.sequence(),
            timestamp: entry.timestamp(),
            submitted_by: entry.submitted_by().as_str().to_string(),
        }
    }
}

/// Thin adapter between caller-facing requests and a record ledger.
///
/// Every call goes straight to the ledger; nothing is cached. Reads are open
/// unless a [`ReadGate`] is attached, in which case the current identity must
/// pass it before any record is returned.
pub struct LedgerClient<L> {
    ledger: Arc<L>,
    identity: Arc<dyn IdentityProvider>,
    read_gate: Option<Arc<dyn ReadGate>>,
}

impl<L> LedgerClient<L>
where
    L: RecordWriter + RecordReader,
{
    pub fn new(ledger: Arc<L>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            ledger,
            identity,
            read_gate: None,
        }
    }

    pub fn with_read_gate(mut self, gate: Arc<dyn ReadGate>) -> Self {
        self.read_gate = Some(gate);
        self
    }

    /// Append `pointer` to `subject` on behalf of the current identity.
    pub async fn submit_record(&self, subject: &str, pointer: &str) -> ClientResult<SubmitReceipt> {
        let subject = SubjectId::parse(subject)?;
        let pointer = RecordPointer::parse(pointer)?;
        let caller = self.identity.current_identity()?;

        let entry = self
            .ledger
            .append(subject.as_str(), pointer.as_str(), &caller)
            .await?;
        debug!(subject = %subject, seq = entry.sequence(), "record submitted");
        Ok(SubmitReceipt::from(&entry))
    }

    /// Every record stored for `subject`, oldest first.
    pub fn fetch_records(&self, subject: &str) -> ClientResult<Vec<RecordView>> {
        let subject = SubjectId::parse(subject)?;
        if let Some(gate) = &self.read_gate {
            let caller = self.identity.current_identity()?;
            gate.authorize_read(&caller, &subject)?;
        }
        let entries = self.ledger.list(subject.as_str())?;
        Ok(entries.into_iter().map(RecordView::from).collect())
    }
}

impl<L> Clone for LedgerClient<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            identity: Arc::clone(&self.identity),
            read_gate: self.read_gate.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use medrec_ledger::{ConsentRegistry, LedgerError, Outcome, RecordLedger};
    use medrec_types::CallerIdentity;

    use crate::error::ClientError;
    use crate::identity::StaticIdentity;

    fn client() -> LedgerClient<RecordLedger> {
        LedgerClient::new(
            Arc::new(RecordLedger::local()),
            Arc::new(StaticIdentity::parse("0xdoctor").unwrap()),
        )
    }

    /// Records how many times the ledger was reached.
    struct CountingLedger {
        inner: RecordLedger,
        appends: AtomicUsize,
        lists: AtomicUsize,
    }

    #[async_trait]
    impl RecordWriter for CountingLedger {
        async fn append(
            &self,
            subject: &str,
            pointer: &str,
            caller: &CallerIdentity,
        ) -> Result<RecordEntry, LedgerError> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            self.inner.append(subject, pointer, caller).await
        }
    }

    impl RecordReader for CountingLedger {
        fn list(&self, subject: &str) -> Result<Vec<RecordEntry>, LedgerError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list(subject)
        }
        fn record_count(&self, subject: &str) -> Result<u64, LedgerError> {
            self.inner.record_count(subject)
        }
        fn get(&self, subject: &str, sequence: u64) -> Result<Option<RecordEntry>, LedgerError> {
            self.inner.get(subject, sequence)
        }
        fn read_range(
            &self,
            subject: &str,
            from: u64,
            to: u64,
        ) -> Result<Vec<RecordEntry>, LedgerError> {
            self.inner.read_range(subject, from, to)
        }
        fn subjects(&self) -> Result<Vec<SubjectId>, LedgerError> {
            self.inner.subjects()
        }
    }

    struct NoIdentity;

    impl IdentityProvider for NoIdentity {
        fn current_identity(&self) -> Result<CallerIdentity, ClientError> {
            Err(ClientError::Identity("no unlocked account".into()))
        }
    }

    #[tokio::test]
    async fn submit_then_fetch() {
        let client = client();
        let receipt = client.submit_record("PAT001", "QmHash123").await.unwrap();
        assert_eq!(receipt.sequence, 0);

        let records = client.fetch_records("PAT001").unwrap();
        assert_eq!(
            records,
            vec![RecordView {
                pointer: "QmHash123".into(),
                sequence: 0,
                timestamp: receipt.timestamp,
                submitted_by: "0xdoctor".into(),
            }]
        );
    }

    #[tokio::test]
    async fn fetch_unknown_subject_is_empty() {
        assert!(client().fetch_records("PAT404").unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_input_never_reaches_ledger() {
        let ledger = Arc::new(CountingLedger {
            inner: RecordLedger::local(),
            appends: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
        });
        let client = LedgerClient::new(
            Arc::clone(&ledger),
            Arc::new(StaticIdentity::parse("0xdoctor").unwrap()),
        );

        let err = client.submit_record("PAT001", " ").await.unwrap_err();
        assert!(matches!(err, ClientError::Input(_)));
        assert_eq!(err.outcome(), Outcome::NotApplied);
        assert!(client.fetch_records("").is_err());

        assert_eq!(ledger.appends.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.lists.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn every_fetch_is_a_live_call() {
        let ledger = Arc::new(CountingLedger {
            inner: RecordLedger::local(),
            appends: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
        });
        let client = LedgerClient::new(
            Arc::clone(&ledger),
            Arc::new(StaticIdentity::parse("0xdoctor").unwrap()),
        );

        client.fetch_records("PAT001").unwrap();
        client.submit_record("PAT001", "QmA").await.unwrap();
        let after = client.fetch_records("PAT001").unwrap();

        assert_eq!(after.len(), 1);
        assert_eq!(ledger.appends.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_identity_is_reported() {
        let client = LedgerClient::new(Arc::new(RecordLedger::local()), Arc::new(NoIdentity));
        let err = client.submit_record("PAT001", "QmA").await.unwrap_err();
        assert!(matches!(err, ClientError::Identity(_)));
        assert!(client.fetch_records("PAT001").unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_gate_requires_consent() {
        let ledger = Arc::new(RecordLedger::local());
        let consent = Arc::new(ConsentRegistry::new(0));
        let doctor = StaticIdentity::parse("0xdoctor").unwrap();
        let nurse = StaticIdentity::parse("0xnurse").unwrap();

        let writer = LedgerClient::new(Arc::clone(&ledger), Arc::new(doctor.clone()));
        writer.submit_record("PAT001", "QmA").await.unwrap();

        let doctor_reads = writer.clone().with_read_gate(consent.clone());
        let nurse_reads =
            LedgerClient::new(Arc::clone(&ledger), Arc::new(nurse)).with_read_gate(consent.clone());

        let err = doctor_reads.fetch_records("PAT001").unwrap_err();
        assert!(matches!(err, ClientError::Ledger(LedgerError::Unauthorized(_))));

        consent
            .grant("PAT001", &doctor.current_identity().unwrap())
            .unwrap();
        assert_eq!(doctor_reads.fetch_records("PAT001").unwrap().len(), 1);
        assert!(nurse_reads.fetch_records("PAT001").is_err());

        consent
            .revoke("PAT001", &doctor.current_identity().unwrap())
            .unwrap();
        assert!(doctor_reads.fetch_records("PAT001").is_err());
        // Ungated clients still read freely.
        assert_eq!(writer.fetch_records("PAT001").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn gated_read_needs_an_identity() {
        let client = LedgerClient::new(Arc::new(RecordLedger::local()), Arc::new(NoIdentity))
            .with_read_gate(Arc::new(ConsentRegistry::new(0)));
        let err = client.fetch_records("PAT001").unwrap_err();
        assert!(matches!(err, ClientError::Identity(_)));
    }

    #[test]
    fn receipt_serializes_for_callers() {
        let entry = RecordEntry::seal(
            SubjectId::parse("PAT001").unwrap(),
            RecordPointer::parse("QmA").unwrap(),
            3,
            CallerIdentity::parse("0xdoctor").unwrap(),
            TemporalAnchor::new(1_000, 0, 0),
            RequestId::new(),
            None,
        )
        .unwrap();

        let json = serde_json::to_value(SubmitReceipt::from(&entry)).unwrap();
        assert_eq!(json["sequence"], 3);
        assert_eq!(json["timestamp"]["physical_ms"], 1_000);

        let view = serde_json::to_value(RecordView::from(entry)).unwrap();
        assert_eq!(view["pointer"], "QmA");
        assert_eq!(view["submitted_by"], "0xdoctor");
    }
}
