use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medrec_client::{ClientError, LedgerClient, Outcome, StaticIdentity};
use medrec_ledger::{
    Acknowledgment, AllowList, AppendRequest, ChannelError, LedgerConfig, LedgerError,
    LocalChannel, RecordLedger, SubmissionChannel,
};
use medrec_types::CallerIdentity;

struct Unreachable;

#[async_trait]
impl SubmissionChannel for Unreachable {
    async fn submit(&self, _request: &AppendRequest) -> Result<Acknowledgment, ChannelError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(ChannelError::Unavailable("never answered".into()))
    }
}

fn doctor() -> CallerIdentity {
    CallerIdentity::parse("0xdoctor").unwrap()
}

fn client_for(ledger: Arc<RecordLedger>, caller: &str) -> LedgerClient<RecordLedger> {
    LedgerClient::new(ledger, Arc::new(StaticIdentity::parse(caller).unwrap()))
}

#[tokio::test]
async fn two_clients_share_one_history() {
    let ledger = Arc::new(RecordLedger::local());
    let first = client_for(Arc::clone(&ledger), "caller1");
    let second = client_for(Arc::clone(&ledger), "caller2");

    first.submit_record("PAT002", "QmHash456").await.unwrap();
    second.submit_record("PAT002", "QmHash789").await.unwrap();

    let seen_by_first = first.fetch_records("PAT002").unwrap();
    assert_eq!(seen_by_first, second.fetch_records("PAT002").unwrap());
    let summary: Vec<_> = seen_by_first
        .iter()
        .map(|r| (r.pointer.as_str(), r.sequence, r.submitted_by.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![("QmHash456", 0, "caller1"), ("QmHash789", 1, "caller2")]
    );
}

#[tokio::test]
async fn allow_list_gates_submission() {
    let ledger = Arc::new(RecordLedger::in_memory(
        Arc::new(AllowList::new([doctor()])),
        Arc::new(LocalChannel),
    ));

    let stranger = client_for(Arc::clone(&ledger), "0xstranger");
    let err = stranger.submit_record("PAT001", "QmA").await.unwrap_err();
    assert!(matches!(err, ClientError::Ledger(LedgerError::Unauthorized(_))));
    assert_eq!(err.outcome(), Outcome::NotApplied);

    // Reads stay open to any caller.
    assert!(stranger.fetch_records("PAT001").unwrap().is_empty());

    let doctor_client = client_for(ledger, "0xdoctor");
    assert_eq!(doctor_client.submit_record("PAT001", "QmA").await.unwrap().sequence, 0);
    assert_eq!(stranger.fetch_records("PAT001").unwrap().len(), 1);
}

#[tokio::test]
async fn unanswered_submission_times_out() {
    let config = LedgerConfig {
        submit_timeout_ms: 25,
        ..LedgerConfig::default()
    };
    let ledger = Arc::new(
        RecordLedger::open(config, Arc::new(medrec_ledger::AllowAll), Arc::new(Unreachable))
            .unwrap(),
    );
    let client = client_for(ledger, "0xdoctor");

    let err = client.submit_record("PAT001", "QmA").await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Ledger(LedgerError::SubmissionTimeout(Duration::from_millis(25)))
    );
    assert_eq!(err.outcome(), Outcome::Unknown);
    assert!(err.is_retryable());
    assert!(client.fetch_records("PAT001").unwrap().is_empty());
}

#[tokio::test]
async fn persisted_records_survive_a_new_client() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::persistent(dir.path().join("records.journal"));

    {
        let ledger = RecordLedger::open(
            config.clone(),
            Arc::new(medrec_ledger::AllowAll),
            Arc::new(LocalChannel),
        )
        .unwrap();
        let client = client_for(Arc::new(ledger), "0xdoctor");
        client.submit_record("PAT003", "QmFirst").await.unwrap();
    }

    let ledger = RecordLedger::open(
        config,
        Arc::new(medrec_ledger::AllowAll),
        Arc::new(LocalChannel),
    )
    .unwrap();
    let client = client_for(Arc::new(ledger), "0xnurse");
    let receipt = client.submit_record("PAT003", "QmSecond").await.unwrap();
    assert_eq!(receipt.sequence, 1);

    let records = client.fetch_records("PAT003").unwrap();
    assert_eq!(records[0].submitted_by, "0xdoctor");
    assert_eq!(records[1].submitted_by, "0xnurse");
}
