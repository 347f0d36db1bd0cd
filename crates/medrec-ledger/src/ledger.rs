use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use medrec_types::{CallerIdentity, RecordEntry, RecordPointer, RequestId, SubjectId};

use crate::auth::{AllowAll, Authorizer};
use crate::channel::{AppendRequest, LocalChannel, SubmissionChannel};
use crate::clock::HybridLogicalClock;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::journal::Journal;
use crate::traits::{RecordReader, RecordWriter};
use crate::validation::{ChainValidator, ValidationReport};

/// History of one subject.
///
/// `writer` serializes appends and is held across the submission await.
/// `entries` is only locked briefly to push a committed entry or clone a
/// snapshot, so readers never wait on an in-flight submission.
#[derive(Default)]
struct SubjectLog {
    writer: tokio::sync::Mutex<()>,
    entries: RwLock<Vec<RecordEntry>>,
}

impl SubjectLog {
    fn from_entries(entries: Vec<RecordEntry>) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(()),
            entries: RwLock::new(entries),
        }
    }

    /// Next sequence number and the hash it must link to.
    fn position(&self) -> Result<(u64, Option<[u8; 32]>), LedgerError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LedgerError::poisoned("subject"))?;
        Ok((
            entries.len() as u64,
            entries.last().map(|e| e.entry_hash()),
        ))
    }

    fn commit(&self, entry: RecordEntry) -> Result<(), LedgerError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LedgerError::poisoned("subject"))?;
        if entry.sequence() != entries.len() as u64 {
            return Err(LedgerError::IntegrityViolation {
                subject: entry.subject().to_string(),
                sequence: entry.sequence(),
                reason: format!("commit out of order; expected seq {}", entries.len()),
            });
        }
        entries.push(entry);
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<RecordEntry>, LedgerError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| LedgerError::poisoned("subject"))?
            .clone())
    }

    fn len(&self) -> Result<u64, LedgerError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| LedgerError::poisoned("subject"))?
            .len() as u64)
    }
}

/// Authoritative, append-only map from subject to record history.
///
/// Appends to the same subject are serialized; appends to different subjects
/// proceed independently. An entry becomes visible to readers only after the
/// submission channel acknowledged it and (when persistent) the journal
/// stored it.
pub struct RecordLedger {
    config: LedgerConfig,
    clock: HybridLogicalClock,
    authorizer: Arc<dyn Authorizer>,
    channel: Arc<dyn SubmissionChannel>,
    journal: Option<Journal>,
    subjects: RwLock<HashMap<SubjectId, Arc<SubjectLog>>>,
}

impl RecordLedger {
    /// Open a ledger, recovering state from the configured journal.
    ///
    /// Every recovered subject history is chain-validated; a broken history
    /// fails the open instead of being served.
    pub fn open(
        config: LedgerConfig,
        authorizer: Arc<dyn Authorizer>,
        channel: Arc<dyn SubmissionChannel>,
    ) -> Result<Self, LedgerError> {
        Self::open_with(config, authorizer, channel, true)
    }

    /// Open a ledger without chain-validating the recovered histories.
    ///
    /// Used to inspect a damaged journal: [`verify_subject`](Self::verify_subject)
    /// and [`verify_all`](Self::verify_all) report what [`open`](Self::open)
    /// would refuse.
    pub fn open_unverified(
        config: LedgerConfig,
        authorizer: Arc<dyn Authorizer>,
        channel: Arc<dyn SubmissionChannel>,
    ) -> Result<Self, LedgerError> {
        Self::open_with(config, authorizer, channel, false)
    }

    fn open_with(
        config: LedgerConfig,
        authorizer: Arc<dyn Authorizer>,
        channel: Arc<dyn SubmissionChannel>,
        validate: bool,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let clock = HybridLogicalClock::new(config.node_id);

        let (journal, recovered) = match &config.journal_path {
            Some(path) => {
                let journal = Journal::open(path, config.sync_mode)?;
                let recovery = journal.recover()?;
                let file_len = journal.offset()?;
                if recovery.valid_len < file_len {
                    warn!(
                        path = %journal.path().display(),
                        valid_len = recovery.valid_len,
                        file_len,
                        "discarding torn journal tail"
                    );
                    journal.truncate(recovery.valid_len)?;
                }
                (Some(journal), recovery.entries)
            }
            None => (None, Vec::new()),
        };

        let mut histories: HashMap<SubjectId, Vec<RecordEntry>> = HashMap::new();
        for entry in recovered {
            clock.observe(&entry.timestamp());
            histories
                .entry(entry.subject().clone())
                .or_default()
                .push(entry);
        }

        let mut subjects = HashMap::with_capacity(histories.len());
        let mut total = 0usize;
        for (subject, entries) in histories {
            if validate {
                ChainValidator::validate(&subject, &entries).into_result()?;
            }
            total += entries.len();
            subjects.insert(subject, Arc::new(SubjectLog::from_entries(entries)));
        }

        info!(
            node_id = config.node_id,
            persistent = journal.is_some(),
            subjects = subjects.len(),
            entries = total,
            "record ledger opened"
        );

        Ok(Self {
            config,
            clock,
            authorizer,
            channel,
            journal,
            subjects: RwLock::new(subjects),
        })
    }

    /// Empty, non-persistent ledger with the given collaborators.
    pub fn in_memory(
        authorizer: Arc<dyn Authorizer>,
        channel: Arc<dyn SubmissionChannel>,
    ) -> Self {
        Self {
            clock: HybridLogicalClock::new(0),
            config: LedgerConfig::in_memory(),
            authorizer,
            channel,
            journal: None,
            subjects: RwLock::new(HashMap::new()),
        }
    }

    /// Empty, non-persistent ledger that accepts every caller and
    /// acknowledges every submission in-process.
    pub fn local() -> Self {
        Self::in_memory(Arc::new(AllowAll), Arc::new(LocalChannel))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn is_persistent(&self) -> bool {
        self.journal.is_some()
    }

    /// Append with the configured submit timeout.
    pub async fn append(
        &self,
        subject: &str,
        pointer: &str,
        caller: &CallerIdentity,
    ) -> Result<RecordEntry, LedgerError> {
        self.append_with_timeout(subject, pointer, caller, self.config.submit_timeout())
            .await
    }

    /// Append a record pointer for `subject`.
    ///
    /// Dropping the returned future before it completes leaves the ledger
    /// unchanged; the next append for the subject gets the same sequence the
    /// abandoned one would have received.
    pub async fn append_with_timeout(
        &self,
        subject: &str,
        pointer: &str,
        caller: &CallerIdentity,
        timeout: Duration,
    ) -> Result<RecordEntry, LedgerError> {
        let subject = SubjectId::parse(subject)?;
        let pointer = RecordPointer::parse(pointer)?;

        if let Err(e) = self.authorizer.authorize_append(caller, &subject) {
            warn!(caller = %caller.short_id(), subject = %subject, "append denied");
            return Err(e);
        }

        loop {
            let log = self.subject_log(&subject)?;
            let _writer = log.writer.lock().await;
            // A failed first append may have dropped this log from the map
            // while we waited; committing into it would hide the entry.
            if !self.is_current(&subject, &log)? {
                continue;
            }

            let result = self
                .append_locked(&log, subject.clone(), pointer.clone(), caller, timeout)
                .await;
            if result.is_err() {
                if let Err(e) = self.forget_if_empty(&subject, &log) {
                    debug!(subject = %subject, error = %e, "could not drop empty subject log");
                }
            }
            return result;
        }
    }

    /// Submit and commit one entry. The caller holds `log.writer`.
    async fn append_locked(
        &self,
        log: &SubjectLog,
        subject: SubjectId,
        pointer: RecordPointer,
        caller: &CallerIdentity,
        timeout: Duration,
    ) -> Result<RecordEntry, LedgerError> {
        let (sequence, prev_hash) = log.position()?;
        let request = AppendRequest {
            request_id: RequestId::new(),
            subject,
            pointer,
            caller: caller.clone(),
            sequence,
        };

        let ack = match tokio::time::timeout(timeout, self.channel.submit(&request)).await {
            Ok(Ok(ack)) => ack,
            Ok(Err(e)) => {
                warn!(
                    request = %request.request_id,
                    subject = %request.subject,
                    error = %e,
                    "submission failed"
                );
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    request = %request.request_id,
                    subject = %request.subject,
                    ?timeout,
                    "submission timed out; outcome unknown"
                );
                return Err(LedgerError::SubmissionTimeout(timeout));
            }
        };

        if ack.request_id != request.request_id || ack.sequence != request.sequence {
            return Err(LedgerError::SubmissionFailed(format!(
                "acknowledgment {} seq {} does not match request {} seq {}",
                ack.request_id, ack.sequence, request.request_id, request.sequence
            )));
        }

        let AppendRequest {
            request_id,
            subject,
            pointer,
            caller,
            sequence,
        } = request;
        let entry = RecordEntry::seal(
            subject,
            pointer,
            sequence,
            caller,
            self.clock.now(),
            request_id,
            prev_hash,
        )?;

        if let Some(journal) = &self.journal {
            journal.append(&entry)?;
        }
        log.commit(entry.clone())?;

        info!(
            subject = %entry.subject(),
            seq = entry.sequence(),
            caller = %entry.submitted_by().short_id(),
            hash = %entry.short_hash(),
            reference = ack.reference.as_deref().unwrap_or("-"),
            "record appended"
        );
        Ok(entry)
    }

    /// Snapshot of every acknowledged entry for `subject`, in sequence order.
    pub fn list(&self, subject: &str) -> Result<Vec<RecordEntry>, LedgerError> {
        let subject = SubjectId::parse(subject)?;
        match self.existing_log(&subject)? {
            Some(log) => log.snapshot(),
            None => Ok(Vec::new()),
        }
    }

    /// Validate one subject's sequence numbering and hash chain.
    pub fn verify_subject(&self, subject: &str) -> Result<ValidationReport, LedgerError> {
        let subject = SubjectId::parse(subject)?;
        ChainValidator::validate_reader(self, &subject)
    }

    /// Validate every subject with at least one entry.
    pub fn verify_all(&self) -> Result<Vec<ValidationReport>, LedgerError> {
        let reports = self
            .subjects()?
            .iter()
            .map(|subject| ChainValidator::validate_reader(self, subject))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(subjects = reports.len(), "ledger verified");
        Ok(reports)
    }

    fn existing_log(&self, subject: &SubjectId) -> Result<Option<Arc<SubjectLog>>, LedgerError> {
        let subjects = self
            .subjects
            .read()
            .map_err(|_| LedgerError::poisoned("ledger"))?;
        Ok(subjects.get(subject).cloned())
    }

    fn subject_log(&self, subject: &SubjectId) -> Result<Arc<SubjectLog>, LedgerError> {
        if let Some(log) = self.existing_log(subject)? {
            return Ok(log);
        }
        let mut subjects = self
            .subjects
            .write()
            .map_err(|_| LedgerError::poisoned("ledger"))?;
        Ok(subjects.entry(subject.clone()).or_default().clone())
    }

    fn is_current(&self, subject: &SubjectId, log: &Arc<SubjectLog>) -> Result<bool, LedgerError> {
        Ok(self
            .existing_log(subject)?
            .is_some_and(|current| Arc::ptr_eq(&current, log)))
    }

    /// Remove a log that never received an entry.
    fn forget_if_empty(&self, subject: &SubjectId, log: &Arc<SubjectLog>) -> Result<(), LedgerError> {
        if log.len()? > 0 {
            return Ok(());
        }
        let mut subjects = self
            .subjects
            .write()
            .map_err(|_| LedgerError::poisoned("ledger"))?;
        if subjects
            .get(subject)
            .is_some_and(|current| Arc::ptr_eq(current, log))
        {
            subjects.remove(subject);
        }
        Ok(())
    }
}

#[async_trait]
impl RecordWriter for RecordLedger {
    async fn append(
        &self,
        subject: &str,
        pointer: &str,
        caller: &CallerIdentity,
    ) -> Result<RecordEntry, LedgerError> {
        RecordLedger::append(self, subject, pointer, caller).await
    }
}

impl RecordReader for RecordLedger {
    fn list(&self, subject: &str) -> Result<Vec<RecordEntry>, LedgerError> {
        RecordLedger::list(self, subject)
    }

    fn record_count(&self, subject: &str) -> Result<u64, LedgerError> {
        let subject = SubjectId::parse(subject)?;
        match self.existing_log(&subject)? {
            Some(log) => log.len(),
            None => Ok(0),
        }
    }

    fn get(&self, subject: &str, sequence: u64) -> Result<Option<RecordEntry>, LedgerError> {
        let subject = SubjectId::parse(subject)?;
        let Some(log) = self.existing_log(&subject)? else {
            return Ok(None);
        };
        let entries = log
            .entries
            .read()
            .map_err(|_| LedgerError::poisoned("subject"))?;
        Ok(usize::try_from(sequence)
            .ok()
            .and_then(|i| entries.get(i))
            .cloned())
    }

    fn read_range(
        &self,
        subject: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RecordEntry>, LedgerError> {
        if from > to {
            return Err(LedgerError::InvalidRange { from, to });
        }
        let subject = SubjectId::parse(subject)?;
        let Some(log) = self.existing_log(&subject)? else {
            return Ok(Vec::new());
        };
        let entries = log
            .entries
            .read()
            .map_err(|_| LedgerError::poisoned("subject"))?;

        let len = entries.len() as u64;
        if from >= len {
            return Ok(Vec::new());
        }
        let end_exclusive = to.saturating_add(1).min(len);
        Ok(entries[from as usize..end_exclusive as usize].to_vec())
    }

    fn subjects(&self) -> Result<Vec<SubjectId>, LedgerError> {
        let logs: Vec<(SubjectId, Arc<SubjectLog>)> = {
            let subjects = self
                .subjects
                .read()
                .map_err(|_| LedgerError::poisoned("ledger"))?;
            subjects
                .iter()
                .map(|(id, log)| (id.clone(), Arc::clone(log)))
                .collect()
        };

        let mut ids = Vec::with_capacity(logs.len());
        for (id, log) in logs {
            // Logs are created before the first submission is acknowledged.
            if log.len()? > 0 {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
