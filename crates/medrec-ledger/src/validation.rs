use medrec_types::{RecordEntry, SubjectId};

use crate::error::LedgerError;
use crate::traits::RecordReader;

/// Result of validating one subject's history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub subject: SubjectId,
    pub entry_count: u64,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// First violation as a ledger error, if any.
    pub fn into_result(self) -> Result<Self, LedgerError> {
        match self.violations.first() {
            None => Ok(self),
            Some(v) => Err(LedgerError::IntegrityViolation {
                subject: self.subject.to_string(),
                sequence: v.sequence,
                reason: v.description.clone(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub sequence: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    SequenceGap,
    HashChainBreak,
    HashMismatch,
    SubjectMismatch,
}

/// Checks sequence numbering and hash links of a subject's history.
pub struct ChainValidator;

impl ChainValidator {
    /// Validate entries that are expected to be the complete history of
    /// `subject`, in order.
    pub fn validate(subject: &SubjectId, entries: &[RecordEntry]) -> ValidationReport {
        let mut violations = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            let expected_seq = index as u64;

            if entry.subject() != subject {
                violations.push(Violation {
                    sequence: entry.sequence(),
                    kind: ViolationKind::SubjectMismatch,
                    description: format!("entry belongs to {}", entry.subject()),
                });
            }

            if entry.sequence() != expected_seq {
                violations.push(Violation {
                    sequence: entry.sequence(),
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected_seq}, found {}", entry.sequence()),
                });
            }

            let expected_prev = index.checked_sub(1).map(|i| entries[i].entry_hash());
            if entry.prev_hash() != expected_prev {
                violations.push(Violation {
                    sequence: entry.sequence(),
                    kind: ViolationKind::HashChainBreak,
                    description: "previous hash link mismatch".into(),
                });
            }

            match entry.verify_hash() {
                Ok(true) => {}
                Ok(false) => violations.push(Violation {
                    sequence: entry.sequence(),
                    kind: ViolationKind::HashMismatch,
                    description: "entry hash does not match content".into(),
                }),
                Err(e) => violations.push(Violation {
                    sequence: entry.sequence(),
                    kind: ViolationKind::HashMismatch,
                    description: format!("entry hash could not be computed: {e}"),
                }),
            }
        }

        ValidationReport {
            subject: subject.clone(),
            entry_count: entries.len() as u64,
            violations,
        }
    }

    /// Validate a subject as currently visible through a reader.
    pub fn validate_reader<R: RecordReader + ?Sized>(
        reader: &R,
        subject: &SubjectId,
    ) -> Result<ValidationReport, LedgerError> {
        let entries = reader.list(subject.as_str())?;
        Ok(Self::validate(subject, &entries))
    }
}
