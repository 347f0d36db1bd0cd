use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::{CallerIdentity, RecordPointer, SubjectId};
use crate::temporal::TemporalAnchor;

const ENTRY_DOMAIN: &[u8] = b"medrec-entry-v1:";

/// Identifier attached to every append request (UUID v7).
///
/// Used to correlate an append whose outcome is unknown (timeout, dropped
/// connection) with what the ledger eventually holds. The ledger never
/// deduplicates on it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    /// Generate a new time-ordered request ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Short representation (first 8 characters of the UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.short_id())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single record registered against a subject.
///
/// Entries are hash-linked per subject: `prev_hash` is the `entry_hash` of
/// the entry with `sequence - 1`, and `None` for sequence 0. `entry_hash`
/// covers every other field. Fields are read-only once sealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    subject: SubjectId,
    pointer: RecordPointer,
    sequence: u64,
    submitted_by: CallerIdentity,
    timestamp: TemporalAnchor,
    request_id: RequestId,
    prev_hash: Option<[u8; 32]>,
    entry_hash: [u8; 32],
}

impl RecordEntry {
    /// Build an entry and compute its hash.
    pub fn seal(
        subject: SubjectId,
        pointer: RecordPointer,
        sequence: u64,
        submitted_by: CallerIdentity,
        timestamp: TemporalAnchor,
        request_id: RequestId,
        prev_hash: Option<[u8; 32]>,
    ) -> Result<Self, TypeError> {
        let mut entry = Self {
            subject,
            pointer,
            sequence,
            submitted_by,
            timestamp,
            request_id,
            prev_hash,
            entry_hash: [0; 32],
        };
        entry.entry_hash = entry.compute_hash()?;
        Ok(entry)
    }

    /// Recompute the hash over the canonical encoding (with `entry_hash`
    /// zeroed).
    pub fn compute_hash(&self) -> Result<[u8; 32], TypeError> {
        let mut canonical = self.clone();
        canonical.entry_hash = [0; 32];

        let encoded = serde_json::to_vec(&canonical)
            .map_err(|e| TypeError::Serialization(e.to_string()))?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(ENTRY_DOMAIN);
        hasher.update(&encoded);
        Ok(*hasher.finalize().as_bytes())
    }

    /// Returns `true` if the stored hash matches the entry's content.
    pub fn verify_hash(&self) -> Result<bool, TypeError> {
        Ok(self.compute_hash()? == self.entry_hash)
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn pointer(&self) -> &RecordPointer {
        &self.pointer
    }

    /// Position in the subject's history, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn submitted_by(&self) -> &CallerIdentity {
        &self.submitted_by
    }

    pub fn timestamp(&self) -> TemporalAnchor {
        self.timestamp
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn prev_hash(&self) -> Option<[u8; 32]> {
        self.prev_hash
    }

    pub fn entry_hash(&self) -> [u8; 32] {
        self.entry_hash
    }

    /// Short hex hash (first 8 characters).
    pub fn short_hash(&self) -> String {
        hex::encode(&self.entry_hash[..4])
    }
}
