use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Trim surrounding whitespace and reject empty tokens.
fn normalize(kind: &'static str, raw: &str) -> Result<String, TypeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TypeError::Empty { kind });
    }
    Ok(trimmed.to_string())
}

/// Identifier of the patient a record belongs to.
///
/// Subjects are opaque, caller-supplied tokens. Two subjects are the same
/// key only if their trimmed text is byte-for-byte equal; no case folding or
/// other normalization is applied.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Parse a subject token, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        normalize("subject", raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubjectId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectId({})", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content address of record data held outside the ledger.
///
/// The ledger never validates the pointer format (CID, URL, hex digest) and
/// never resolves it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordPointer(String);

impl RecordPointer {
    /// Parse a pointer, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        normalize("record pointer", raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RecordPointer {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecordPointer> for String {
    fn from(value: RecordPointer) -> Self {
        value.0
    }
}

impl fmt::Debug for RecordPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordPointer({})", self.0)
    }
}

impl fmt::Display for RecordPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An already-authenticated caller handle, e.g. an account address.
///
/// Authentication happens outside the ledger. The ledger only hands the
/// identity to its authorizer and records it on each entry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        normalize("caller identity", raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short identifier (first 10 characters), for log lines.
    pub fn short_id(&self) -> &str {
        match self.0.char_indices().nth(10) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl TryFrom<String> for CallerIdentity {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CallerIdentity> for String {
    fn from(value: CallerIdentity) -> Self {
        value.0
    }
}

impl fmt::Debug for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallerIdentity({})", self.short_id())
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
