use std::collections::HashSet;

use medrec_types::{CallerIdentity, SubjectId};

use crate::error::LedgerError;

/// Delegated authorization check run before every append.
///
/// Callers arrive already authenticated; the authorizer only decides
/// whether this identity may add records for this subject.
pub trait Authorizer: Send + Sync {
    fn authorize_append(
        &self,
        caller: &CallerIdentity,
        subject: &SubjectId,
    ) -> Result<(), LedgerError>;
}

/// Accepts every caller. Matches a deployment with no access control.
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize_append(
        &self,
        _caller: &CallerIdentity,
        _subject: &SubjectId,
    ) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// Accepts only callers on a fixed list, e.g. approved clinicians.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    callers: HashSet<CallerIdentity>,
}

impl AllowList {
    pub fn new(callers: impl IntoIterator<Item = CallerIdentity>) -> Self {
        Self {
            callers: callers.into_iter().collect(),
        }
    }

    pub fn permits(&self, caller: &CallerIdentity) -> bool {
        self.callers.contains(caller)
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

impl Authorizer for AllowList {
    fn authorize_append(
        &self,
        caller: &CallerIdentity,
        subject: &SubjectId,
    ) -> Result<(), LedgerError> {
        if self.permits(caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized(format!(
                "{caller} may not append records for {subject}"
            )))
        }
    }
}
