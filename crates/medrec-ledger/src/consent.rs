use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use medrec_types::{CallerIdentity, SubjectId, TemporalAnchor};

use crate::clock::HybridLogicalClock;
use crate::error::LedgerError;

/// Check run before a subject's records are handed to a caller.
pub trait ReadGate: Send + Sync {
    fn authorize_read(&self, caller: &CallerIdentity, subject: &SubjectId)
        -> Result<(), LedgerError>;
}

/// Lets every caller read every subject.
pub struct OpenReads;

impl ReadGate for OpenReads {
    fn authorize_read(
        &self,
        _caller: &CallerIdentity,
        _subject: &SubjectId,
    ) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentAction {
    Grant,
    Revoke,
}

/// One change to who may read a subject's records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentEvent {
    pub grantee: CallerIdentity,
    pub action: ConsentAction,
    pub timestamp: TemporalAnchor,
}

/// Per-subject consent history.
///
/// Events are only ever appended. A grantee may read a subject while its
/// latest event for that subject is a grant.
pub struct ConsentRegistry {
    clock: HybridLogicalClock,
    events: RwLock<HashMap<SubjectId, Vec<ConsentEvent>>>,
}

impl ConsentRegistry {
    pub fn new(node_id: u16) -> Self {
        Self {
            clock: HybridLogicalClock::new(node_id),
            events: RwLock::new(HashMap::new()),
        }
    }

    /// Let `grantee` read `subject`'s records. Granting twice is allowed.
    pub fn grant(
        &self,
        subject: &str,
        grantee: &CallerIdentity,
    ) -> Result<ConsentEvent, LedgerError> {
        let subject = SubjectId::parse(subject)?;
        let mut events = self
            .events
            .write()
            .map_err(|_| LedgerError::poisoned("consent"))?;

        let event = ConsentEvent {
            grantee: grantee.clone(),
            action: ConsentAction::Grant,
            timestamp: self.clock.now(),
        };
        events.entry(subject.clone()).or_default().push(event.clone());
        info!(subject = %subject, grantee = %grantee.short_id(), "consent granted");
        Ok(event)
    }

    /// Withdraw an active grant. Fails if `grantee` holds none.
    pub fn revoke(
        &self,
        subject: &str,
        grantee: &CallerIdentity,
    ) -> Result<ConsentEvent, LedgerError> {
        let subject = SubjectId::parse(subject)?;
        let mut events = self
            .events
            .write()
            .map_err(|_| LedgerError::poisoned("consent"))?;

        let history = events.entry(subject.clone()).or_default();
        if !is_active(history, grantee) {
            return Err(LedgerError::NoActiveConsent {
                subject: subject.to_string(),
                grantee: grantee.to_string(),
            });
        }

        let event = ConsentEvent {
            grantee: grantee.clone(),
            action: ConsentAction::Revoke,
            timestamp: self.clock.now(),
        };
        history.push(event.clone());
        info!(subject = %subject, grantee = %grantee.short_id(), "consent revoked");
        Ok(event)
    }

    pub fn is_granted(&self, subject: &str, grantee: &CallerIdentity) -> Result<bool, LedgerError> {
        let subject = SubjectId::parse(subject)?;
        let events = self
            .events
            .read()
            .map_err(|_| LedgerError::poisoned("consent"))?;
        Ok(events
            .get(&subject)
            .is_some_and(|history| is_active(history, grantee)))
    }

    /// Every consent change for `subject`, oldest first.
    pub fn history(&self, subject: &str) -> Result<Vec<ConsentEvent>, LedgerError> {
        let subject = SubjectId::parse(subject)?;
        let events = self
            .events
            .read()
            .map_err(|_| LedgerError::poisoned("consent"))?;
        Ok(events.get(&subject).cloned().unwrap_or_default())
    }
}

fn is_active(history: &[ConsentEvent], grantee: &CallerIdentity) -> bool {
    history
        .iter()
        .rev()
        .find(|e| &e.grantee == grantee)
        .is_some_and(|e| e.action == ConsentAction::Grant)
}

impl ReadGate for ConsentRegistry {
    fn authorize_read(
        &self,
        caller: &CallerIdentity,
        subject: &SubjectId,
    ) -> Result<(), LedgerError> {
        if self.is_granted(subject.as_str(), caller)? {
            Ok(())
        } else {
            warn!(caller = %caller.short_id(), subject = %subject, "read denied");
            Err(LedgerError::Unauthorized(format!(
                "{caller} has no active consent for {subject}"
            )))
        }
    }
}
