use medrec_types::CallerIdentity;

use crate::error::ClientError;

/// Source of the identity attached to submissions.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Result<CallerIdentity, ClientError>;
}

/// A single, explicitly configured identity.
#[derive(Clone, Debug)]
pub struct StaticIdentity {
    identity: CallerIdentity,
}

impl StaticIdentity {
    pub fn new(identity: CallerIdentity) -> Self {
        Self { identity }
    }

    /// Build from a raw account string, rejecting blanks.
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        CallerIdentity::parse(raw)
            .map(Self::new)
            .map_err(|e| ClientError::Identity(e.to_string()))
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Result<CallerIdentity, ClientError> {
        Ok(self.identity.clone())
    }
}
