use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use medrec_types::{CallerIdentity, RecordPointer, RequestId, SubjectId};

use crate::error::ChannelError;

/// A state-changing request handed to the external ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendRequest {
    pub request_id: RequestId,
    pub subject: SubjectId,
    pub pointer: RecordPointer,
    pub caller: CallerIdentity,
    /// Sequence the local ledger will assign if the request is acknowledged.
    pub sequence: u64,
}

/// Acknowledgment returned by the external ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub request_id: RequestId,
    pub sequence: u64,
    /// External reference for the submission (e.g. a transaction hash).
    pub reference: Option<String>,
}

impl Acknowledgment {
    /// Acknowledge a request exactly as submitted.
    pub fn for_request(request: &AppendRequest, reference: Option<String>) -> Self {
        Self {
            request_id: request.request_id,
            sequence: request.sequence,
            reference,
        }
    }
}

/// Transport to the external distributed ledger.
///
/// Delivery is at-least-once: a request that times out locally may still be
/// applied remotely.
#[async_trait]
pub trait SubmissionChannel: Send + Sync {
    async fn submit(&self, request: &AppendRequest) -> Result<Acknowledgment, ChannelError>;
}

/// In-process channel that acknowledges every request immediately.
pub struct LocalChannel;

#[async_trait]
impl SubmissionChannel for LocalChannel {
    async fn submit(&self, request: &AppendRequest) -> Result<Acknowledgment, ChannelError> {
        debug!(
            request = %request.request_id.short_id(),
            subject = %request.subject,
            seq = request.sequence,
            "local submission acknowledged"
        );
        Ok(Acknowledgment::for_request(
            request,
            Some(format!("local:{}", request.request_id.short_id())),
        ))
    }
}
