//! Collaborator traits. Concrete clients live in mt-adapters and
//! mt-storage; everything here is injected as an `Arc<dyn _>` so tests can
//! substitute fakes.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::{GenerationError, StoreError, TransportError};
use crate::ids::EmailId;
use crate::record::{Attachment, DeliveryRecord};
use crate::recipient::Recipient;

/// A fully rendered message, ready for the transport collaborator.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: Recipient,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<Attachment>,
}

/// External text-generation service: prompt in, prose out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// External mail transport: accepts a rendered message or reports rejection.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError>;
}

/// Outcome of a mark-opened attempt, distinguishing the first capture from
/// idempotent repeats and from ids no record was ever written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOpened {
    FirstOpen,
    AlreadyOpened,
    NoRecord,
}

/// Delivery-record persistence, keyed by tracking identifier. The single
/// shared mutable surface between the dispatch loop and open correlation.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Upsert by id. Ids are unique per dispatch, so in practice this only
    /// ever creates.
    async fn put(&self, record: DeliveryRecord) -> Result<(), StoreError>;

    /// Set `opened_at` if it is still unset. Must be atomic with respect to
    /// concurrent callers for the same id: two simultaneous open signals
    /// cannot both observe `FirstOpen`. Never creates a record.
    async fn mark_opened(
        &self,
        id: EmailId,
        at: OffsetDateTime,
    ) -> Result<MarkOpened, StoreError>;

    async fn get(&self, id: EmailId) -> Result<Option<DeliveryRecord>, StoreError>;
}
