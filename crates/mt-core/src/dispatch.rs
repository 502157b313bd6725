use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::ids::EmailIdGenerator;
use crate::ports::{DeliveryStore, MailTransport, OutboundEmail};
use crate::recipient::Recipient;
use crate::record::{CampaignBatch, DeliveryRecord, DeliveryStatus};
use crate::render::ContentRenderer;

/// One recipient that was not sent to, with the reason.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, ToSchema)]
pub struct RecipientFailure {
    pub recipient: String,
    pub reason: String,
}

/// A non-fatal problem attached to a recipient whose outcome stands, such as
/// a delivery-record write that failed after the message already left.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, ToSchema)]
pub struct RecipientWarning {
    pub recipient: String,
    pub warning: String,
}

/// Aggregate outcome of one campaign run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq, ToSchema)]
pub struct BatchResult {
    pub sent: u32,
    pub failed: u32,
    pub failures: Vec<RecipientFailure>,
    pub warnings: Vec<RecipientWarning>,
}

impl BatchResult {
    pub fn total(&self) -> u32 {
        self.sent + self.failed
    }

    /// The human-readable summary shown to the submitter.
    pub fn summary(&self) -> String {
        format!("Successfully sent {}/{} emails!", self.sent, self.total())
    }

    fn fail(&mut self, recipient: &str, reason: String) {
        self.failed += 1;
        self.failures.push(RecipientFailure {
            recipient: recipient.to_string(),
            reason,
        });
    }

    fn warn(&mut self, recipient: &str, warning: String) {
        self.warnings.push(RecipientWarning {
            recipient: recipient.to_string(),
            warning,
        });
    }
}

/// Orchestrates one campaign: per recipient, generate an identifier, render
/// a tracked body, invoke the transport, and persist the outcome.
///
/// Recipients are processed strictly sequentially in input order, bounding
/// transport load and keeping the counters race-free. One failing recipient
/// never aborts the rest of the batch.
pub struct DispatchCoordinator {
    ids: EmailIdGenerator,
    renderer: ContentRenderer,
    transport: Arc<dyn MailTransport>,
    store: Arc<dyn DeliveryStore>,
}

impl DispatchCoordinator {
    pub fn new(
        renderer: ContentRenderer,
        transport: Arc<dyn MailTransport>,
        store: Arc<dyn DeliveryStore>,
    ) -> Self {
        Self {
            ids: EmailIdGenerator,
            renderer,
            transport,
            store,
        }
    }

    /// Run one campaign to completion. An empty recipient list returns the
    /// zero result without contacting any collaborator.
    pub async fn run(&self, batch: &CampaignBatch) -> BatchResult {
        let mut result = BatchResult::default();
        for raw in &batch.recipients {
            self.dispatch_one(raw, batch, &mut result).await;
        }
        info!(
            sent = result.sent,
            failed = result.failed,
            warnings = result.warnings.len(),
            "campaign dispatch finished"
        );
        result
    }

    async fn dispatch_one(&self, raw: &str, batch: &CampaignBatch, result: &mut BatchResult) {
        // Shape-check before anything else so a bad address never costs a
        // generation call.
        let recipient = match Recipient::parse(raw) {
            Ok(recipient) => recipient,
            Err(e) => {
                warn!(recipient = raw, error = %e, "skipping invalid recipient");
                result.fail(raw, e.to_string());
                return;
            }
        };

        let id = self.ids.next();

        let body = match self.renderer.render(&batch.prompt, id).await {
            Ok(body) => body,
            Err(e) => {
                warn!(recipient = %recipient, id = %id, error = %e, "content generation failed");
                result.fail(recipient.as_str(), format!("content generation failed: {e}"));
                return;
            }
        };

        let email = OutboundEmail {
            to: recipient.clone(),
            subject: batch.subject.clone(),
            html_body: body,
            attachment: batch.attachment.clone(),
        };

        let status = match self.transport.send(&email).await {
            Ok(()) => {
                result.sent += 1;
                DeliveryStatus::Sent
            }
            Err(e) => {
                warn!(recipient = %recipient, id = %id, error = %e, "transport rejected message");
                result.fail(recipient.as_str(), e.to_string());
                DeliveryStatus::Failed(e.to_string())
            }
        };

        let record = DeliveryRecord {
            id,
            recipient: recipient.clone(),
            subject: batch.subject.clone(),
            body_digest: DeliveryRecord::body_digest_of(&email.html_body),
            status,
            sent_at: OffsetDateTime::now_utc(),
            opened_at: None,
        };

        // The message already left (or was rejected) regardless of whether
        // this write lands; a store failure must not flip the outcome.
        if let Err(e) = self.store.put(record).await {
            warn!(recipient = %recipient, id = %id, error = %e, "delivery record write failed");
            result.warn(recipient.as_str(), format!("delivery record not stored: {e}"));
        }
    }
}
