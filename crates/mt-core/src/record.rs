use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::ids::EmailId;
use crate::recipient::Recipient;

/// Outcome of the transport call for one dispatch attempt. Written exactly
/// once, at record creation; dispatch is never retried or re-logged.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, ToSchema)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed(String),
}

/// The persisted outcome of one dispatch attempt to one recipient, keyed by
/// its tracking identifier.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, ToSchema)]
pub struct DeliveryRecord {
    pub id: EmailId,
    pub recipient: Recipient,
    pub subject: String,
    /// Lowercase-hex SHA-256 of the rendered body handed to the transport,
    /// so the status stays attributable to the exact content sent.
    pub body_digest: String,
    pub status: DeliveryStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    /// Set at most once, by the first correlated open signal.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub opened_at: Option<OffsetDateTime>,
}

impl DeliveryRecord {
    pub fn body_digest_of(body: &str) -> String {
        let digest = Sha256::digest(body.as_bytes());
        digest.iter().fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
    }
}

/// A file attached to every message of one campaign.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// One campaign submission: the recipients plus the shared subject, prompt,
/// and optional attachment. Ephemeral; only the per-recipient
/// DeliveryRecords survive the run.
#[derive(Debug, Clone)]
pub struct CampaignBatch {
    pub recipients: Vec<String>,
    pub subject: String,
    pub prompt: String,
    pub attachment: Option<Attachment>,
}
