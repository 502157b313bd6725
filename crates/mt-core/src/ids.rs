use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;

/// Opaque per-message tracking identifier. Generated once at dispatch and
/// embedded in the message body; the sole correlation key between a sent
/// message and a later open signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, ToSchema)]
pub struct EmailId(pub Uuid);

impl EmailId {
    /// Parse an untrusted candidate identifier, accepting only values that
    /// match the generation format (random v4 UUIDs).
    ///
    /// The literal `{email_id}` placeholder is rejected up front; broken
    /// mail clients have been seen fetching the pixel with the template
    /// string unsubstituted.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() || raw == "{email_id}" {
            return Err(ValidationError::BadIdentifier(raw.to_string()));
        }
        let uuid = Uuid::from_str(raw)
            .map_err(|_| ValidationError::BadIdentifier(raw.to_string()))?;
        if uuid.get_version_num() != 4 {
            return Err(ValidationError::BadIdentifier(raw.to_string()));
        }
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Source of fresh tracking identifiers. v4 UUIDs carry 122 random bits from
/// the OS entropy pool; generation never touches the network or storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailIdGenerator;

impl EmailIdGenerator {
    pub fn next(&self) -> EmailId {
        EmailId(Uuid::new_v4())
    }
}
