use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::ValidationError;

/// A normalized (trimmed, lower-cased) email address that passed shape
/// validation. Not unique: the same recipient may appear in many delivery
/// records across and within campaigns.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String)]
pub struct Recipient(String);

impl Recipient {
    /// Normalize and validate a raw address. Normalization is idempotent:
    /// parsing an already-normalized address returns it unchanged.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_lowercase();
        let bad = || ValidationError::BadAddress(raw.to_string());

        if normalized.chars().any(char::is_whitespace) {
            return Err(bad());
        }
        let mut parts = normalized.splitn(2, '@');
        let (local, domain) = match (parts.next(), parts.next()) {
            (Some(local), Some(domain)) => (local, domain),
            _ => return Err(bad()),
        };
        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
        {
            return Err(bad());
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Recipient {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Recipient {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<Recipient> for String {
    fn from(recipient: Recipient) -> Self {
        recipient.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let r = Recipient::parse("  Alice@Example.COM ").unwrap();
        assert_eq!(r.as_str(), "alice@example.com");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = Recipient::parse("  Bob@Example.org").unwrap();
        let twice = Recipient::parse(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in [
            "",
            "   ",
            "no-at-sign",
            "@example.com",
            "user@",
            "user@nodot",
            "user@@example.com",
            "user@.example.com",
            "user@example.com.",
            "us er@example.com",
        ] {
            assert!(Recipient::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn accepts_ordinary_addresses() {
        for raw in ["a@b.co", "first.last@sub.example.com", "x+tag@example.io"] {
            assert!(Recipient::parse(raw).is_ok(), "rejected {raw:?}");
        }
    }
}
