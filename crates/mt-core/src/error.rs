use thiserror::Error;

/// Local input validation failures. No collaborator is contacted before
/// these are raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid recipient address: {0:?}")]
    BadAddress(String),
    #[error("malformed tracking identifier: {0:?}")]
    BadIdentifier(String),
}

/// The external text-generation service failed or timed out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("text service error: {0}")]
    Service(String),
    #[error("text service timeout")]
    Timeout,
}

/// The external mail transport rejected the message or timed out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport rejected message: {0}")]
    Rejected(String),
    #[error("transport timeout")]
    Timeout,
}

/// The delivery-record store was unreachable or refused a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected operation: {0}")]
    Rejected(String),
}
