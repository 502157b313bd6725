//! mt-core
//!
//! Campaign dispatch and open-tracking correlation engine.
//!
//! - **ids / recipient / record**: domain model (tracking identifiers,
//!   normalized addresses, delivery records)
//! - **ports**: collaborator traits (TextGenerator, MailTransport,
//!   DeliveryStore)
//! - **render**: HTML envelope + tracking pixel embedding
//! - **dispatch**: sequential per-recipient campaign loop
//! - **correlate**: inbound open-signal state machine
//! - **store_memory**: DashMap-backed DeliveryStore for dev and tests

pub mod correlate;
pub mod dispatch;
pub mod error;
pub mod ids;
pub mod ports;
pub mod recipient;
pub mod record;
pub mod render;
pub mod store_memory;

pub use correlate::{OpenCorrelator, OpenOutcome};
pub use dispatch::{BatchResult, DispatchCoordinator};
pub use ids::{EmailId, EmailIdGenerator};
pub use recipient::Recipient;
pub use record::{CampaignBatch, DeliveryRecord, DeliveryStatus};
