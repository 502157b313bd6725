//! HTTP clients for the external collaborators: the chat-completion text
//! service and the outbound mail relay. Mock implementations live beside
//! each trait's client for testing and scaffolding.

pub mod text_gen;
pub mod transport;
