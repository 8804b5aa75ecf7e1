//! Reliable delivery: sequence numbers, ACKs and retransmission

mod engine;

pub use engine::{DeliveryEngine, DeliveryKind, FailedDelivery};
