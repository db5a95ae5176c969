// Broker seam and in-memory broker
pub mod broker;

// Configuration loading
pub mod config;

// Forwarder command payloads
pub mod forwarder;

// NATS client integration
pub mod nats;

// Add/remove announcements
pub mod publisher;

pub use broker::{BrokerError, BrokerErrorKind, MemoryBroker, MessageQueueClient};
pub use forwarder::ConfigFormatter;
pub use publisher::{ConfigPublisher, PublishError};
