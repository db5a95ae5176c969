// NATS binding of the broker seam

mod client;

pub use client::{classify_connect_error, NatsBroker, NatsConfig, KEY_HEADER};
