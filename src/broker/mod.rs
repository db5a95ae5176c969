use async_trait::async_trait;
use bytes::Bytes;

mod error;
pub mod memory;

pub use error::{BrokerError, BrokerErrorKind};
pub use memory::{MemoryBroker, ProducedMessage};

/// Keys may travel as a header line, so they must not contain line breaks.
pub fn is_valid_key(key: &str) -> bool {
    !key.contains(['\r', '\n'])
}

/// Transport seam used by the config publisher.
///
/// Implementations hold a producer side and a consumer side connected to
/// the same server. Produce is best-effort: returning `Ok` means the message
/// was handed to the client, not that the broker acknowledged it.
#[async_trait]
pub trait MessageQueueClient: Send + Sync {
    /// Hands one message to the producer. `key` is optional.
    async fn produce(&self, topic: &str, key: Option<&str>, value: Bytes) -> Result<(), BrokerError>;

    /// Probes `topic` through the consumer side.
    ///
    /// Used as an existence check: an error of kind
    /// [`BrokerErrorKind::UnknownTopic`] means the broker knows no such topic.
    async fn subscribe(&self, topic: &str) -> Result<(), BrokerError>;

    /// Waits until everything handed to `produce` has been written out.
    async fn flush(&self) -> Result<(), BrokerError>;

    /// Identity the consumer side presents to the broker.
    fn client_identity(&self) -> &str;
}
