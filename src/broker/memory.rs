use super::{BrokerError, BrokerErrorKind, MessageQueueClient};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A message recorded by [`MemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedMessage {
    pub topic: String,
    pub key: Option<String>,
    pub value: Bytes,
}

#[derive(Debug, Default)]
struct MemoryState {
    topics: HashSet<String>,
    produced: Vec<ProducedMessage>,
    flushed: usize,
    subscribe_failure: Option<BrokerErrorKind>,
    produce_failure: Option<BrokerErrorKind>,
}

/// In-process broker for tests and runs without a server.
///
/// Topics must be registered with [`MemoryBroker::with_topic`] to pass the
/// existence probe. Failures can be injected per operation. Clones share
/// state, so a clone kept aside still sees what a publisher produced after
/// the publisher itself is gone.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    identity: String,
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            identity: format!("memory-{}", Uuid::new_v4()),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    pub fn with_topic(self, topic: &str) -> Self {
        self.lock().topics.insert(topic.to_string());
        self
    }

    /// Makes every following `subscribe` fail with `kind`.
    pub fn fail_subscribe(self, kind: BrokerErrorKind) -> Self {
        self.lock().subscribe_failure = Some(kind);
        self
    }

    /// Makes every following `produce` fail with `kind`.
    pub fn fail_produce(self, kind: BrokerErrorKind) -> Self {
        self.lock().produce_failure = Some(kind);
        self
    }

    pub fn produced(&self) -> Vec<ProducedMessage> {
        self.lock().produced.clone()
    }

    /// Number of produced messages covered by a flush.
    pub fn flushed(&self) -> usize {
        self.lock().flushed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-call; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MessageQueueClient for MemoryBroker {
    async fn produce(&self, topic: &str, key: Option<&str>, value: Bytes) -> Result<(), BrokerError> {
        let mut state = self.lock();
        if let Some(kind) = state.produce_failure {
            return Err(BrokerError::new(kind, format!("injected produce failure on '{}'", topic)));
        }
        state.produced.push(ProducedMessage {
            topic: topic.to_string(),
            key: key.map(str::to_string),
            value,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        let state = self.lock();
        if let Some(kind) = state.subscribe_failure {
            return Err(BrokerError::new(kind, format!("injected subscribe failure on '{}'", topic)));
        }
        if !state.topics.contains(topic) {
            return Err(BrokerError::new(
                BrokerErrorKind::UnknownTopic,
                format!("no topic '{}'", topic),
            ));
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), BrokerError> {
        let mut state = self.lock();
        state.flushed = state.produced.len();
        Ok(())
    }

    fn client_identity(&self) -> &str {
        &self.identity
    }
}
