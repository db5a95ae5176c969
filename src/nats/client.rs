use crate::broker::{is_valid_key, BrokerError, BrokerErrorKind, MessageQueueClient};
use async_nats::jetstream::{self, context::GetStreamByNameErrorKind};
use async_nats::{ConnectErrorKind, ConnectOptions, HeaderMap};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Header carrying the message key; NATS messages have no native key.
pub const KEY_HEADER: &str = "Forwarder-Key";

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    /// Prefix for connection names; the consumer name gets a random suffix
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

fn default_connection_timeout_secs() -> u64 {
    5
}

fn default_client_name() -> String {
    "forwarder-config".to_string()
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connection_timeout_secs: default_connection_timeout_secs(),
            client_name: default_client_name(),
        }
    }
}

/// Producer and consumer connections to one NATS server.
pub struct NatsBroker {
    producer: async_nats::Client,
    /// Built on the consumer connection, which it keeps open
    jetstream: jetstream::Context,
    consumer_name: String,
}

impl NatsBroker {
    /// Open both connections.
    ///
    /// The consumer connection is named `<client_name>-<uuid>` so each process
    /// gets its own identity. If the consumer fails to connect, the producer
    /// connection is dropped before returning.
    pub async fn connect(config: &NatsConfig) -> Result<Self, BrokerError> {
        if config.url.trim().is_empty() {
            return Err(BrokerError::new(
                BrokerErrorKind::InvalidConfiguration,
                "server address is empty",
            ));
        }

        info!("Connecting to NATS at {}", config.url);

        let timeout = Duration::from_secs(config.connection_timeout_secs);
        let producer_name = format!("{}-producer", config.client_name);
        let consumer_name = format!("{}-{}", config.client_name, Uuid::new_v4());

        let producer = open(&config.url, &producer_name, timeout).await?;
        let consumer = open(&config.url, &consumer_name, timeout).await?;
        let jetstream = jetstream::new(consumer);

        info!(consumer = %consumer_name, "Connected to NATS");

        Ok(Self {
            producer,
            jetstream,
            consumer_name,
        })
    }
}

async fn open(url: &str, name: &str, timeout: Duration) -> Result<async_nats::Client, BrokerError> {
    ConnectOptions::new()
        .name(name)
        .connection_timeout(timeout)
        .connect(url)
        .await
        .map_err(|e| BrokerError::new(classify_connect_error(e.kind()), e.to_string()))
}

/// Map the client's connect error kinds onto broker error kinds.
pub fn classify_connect_error(kind: ConnectErrorKind) -> BrokerErrorKind {
    #[allow(unreachable_patterns)]
    match kind {
        ConnectErrorKind::TimedOut => BrokerErrorKind::TimedOut,
        ConnectErrorKind::Io | ConnectErrorKind::Dns | ConnectErrorKind::MaxReconnects => {
            BrokerErrorKind::BrokerNotAvailable
        }
        ConnectErrorKind::ServerParse
        | ConnectErrorKind::Tls
        | ConnectErrorKind::Authentication
        | ConnectErrorKind::AuthorizationViolation => BrokerErrorKind::InvalidConfiguration,
        _ => BrokerErrorKind::Transport,
    }
}

#[async_trait]
impl MessageQueueClient for NatsBroker {
    async fn produce(&self, topic: &str, key: Option<&str>, value: Bytes) -> Result<(), BrokerError> {
        debug!(topic = %topic, key = ?key, bytes = value.len(), "Producing message");

        let result = match key {
            Some(key) if !is_valid_key(key) => {
                return Err(BrokerError::new(
                    BrokerErrorKind::InvalidConfiguration,
                    format!("key {:?} contains a line break", key),
                ));
            }
            Some(key) => {
                let mut headers = HeaderMap::new();
                headers.insert(KEY_HEADER, key);
                self.producer
                    .publish_with_headers(topic.to_string(), headers, value)
                    .await
            }
            None => self.producer.publish(topic.to_string(), value).await,
        };

        result.map_err(|e| {
            BrokerError::new(
                BrokerErrorKind::Transport,
                format!("Failed to publish to subject '{}': {}", topic, e),
            )
        })
    }

    async fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        match self.jetstream.stream_by_subject(topic).await {
            Ok(stream) => {
                debug!(topic = %topic, stream = %stream, "Topic is backed by stream");
                Ok(())
            }
            Err(e) => {
                let kind = match e.kind() {
                    GetStreamByNameErrorKind::NotFound => BrokerErrorKind::UnknownTopic,
                    GetStreamByNameErrorKind::InvalidSubject => BrokerErrorKind::InvalidConfiguration,
                    _ => BrokerErrorKind::Transport,
                };
                Err(BrokerError::new(kind, e.to_string()))
            }
        }
    }

    async fn flush(&self) -> Result<(), BrokerError> {
        self.producer
            .flush()
            .await
            .map_err(|e| BrokerError::new(BrokerErrorKind::Transport, e.to_string()))
    }

    fn client_identity(&self) -> &str {
        &self.consumer_name
    }
}
