use crate::broker::{is_valid_key, BrokerError, BrokerErrorKind, MessageQueueClient};
use crate::config::PublisherConfig;
use crate::forwarder::ConfigFormatter;
use crate::nats::{NatsBroker, NatsConfig};
use std::fmt;
use tracing::{debug, error, info, warn};

#[cfg(test)]
mod tests;

/// Errors from announcing configuration changes
#[derive(Debug)]
pub enum PublishError {
    NoIdentifiers,
    /// Identifier cannot travel as a message key
    InvalidIdentifier(String),
    Format(serde_json::Error),
    Broker(BrokerError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::NoIdentifiers => write!(f, "at least one identifier is required"),
            PublishError::InvalidIdentifier(id) => {
                write!(f, "identifier {:?} contains a line break and cannot be used as a key", id)
            }
            PublishError::Format(e) => write!(f, "failed to format configuration: {}", e),
            PublishError::Broker(e) => write!(f, "failed to publish configuration: {}", e),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::NoIdentifiers | PublishError::InvalidIdentifier(_) => None,
            PublishError::Format(e) => Some(e),
            PublishError::Broker(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(e: serde_json::Error) -> Self {
        PublishError::Format(e)
    }
}

impl From<BrokerError> for PublishError {
    fn from(e: BrokerError) -> Self {
        PublishError::Broker(e)
    }
}

/// Publishes forwarder add/remove commands to a configuration topic.
///
/// Owns its broker client for its whole lifetime. Publishing is
/// fire-and-forget: a successful call means the message was handed to the
/// client, and nothing is retried. Call [`ConfigPublisher::close`] to flush
/// pending messages before the connections are released.
pub struct ConfigPublisher<C: MessageQueueClient = NatsBroker> {
    client: C,
    config_topic: String,
    formatter: ConfigFormatter,
}

impl ConfigPublisher<NatsBroker> {
    /// Connect to `server` and probe `config_topic`.
    pub async fn connect(server: &str, config_topic: &str, data_topic: &str) -> Result<Self, BrokerError> {
        let nats = NatsConfig {
            url: server.to_string(),
            ..NatsConfig::default()
        };
        Self::connect_with(&nats, config_topic, ConfigFormatter::new(data_topic)).await
    }

    /// Connect using a loaded configuration.
    pub async fn from_config(config: &PublisherConfig) -> Result<Self, BrokerError> {
        let formatter =
            ConfigFormatter::with_schema(config.topics.data_topic.as_str(), config.forwarder.schema.as_str());
        Self::connect_with(&config.nats, &config.topics.config_topic, formatter).await
    }

    async fn connect_with(
        nats: &NatsConfig,
        config_topic: &str,
        formatter: ConfigFormatter,
    ) -> Result<Self, BrokerError> {
        // Reject bad topics before opening any connection.
        validate_topics(config_topic, formatter.data_topic())?;

        let client = NatsBroker::connect(nats).await.map_err(|e| {
            error!(kind = ?e.kind(), error = %e, "{}", e.kind().describe(&nats.url));
            e
        })?;
        Self::check_config_topic(client, config_topic, formatter).await
    }
}

impl<C: MessageQueueClient> ConfigPublisher<C> {
    /// Wrap an existing client and probe `config_topic`.
    pub async fn new(client: C, config_topic: &str, data_topic: &str) -> Result<Self, BrokerError> {
        Self::with_formatter(client, config_topic, ConfigFormatter::new(data_topic)).await
    }

    /// Wrap an existing client with a custom formatter.
    ///
    /// A missing topic only warns. A fatal probe error fails construction and
    /// drops the client.
    pub async fn with_formatter(
        client: C,
        config_topic: &str,
        formatter: ConfigFormatter,
    ) -> Result<Self, BrokerError> {
        validate_topics(config_topic, formatter.data_topic())?;
        Self::check_config_topic(client, config_topic, formatter).await
    }

    async fn check_config_topic(client: C, config_topic: &str, formatter: ConfigFormatter) -> Result<Self, BrokerError> {
        let publisher = Self {
            client,
            config_topic: config_topic.to_string(),
            formatter,
        };

        match publisher.client.subscribe(&publisher.config_topic).await {
            Ok(()) => {}
            Err(e) if e.kind().is_fatal() => {
                error!(topic = %publisher.config_topic, kind = ?e.kind(), error = %e, "Topic probe failed");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    topic = %publisher.config_topic,
                    error = %e,
                    "Topic {} does not exist. It will be created by default.",
                    publisher.config_topic
                );
            }
        }

        info!(
            config_topic = %publisher.config_topic,
            data_topic = %publisher.formatter.data_topic(),
            identity = %publisher.client.client_identity(),
            "Config publisher ready"
        );

        Ok(publisher)
    }

    pub fn config_topic(&self) -> &str {
        &self.config_topic
    }

    pub fn data_topic(&self) -> &str {
        self.formatter.data_topic()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Probe `name` through the consumer side; errors are logged, not returned.
    pub async fn topic_exists(&self, name: &str) -> bool {
        match self.client.subscribe(name).await {
            Ok(()) => true,
            Err(e) => {
                warn!(topic = %name, kind = ?e.kind(), error = %e, "topic '{}' does not exist", name);
                false
            }
        }
    }

    /// Ask the forwarder to start monitoring `identifiers`.
    ///
    /// Sends one unkeyed message carrying all identifiers.
    pub async fn announce_add<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<(), PublishError> {
        if identifiers.is_empty() {
            return Err(PublishError::NoIdentifiers);
        }

        let payload = self.formatter.format_add(identifiers)?;
        info!(topic = %self.config_topic, count = identifiers.len(), "Announcing add");
        debug!(payload = %String::from_utf8_lossy(&payload), "Sending data");

        self.client.produce(&self.config_topic, None, payload).await?;
        Ok(())
    }

    /// Ask the forwarder to stop monitoring `identifiers`.
    ///
    /// Sends one message per identifier, keyed by it, with an empty body.
    /// Every identifier is checked before the first send; after that,
    /// stops at the first failed hand-off.
    pub async fn announce_remove<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<(), PublishError> {
        if identifiers.is_empty() {
            return Err(PublishError::NoIdentifiers);
        }
        if let Some(bad) = identifiers.iter().map(|id| id.as_ref()).find(|id| !is_valid_key(id)) {
            return Err(PublishError::InvalidIdentifier(bad.to_string()));
        }

        let records = self.formatter.format_remove(identifiers);
        info!(topic = %self.config_topic, count = records.len(), "Announcing remove");

        for record in records {
            debug!(key = %record.identifier, "Sending removal");
            self.client
                .produce(&self.config_topic, Some(&record.identifier), record.payload)
                .await?;
        }
        Ok(())
    }

    /// Ask the forwarder to shut down.
    pub async fn announce_exit(&self) -> Result<(), PublishError> {
        let payload = self.formatter.format_exit()?;
        info!(topic = %self.config_topic, "Announcing exit");
        self.client.produce(&self.config_topic, None, payload).await?;
        Ok(())
    }

    /// Flush pending messages and release the connections.
    pub async fn close(self) -> Result<(), BrokerError> {
        self.client.flush().await?;
        debug!(topic = %self.config_topic, "Config publisher closed");
        Ok(())
    }
}

fn validate_topics(config_topic: &str, data_topic: &str) -> Result<(), BrokerError> {
    if config_topic.trim().is_empty() {
        return Err(BrokerError::new(
            BrokerErrorKind::InvalidConfiguration,
            "configuration topic is empty",
        ));
    }
    if data_topic.trim().is_empty() {
        return Err(BrokerError::new(
            BrokerErrorKind::InvalidConfiguration,
            "data topic is empty",
        ));
    }
    Ok(())
}
