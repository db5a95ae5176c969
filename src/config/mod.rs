use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::forwarder::DEFAULT_SCHEMA;
pub use crate::nats::NatsConfig;

/// Complete publisher configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublisherConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub topics: TopicConfig,
    #[serde(default)]
    pub forwarder: FormatterConfig,
}

/// Topic names, fixed for the lifetime of a publisher
#[derive(Debug, Clone, Deserialize)]
pub struct TopicConfig {
    #[serde(default = "default_config_topic")]
    pub config_topic: String,
    #[serde(default = "default_data_topic")]
    pub data_topic: String,
}

fn default_config_topic() -> String {
    std::env::var("FORWARDER_CONFIG_TOPIC").unwrap_or_else(|_| "forwarder.config".to_string())
}

fn default_data_topic() -> String {
    std::env::var("FORWARDER_DATA_TOPIC").unwrap_or_else(|_| "forwarder.data".to_string())
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            config_topic: default_config_topic(),
            data_topic: default_data_topic(),
        }
    }
}

/// Payload settings for add commands
#[derive(Debug, Clone, Deserialize)]
pub struct FormatterConfig {
    /// Converter schema attached to every added stream
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<PublisherConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config: PublisherConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PublisherConfig::default();
        assert_eq!(config.forwarder.schema, "f142");
        assert_eq!(config.nats.connection_timeout_secs, 5);
        assert!(!config.topics.config_topic.is_empty());
        assert!(!config.topics.data_topic.is_empty());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [nats]
            url = "nats://broker.example.com:4222"
            connection_timeout_secs = 10

            [topics]
            config_topic = "TEST_forwarderConfig"
            data_topic = "TEST_forwarderData"

            [forwarder]
            schema = "tdct"
        "#;

        let config: PublisherConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.nats.url, "nats://broker.example.com:4222");
        assert_eq!(config.nats.connection_timeout_secs, 10);
        assert_eq!(config.nats.client_name, "forwarder-config"); // Default
        assert_eq!(config.topics.config_topic, "TEST_forwarderConfig");
        assert_eq!(config.topics.data_topic, "TEST_forwarderData");
        assert_eq!(config.forwarder.schema, "tdct");
    }

    #[test]
    fn test_partial_config() {
        // Missing sections use defaults
        let toml = r#"
            [topics]
            config_topic = "cfg"
        "#;

        let config: PublisherConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.topics.config_topic, "cfg");
        assert!(!config.topics.data_topic.is_empty());
        assert_eq!(config.forwarder.schema, "f142");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[topics]\nconfig_topic = \"from-file\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.topics.config_topic, "from-file");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/forwarder.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
