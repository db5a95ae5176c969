use bytes::Bytes;
use serde::{Deserialize, Serialize};


/// Default converter schema for forwarded values
pub const DEFAULT_SCHEMA: &str = "f142";

/// Command accepted on the forwarder's configuration topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ForwarderCommand {
    /// Start forwarding the listed channels
    Add { streams: Vec<StreamConfig> },
    /// Shut the forwarder down
    Exit,
}

/// One channel to forward and where its values go.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub channel: String,
    pub converter: ConverterConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    pub schema: String,
    pub topic: String,
}

/// A removal command: keyed by the identifier, empty body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovalRecord {
    pub identifier: String,
    pub payload: Bytes,
}

/// Builds configuration payloads for a fixed data topic.
#[derive(Clone, Debug)]
pub struct ConfigFormatter {
    data_topic: String,
    schema: String,
}

impl ConfigFormatter {
    pub fn new(data_topic: impl Into<String>) -> Self {
        Self::with_schema(data_topic, DEFAULT_SCHEMA)
    }

    pub fn with_schema(data_topic: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            data_topic: data_topic.into(),
            schema: schema.into(),
        }
    }

    pub fn data_topic(&self) -> &str {
        &self.data_topic
    }

    /// Build the add command for `identifiers`, in order.
    pub fn add_command<S: AsRef<str>>(&self, identifiers: &[S]) -> ForwarderCommand {
        let streams = identifiers
            .iter()
            .map(|id| StreamConfig {
                channel: id.as_ref().to_string(),
                converter: ConverterConfig {
                    schema: self.schema.clone(),
                    topic: self.data_topic.clone(),
                },
            })
            .collect();
        ForwarderCommand::Add { streams }
    }

    /// Serialize the add command for `identifiers` into one message.
    pub fn format_add<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<Bytes, serde_json::Error> {
        encode(&self.add_command(identifiers))
    }

    /// One removal record per identifier.
    pub fn format_remove<S: AsRef<str>>(&self, identifiers: &[S]) -> Vec<RemovalRecord> {
        identifiers
            .iter()
            .map(|id| RemovalRecord {
                identifier: id.as_ref().to_string(),
                payload: Bytes::new(),
            })
            .collect()
    }

    pub fn format_exit(&self) -> Result<Bytes, serde_json::Error> {
        encode(&ForwarderCommand::Exit)
    }
}

fn encode(command: &ForwarderCommand) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(command).map(Bytes::from)
}
