use std::fmt;

/// Classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerErrorKind {
    /// No broker answered at the server address
    BrokerNotAvailable,
    /// Connecting or a request took longer than allowed
    TimedOut,
    /// Bad address, TLS or credential setup
    InvalidConfiguration,
    /// The probed topic is not known to the broker
    UnknownTopic,
    /// Any other failure on an established connection
    Transport,
}

impl BrokerErrorKind {
    /// Fatal kinds abort publisher construction; the rest only warn.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            BrokerErrorKind::BrokerNotAvailable
                | BrokerErrorKind::TimedOut
                | BrokerErrorKind::InvalidConfiguration
        )
    }

    /// Operator-facing explanation for `server`.
    pub fn describe(self, server: &str) -> String {
        match self {
            BrokerErrorKind::BrokerNotAvailable => format!("No brokers found on server: {}", server),
            BrokerErrorKind::TimedOut => "No server found, connection error".to_string(),
            BrokerErrorKind::InvalidConfiguration => "Invalid configuration".to_string(),
            BrokerErrorKind::UnknownTopic => {
                "Invalid topic, enable topic auto-creation on the broker or create it first".to_string()
            }
            BrokerErrorKind::Transport => format!("Transport error talking to {}", server),
        }
    }
}

impl fmt::Display for BrokerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrokerErrorKind::BrokerNotAvailable => "broker not available",
            BrokerErrorKind::TimedOut => "timed out",
            BrokerErrorKind::InvalidConfiguration => "invalid configuration",
            BrokerErrorKind::UnknownTopic => "unknown topic",
            BrokerErrorKind::Transport => "transport error",
        };
        f.write_str(name)
    }
}

/// Transport error carrying its classified kind.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerError {
    kind: BrokerErrorKind,
    message: String,
}

impl BrokerError {
    pub fn new(kind: BrokerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> BrokerErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BrokerError {}
