//! # Relay Configuration
//!
//! Runtime parameters loaded from the environment.
//!
//! ## Security Requirements
//!
//! - `EVM_PRIVATE_KEY` never appears in `Debug` output or logs
//! - Credentials embedded in `POSTGRES_CONNECTION_URL` are masked

use attestation_relay::QuorumThreshold;
use std::fmt;
use thiserror::Error;

/// Stream validators publish their validations to.
pub const DEFAULT_VALIDATION_TOPIC_STREAM: &str =
    "0xddc5f79ecab7f6a5c66dce62fbac574de1d4797c/lsan-events";

/// Default ledger JSON-RPC endpoint.
pub const DEFAULT_LEDGER_RPC_URL: &str = "http://127.0.0.1:8545";

/// Default destination JSON-RPC endpoint.
pub const DEFAULT_DESTINATION_RPC_URL: &str = "http://127.0.0.1:4943";

/// Default `LISTEN` channel for indexed-event notifications.
pub const DEFAULT_NOTIFICATION_CHANNEL: &str = "relay_events";

/// Longest identifier Postgres keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be used.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Complete relay configuration.
#[derive(Clone)]
pub struct RelayConfig {
    /// Connection string of the indexed-events database.
    pub database_url: String,
    /// Channel the relay `LISTEN`s on.
    pub notification_channel: String,
    /// Table to install the insert trigger on; `None` if it is managed elsewhere.
    pub notification_table: Option<String>,
    /// Hex secp256k1 key the relay publishes under.
    pub private_key: String,
    /// Stream source claims are published to.
    pub publish_stream_id: String,
    /// Stream validations are received from.
    pub validation_stream_id: String,
    /// Watched contract address.
    pub contract_address: String,
    /// Chain identifier stamped on envelopes.
    pub chain_id: String,
    /// Validations required before dispatch.
    pub threshold: QuorumThreshold,
    /// Ledger JSON-RPC endpoint.
    pub ledger_rpc_url: String,
    /// Destination JSON-RPC endpoint.
    pub destination_rpc_url: String,
}

impl RelayConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let threshold = match get("RESPONSE_THRESHOLD") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .and_then(QuorumThreshold::new)
                .ok_or_else(|| ConfigError::Invalid {
                    var: "RESPONSE_THRESHOLD",
                    reason: format!("expected an integer >= 1, got {:?}", raw),
                })?,
            None => QuorumThreshold::default(),
        };

        let notification_channel = get("NOTIFICATION_CHANNEL")
            .unwrap_or_else(|| DEFAULT_NOTIFICATION_CHANNEL.to_string());
        if !is_identifier(&notification_channel) {
            return Err(ConfigError::Invalid {
                var: "NOTIFICATION_CHANNEL",
                reason: format!("not a plain SQL identifier: {:?}", notification_channel),
            });
        }

        let notification_table = get("NOTIFICATION_TABLE");
        if let Some(table) = &notification_table {
            let parts: Vec<&str> = table.split('.').collect();
            if parts.len() > 2 || !parts.iter().all(|part| is_identifier(part)) {
                return Err(ConfigError::Invalid {
                    var: "NOTIFICATION_TABLE",
                    reason: format!("expected `table` or `schema.table`, got {:?}", table),
                });
            }
        }

        Ok(Self {
            database_url: required("POSTGRES_CONNECTION_URL")?,
            notification_channel,
            notification_table,
            private_key: required("EVM_PRIVATE_KEY")?,
            publish_stream_id: required("LOGSTORE_STREAM_ID")?,
            validation_stream_id: get("VALIDATION_TOPIC_STREAM")
                .unwrap_or_else(|| DEFAULT_VALIDATION_TOPIC_STREAM.to_string()),
            contract_address: required("CONTRACT_ADDRESS")?,
            chain_id: required("CHAIN_ID")?,
            threshold,
            ledger_rpc_url: get("LEDGER_RPC_URL")
                .unwrap_or_else(|| DEFAULT_LEDGER_RPC_URL.to_string()),
            destination_rpc_url: get("DESTINATION_RPC_URL")
                .unwrap_or_else(|| DEFAULT_DESTINATION_RPC_URL.to_string()),
        })
    }

    /// Database URL with any `user:password@` section masked.
    pub fn redacted_database_url(&self) -> String {
        redact_credentials(&self.database_url)
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("database_url", &self.redacted_database_url())
            .field("notification_channel", &self.notification_channel)
            .field("notification_table", &self.notification_table)
            .field("private_key", &"<redacted>")
            .field("publish_stream_id", &self.publish_stream_id)
            .field("validation_stream_id", &self.validation_stream_id)
            .field("contract_address", &self.contract_address)
            .field("chain_id", &self.chain_id)
            .field("threshold", &self.threshold)
            .field("ledger_rpc_url", &self.ledger_rpc_url)
            .field("destination_rpc_url", &self.destination_rpc_url)
            .finish()
    }
}

/// Unquoted identifier: ASCII letter or underscore, then letters, digits or
/// underscores.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let leading = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    leading
        && name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn redact_credentials(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{}://***@{}", scheme, host),
        None => url.to_string(),
    }
}
