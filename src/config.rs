use std::{fmt, path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_INTAKE_DIR: &str = "intake";
const DEFAULT_BROKER: &str = "localhost:9092";
const DEFAULT_TOPIC: &str = "intake";
const DEFAULT_CLIENT_ID: &str = "customer-support-intake";
const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 5000;

/// Raw view of the environment. Every key is optional so that an empty
/// environment still yields a runnable service.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    port: Option<u16>,
    intake_dir: Option<String>,
    kafka_broker: Option<String>,
    kafka_security_protocol: Option<String>,
    kafka_sasl_mechanism: Option<String>,
    kafka_sasl_username: Option<String>,
    kafka_sasl_password: Option<String>,
    kafka_intake_topic: Option<String>,
    kafka_client_id: Option<String>,
    kafka_publish_timeout_ms: Option<u64>,
    kafka_connection_mode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub intake_dir: PathBuf,
    pub kafka: KafkaSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    None,
    TransportEncrypted,
}

/// How the publisher manages its broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Connect immediately before each send and disconnect right after.
    PerRequest,
    /// One producer created at startup and reused by every request.
    Shared,
}

#[derive(Clone)]
pub struct SaslCredentials {
    pub mechanism: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SaslCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaslCredentials")
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    /// Comma-separated host:port list.
    pub brokers: String,
    pub topic: String,
    pub client_id: String,
    /// Protocol name as configured, kept for display only.
    pub security_protocol: Option<String>,
    pub security: SecurityMode,
    pub sasl: Option<SaslCredentials>,
    pub publish_timeout: Duration,
    pub connection_mode: ConnectionMode,
}

/// Broker configuration that is safe to show to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerSummary {
    pub broker: String,
    pub topic: String,
    pub security_protocol: Option<String>,
    pub sasl_mechanism: Option<String>,
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(Environment::default())
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let raw: RawSettings = config.try_deserialize()?;

        let security = match raw.kafka_security_protocol.as_deref() {
            Some(p) if p.eq_ignore_ascii_case("SSL") || p.eq_ignore_ascii_case("SASL_SSL") => {
                SecurityMode::TransportEncrypted
            }
            _ => SecurityMode::None,
        };

        // Partial SASL configuration falls back to no authentication.
        let sasl = match (
            non_empty(raw.kafka_sasl_mechanism),
            non_empty(raw.kafka_sasl_username),
            non_empty(raw.kafka_sasl_password),
        ) {
            (Some(mechanism), Some(username), Some(password)) => Some(SaslCredentials {
                mechanism,
                username,
                password,
            }),
            _ => None,
        };

        let connection_mode = match raw.kafka_connection_mode.as_deref() {
            None | Some("") | Some("per-request") | Some("per_request") => {
                ConnectionMode::PerRequest
            }
            Some("shared") => ConnectionMode::Shared,
            Some(other) => {
                return Err(ConfigError::Message(format!(
                    "unknown KAFKA_CONNECTION_MODE '{}', expected 'per-request' or 'shared'",
                    other
                )))
            }
        };

        Ok(Settings {
            port: raw.port.unwrap_or(DEFAULT_PORT),
            intake_dir: PathBuf::from(
                non_empty(raw.intake_dir).unwrap_or_else(|| DEFAULT_INTAKE_DIR.to_string()),
            ),
            kafka: KafkaSettings {
                brokers: non_empty(raw.kafka_broker).unwrap_or_else(|| DEFAULT_BROKER.to_string()),
                topic: non_empty(raw.kafka_intake_topic)
                    .unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
                client_id: non_empty(raw.kafka_client_id)
                    .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
                security_protocol: non_empty(raw.kafka_security_protocol),
                security,
                sasl,
                publish_timeout: Duration::from_millis(
                    raw.kafka_publish_timeout_ms
                        .unwrap_or(DEFAULT_PUBLISH_TIMEOUT_MS),
                ),
                connection_mode,
            },
        })
    }
}

impl KafkaSettings {
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", &self.client_id)
            .set("queue.buffering.max.ms", "0")
            .set(
                "message.timeout.ms",
                self.publish_timeout.as_millis().to_string(),
            );

        let tls = self.security == SecurityMode::TransportEncrypted;
        let protocol = match (&self.sasl, tls) {
            (Some(_), true) => "sasl_ssl",
            (Some(_), false) => "sasl_plaintext",
            (None, true) => "ssl",
            (None, false) => "plaintext",
        };
        client_config.set("security.protocol", protocol);

        if let Some(sasl) = &self.sasl {
            client_config
                .set("sasl.mechanism", sasl.mechanism.to_uppercase())
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        client_config
    }

    pub fn summary(&self) -> BrokerSummary {
        BrokerSummary {
            broker: self.brokers.clone(),
            topic: self.topic.clone(),
            security_protocol: self.security_protocol.clone(),
            sasl_mechanism: self.sasl.as_ref().map(|s| s.mechanism.clone()),
        }
    }

    pub fn log_startup(&self) {
        info!(
            broker = %self.brokers,
            topic = %self.topic,
            security_protocol = self.security_protocol.as_deref().unwrap_or("none"),
            connection_mode = ?self.connection_mode,
            "Kafka configuration"
        );
        if let Some(sasl) = &self.sasl {
            info!(
                sasl_mechanism = %sasl.mechanism,
                sasl_username = %sasl.username,
                "SASL authentication enabled"
            );
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
