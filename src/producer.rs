use std::time::{Duration, Instant};

use async_trait::async_trait;
use rdkafka::{
    error::KafkaError,
    producer::{FutureProducer, FutureRecord, Producer},
    types::RDKafkaErrorCode,
    util::Timeout,
    ClientConfig,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ConnectionMode, KafkaSettings};

/// Broker acknowledgement for one published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("broker unreachable: {0}")]
    BrokerUnreachable(String),
    #[error("publish rejected by broker: {0}")]
    PublishRejected(String),
    #[error("publish not acknowledged within {0:?}")]
    PublishTimeout(Duration),
}

pub type PublishResult = Result<Delivery, PublishError>;

/// Sends a single keyed message to a topic. Implementations must be safe to
/// call from concurrent requests.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> PublishResult;

    /// Best-effort release of any open broker connection.
    async fn close(&self) {}
}

/// Kafka-backed publisher.
///
/// In [`ConnectionMode::PerRequest`] every call creates a producer, checks the
/// broker is reachable, sends, then flushes and drops the producer. In
/// [`ConnectionMode::Shared`] one producer lives for the whole process and is
/// shared by all requests; `FutureProducer` is safe for concurrent sends.
pub struct KafkaPublisher {
    client_config: ClientConfig,
    timeout: Duration,
    shared: Option<FutureProducer>,
}

impl KafkaPublisher {
    pub fn new(settings: &KafkaSettings) -> Result<Self, PublishError> {
        let client_config = settings.client_config();
        let shared = match settings.connection_mode {
            ConnectionMode::PerRequest => None,
            ConnectionMode::Shared => {
                info!("Creating shared Kafka producer");
                Some(create_producer(&client_config)?)
            }
        };

        Ok(Self {
            client_config,
            timeout: settings.publish_timeout,
            shared,
        })
    }

    async fn connect(&self, topic: &str) -> Result<FutureProducer, PublishError> {
        let producer = create_producer(&self.client_config)?;
        if let Err(e) = self.check_reachable(&producer, topic).await {
            release(producer).await;
            return Err(e);
        }

        debug!("Connected to Kafka");
        Ok(producer)
    }

    /// Fetches topic metadata; any failure means no broker could be reached
    /// within the publish timeout.
    async fn check_reachable(
        &self,
        producer: &FutureProducer,
        topic: &str,
    ) -> Result<(), PublishError> {
        let probe = producer.clone();
        let topic = topic.to_string();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(Some(topic.as_str()), Timeout::After(timeout))
                .map(|_| ())
        })
        .await
        .map_err(|e| PublishError::BrokerUnreachable(e.to_string()))?
        .map_err(|e| PublishError::BrokerUnreachable(e.to_string()))
    }

    async fn disconnect(&self, producer: FutureProducer) {
        let timeout = self.timeout;
        // Flushing and dropping the producer both block on librdkafka.
        let res =
            tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout))).await;
        match res {
            Ok(Ok(())) => debug!("Disconnected from Kafka"),
            Ok(Err(e)) => warn!(error = %e, "Error flushing Kafka producer"),
            Err(e) => warn!(error = %e, "Error in spawn_blocking"),
        }
    }

    async fn send(
        &self,
        producer: &FutureProducer,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> PublishResult {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload)
            .timestamp(chrono::Utc::now().timestamp_millis());

        let start = Instant::now();
        // message.timeout.ms already bounds delivery; the outer guard covers
        // a broker that never answers at all.
        let res = tokio::time::timeout(
            self.timeout * 2,
            producer.send(record, Timeout::After(self.timeout)),
        )
        .await;

        match res {
            Ok(Ok((partition, offset))) => {
                info!(
                    partition = partition,
                    offset = offset,
                    message_id = %key,
                    topic = %topic,
                    latency_ms = start.elapsed().as_millis(),
                    "Message delivered to Kafka"
                );
                Ok(Delivery {
                    message_id: key.to_string(),
                    partition,
                    offset,
                })
            }
            Ok(Err((e, _))) => {
                let err = classify(e, self.timeout);
                error!(
                    error = %err,
                    message_id = %key,
                    topic = %topic,
                    latency_ms = start.elapsed().as_millis(),
                    "Failed to deliver message"
                );
                Err(err)
            }
            Err(_) => {
                error!(message_id = %key, topic = %topic, "Kafka send timed out");
                Err(PublishError::PublishTimeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> PublishResult {
        if let Some(producer) = &self.shared {
            self.check_reachable(producer, topic).await.inspect_err(|e| {
                error!(error = %e, topic = %topic, "Kafka broker unreachable");
            })?;
            return self.send(producer, topic, key, payload).await;
        }

        let producer = self.connect(topic).await.inspect_err(|e| {
            error!(error = %e, topic = %topic, "Could not connect to Kafka");
        })?;
        let res = self.send(&producer, topic, key, payload).await;
        self.disconnect(producer).await;
        res
    }

    async fn close(&self) {
        if let Some(producer) = self.shared.clone() {
            info!("Flushing Kafka producer (timeout: {:?})", self.timeout);
            self.disconnect(producer).await;
        }
    }
}

fn create_producer(client_config: &ClientConfig) -> Result<FutureProducer, PublishError> {
    client_config
        .create()
        .map_err(|e| PublishError::BrokerUnreachable(e.to_string()))
}

/// Drops a producer off the async runtime; librdkafka teardown blocks.
async fn release(producer: FutureProducer) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(producer)).await {
        warn!(error = %e, "Error in spawn_blocking");
    }
}

fn classify(err: KafkaError, timeout: Duration) -> PublishError {
    match err.rdkafka_error_code() {
        Some(
            RDKafkaErrorCode::MessageTimedOut
            | RDKafkaErrorCode::RequestTimedOut
            | RDKafkaErrorCode::OperationTimedOut,
        ) => PublishError::PublishTimeout(timeout),
        Some(
            RDKafkaErrorCode::AllBrokersDown
            | RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::Resolve
            | RDKafkaErrorCode::BrokerNotAvailable,
        ) => PublishError::BrokerUnreachable(err.to_string()),
        _ => PublishError::PublishRejected(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KafkaSettings, SecurityMode};

    fn produce_err(code: RDKafkaErrorCode) -> PublishError {
        classify(KafkaError::MessageProduction(code), Duration::from_secs(1))
    }

    #[test]
    fn classifies_delivery_errors() {
        assert_eq!(
            produce_err(RDKafkaErrorCode::MessageTimedOut),
            PublishError::PublishTimeout(Duration::from_secs(1))
        );
        assert!(matches!(
            produce_err(RDKafkaErrorCode::AllBrokersDown),
            PublishError::BrokerUnreachable(_)
        ));
        assert!(matches!(
            produce_err(RDKafkaErrorCode::UnknownTopicOrPartition),
            PublishError::PublishRejected(_)
        ));
        assert!(matches!(
            produce_err(RDKafkaErrorCode::TopicAuthorizationFailed),
            PublishError::PublishRejected(_)
        ));
    }

    fn unreachable_settings(mode: ConnectionMode) -> KafkaSettings {
        KafkaSettings {
            brokers: "127.0.0.1:1".to_string(),
            topic: "intake".to_string(),
            client_id: "test".to_string(),
            security_protocol: None,
            security: SecurityMode::None,
            sasl: None,
            publish_timeout: Duration::from_millis(300),
            connection_mode: mode,
        }
    }

    #[tokio::test]
    async fn per_request_publish_to_dead_broker_fails_without_panicking() {
        let publisher = KafkaPublisher::new(&unreachable_settings(ConnectionMode::PerRequest))
            .expect("client creation does not connect");
        let res = publisher.publish("intake", "abc", b"{}").await;
        assert!(matches!(res, Err(PublishError::BrokerUnreachable(_))), "{:?}", res);
    }

    #[tokio::test]
    async fn shared_publish_to_dead_broker_is_unreachable() {
        let publisher = KafkaPublisher::new(&unreachable_settings(ConnectionMode::Shared))
            .expect("client creation does not connect");
        let res = publisher.publish("intake", "abc", b"{}").await;
        assert!(matches!(res, Err(PublishError::BrokerUnreachable(_))), "{:?}", res);
        publisher.close().await;
    }
}
