//! BrokerEventPublisher - fire-and-forget event delivery over the broker.
//!
//! ```text
//! handler ──publish()──► spawn ──timeout(publish_timeout)──► MessageBroker::publish
//!    │                                    │
//!    └── returns immediately              └── failures are logged, never returned
//! ```
//!
//! Every envelope is serialized with a fresh timestamp and published to
//! exactly one topic. Fan-out helpers on the port produce one envelope per
//! topic.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::config::RealtimeConfig;
use crate::domain::realtime::{EventEnvelope, Topic};
use crate::ports::{BrokerError, EventPublisher, MessageBroker};

/// Default upper bound on a single detached publish.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

/// Why a single delivery failed.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
}

/// Publishes event envelopes to broker topics.
#[derive(Clone)]
pub struct BrokerEventPublisher {
    broker: Arc<dyn MessageBroker>,
    publish_timeout: Duration,
}

impl BrokerEventPublisher {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self::with_timeout(broker, DEFAULT_PUBLISH_TIMEOUT)
    }

    pub fn with_timeout(broker: Arc<dyn MessageBroker>, publish_timeout: Duration) -> Self {
        Self {
            broker,
            publish_timeout,
        }
    }

    /// Publisher bounded by `realtime.publish_timeout_secs`.
    pub fn from_config(broker: Arc<dyn MessageBroker>, config: &RealtimeConfig) -> Self {
        Self::with_timeout(broker, config.publish_timeout())
    }

    /// Serialize and publish one envelope, waiting for the broker.
    ///
    /// This is the awaited core behind [`EventPublisher::publish`] for
    /// callers that need to observe the outcome.
    pub async fn deliver(
        &self,
        topic: &Topic,
        event_type: &str,
        payload: JsonValue,
    ) -> Result<(), PublishError> {
        let frame = EventEnvelope::new(event_type, payload).to_json()?;

        tokio::time::timeout(self.publish_timeout, self.broker.publish(topic, frame))
            .await
            .map_err(|_| PublishError::Timeout(self.publish_timeout))??;

        Ok(())
    }
}

impl EventPublisher for BrokerEventPublisher {
    fn publish(&self, topic: &Topic, event_type: &str, payload: JsonValue) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(
                topic = %topic,
                event_type,
                "Dropping realtime event: no async runtime available"
            );
            return;
        };

        let publisher = self.clone();
        let topic = topic.clone();
        let event_type = event_type.to_string();

        runtime.spawn(async move {
            match publisher.deliver(&topic, &event_type, payload).await {
                Ok(()) => {
                    tracing::trace!(topic = %topic, event_type = %event_type, "Published realtime event");
                }
                Err(e) => {
                    tracing::warn!(
                        topic = %topic,
                        event_type = %event_type,
                        error = %e,
                        "Failed to publish realtime event"
                    );
                }
            }
        });
    }
}
