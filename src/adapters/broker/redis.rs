//! Redis pub/sub implementation of the `MessageBroker` port.
//!
//! Publishing goes through one shared multiplexed connection. Each
//! subscription gets a dedicated pub/sub connection (Redis puts a connection
//! into subscriber mode), split into a sink for SUBSCRIBE/UNSUBSCRIBE and a
//! stream of messages. Dropping both halves closes that connection.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSubSink};
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::domain::realtime::Topic;
use crate::ports::{
    BrokerError, BrokerMessage, BrokerSubscription, MessageBroker, SubscriptionControl,
};

/// Redis-backed broker for production deployments.
#[derive(Clone)]
pub struct RedisMessageBroker {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisMessageBroker {
    /// Open the client and the shared publishing connection.
    ///
    /// Fails fast if Redis is unreachable within the configured timeout.
    pub async fn connect(config: &RedisConfig) -> Result<Self, BrokerError> {
        let client = redis::Client::open(config.url.as_str()).map_err(connection_error)?;

        let publisher = tokio::time::timeout(
            config.timeout(),
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| BrokerError::Connection("timed out connecting to Redis".to_string()))?
        .map_err(connection_error)?;

        tracing::info!("Connected to Redis");

        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl MessageBroker for RedisMessageBroker {
    async fn publish(&self, topic: &Topic, payload: String) -> Result<(), BrokerError> {
        let mut conn = self.publisher.clone();

        conn.publish::<_, _, ()>(topic.as_str(), payload)
            .await
            .map_err(|e: redis::RedisError| BrokerError::Command(e.to_string()))
    }

    async fn open_subscription(&self) -> Result<BrokerSubscription, BrokerError> {
        let pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(connection_error)?;
        let (sink, stream) = pubsub.split();

        let messages = stream
            .map(|msg| {
                Ok(BrokerMessage {
                    topic: msg.get_channel_name().to_string(),
                    payload: decode_payload(msg.get_payload_bytes()),
                })
            })
            .boxed();

        Ok(BrokerSubscription {
            control: Box::new(RedisSubscriptionControl { sink }),
            messages,
        })
    }
}

struct RedisSubscriptionControl {
    sink: PubSubSink,
}

#[async_trait]
impl SubscriptionControl for RedisSubscriptionControl {
    async fn subscribe(&mut self, topics: &[Topic]) -> Result<(), BrokerError> {
        if topics.is_empty() {
            return Ok(());
        }
        self.sink
            .subscribe(channel_names(topics))
            .await
            .map_err(|e| BrokerError::Command(e.to_string()))
    }

    async fn unsubscribe(&mut self, topics: &[Topic]) -> Result<(), BrokerError> {
        if topics.is_empty() {
            return Ok(());
        }
        self.sink
            .unsubscribe(channel_names(topics))
            .await
            .map_err(|e| BrokerError::Command(e.to_string()))
    }
}

fn channel_names(topics: &[Topic]) -> Vec<String> {
    topics.iter().map(Topic::to_string).collect()
}

/// Payloads are relayed whatever their encoding; invalid UTF-8 is replaced
/// rather than failing the subscription.
fn decode_payload(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn connection_error(e: redis::RedisError) -> BrokerError {
    BrokerError::Connection(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_preserve_topic_strings() {
        let names = channel_names(&[Topic::section("s1"), Topic::post("p1")]);
        assert_eq!(names, vec!["section:s1", "post:p1"]);
    }

    #[test]
    fn utf8_payload_is_decoded_verbatim() {
        assert_eq!(decode_payload("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn non_utf8_payload_is_still_relayed_as_a_message_event() {
        let payload = decode_payload(&[0xff, b'h', b'i']);
        assert_eq!(payload, "\u{fffd}hi");

        let frame = crate::domain::realtime::relay_frame(&payload);
        let envelope = crate::domain::realtime::EventEnvelope::parse(&frame).unwrap();
        assert_eq!(envelope.event_type, "message");
        assert_eq!(envelope.data["payload"], "\u{fffd}hi");
    }

    #[tokio::test]
    async fn connect_rejects_invalid_url() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
            ..Default::default()
        };
        let result = RedisMessageBroker::connect(&config).await;
        assert!(matches!(result, Err(BrokerError::Connection(_))));
    }
}
