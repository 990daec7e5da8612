//! In-memory message broker for tests and single-process development.
//!
//! Same delivery semantics as the Redis adapter: a publish reaches every
//! subscription that holds the topic at that instant, nothing is buffered
//! for later subscribers, and dropping a subscription's control half
//! removes it from every topic.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are poisoned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::domain::realtime::Topic;
use crate::ports::{
    BrokerError, BrokerMessage, BrokerSubscription, MessageBroker, SubscriptionControl,
};

type Delivery = Result<BrokerMessage, BrokerError>;

#[derive(Default)]
struct Inner {
    /// topic → subscription id → sender
    topics: HashMap<String, HashMap<u64, mpsc::UnboundedSender<Delivery>>>,
    /// Every open subscription, for `sever_subscriptions`.
    subscriptions: HashMap<u64, mpsc::UnboundedSender<Delivery>>,
    published: Vec<(Topic, String)>,
    next_id: u64,
    fail_publishes: bool,
    fail_subscriptions: bool,
}

impl Inner {
    fn remove_from_topic(&mut self, topic: &str, id: u64) {
        if let Some(subscribers) = self.topics.get_mut(topic) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                self.topics.remove(topic);
            }
        }
    }
}

/// In-memory broker.
///
/// # Example
///
/// ```ignore
/// let broker = Arc::new(InMemoryMessageBroker::new());
/// let mut sub = broker.open_subscription().await?;
/// sub.control.subscribe(&[Topic::section("s1")]).await?;
///
/// broker.publish(&Topic::section("s1"), payload).await?;
/// assert_eq!(broker.published_to(&Topic::section("s1")).len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryMessageBroker {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryMessageBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .expect("InMemoryMessageBroker: lock poisoned")
    }

    // === Test Helpers ===

    /// Every publish so far, in order.
    pub fn published(&self) -> Vec<(Topic, String)> {
        self.lock().published.clone()
    }

    /// Payloads published to one topic.
    pub fn published_to(&self, topic: &Topic) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Number of subscriptions currently holding `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.lock()
            .topics
            .get(topic.as_str())
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Number of subscriptions whose control half is still alive.
    pub fn open_subscriptions(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Makes every subsequent publish fail with a connection error.
    pub fn fail_publishes(&self, fail: bool) {
        self.lock().fail_publishes = fail;
    }

    /// Makes every subsequent `open_subscription` fail with a connection error.
    pub fn fail_subscriptions(&self, fail: bool) {
        self.lock().fail_subscriptions = fail;
    }

    /// Pushes a receive error into every open subscription, as a dropped
    /// broker connection would.
    pub fn sever_subscriptions(&self) {
        for tx in self.lock().subscriptions.values() {
            let _ = tx.send(Err(BrokerError::Connection("severed".to_string())));
        }
    }
}

#[async_trait]
impl MessageBroker for InMemoryMessageBroker {
    async fn publish(&self, topic: &Topic, payload: String) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        if inner.fail_publishes {
            return Err(BrokerError::Connection("broker unavailable".to_string()));
        }

        inner.published.push((topic.clone(), payload.clone()));
        if let Some(subscribers) = inner.topics.get(topic.as_str()) {
            for tx in subscribers.values() {
                // A closed receiver just means that connection is going away.
                let _ = tx.send(Ok(BrokerMessage {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                }));
            }
        }
        Ok(())
    }

    async fn open_subscription(&self) -> Result<BrokerSubscription, BrokerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.lock();
            if inner.fail_subscriptions {
                return Err(BrokerError::Connection("broker unavailable".to_string()));
            }
            inner.next_id += 1;
            let id = inner.next_id;
            inner.subscriptions.insert(id, tx.clone());
            id
        };

        let messages = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|delivery| (delivery, rx))
        })
        .boxed();

        Ok(BrokerSubscription {
            control: Box::new(InMemorySubscriptionControl {
                id,
                tx,
                inner: Arc::clone(&self.inner),
            }),
            messages,
        })
    }
}

struct InMemorySubscriptionControl {
    id: u64,
    tx: mpsc::UnboundedSender<Delivery>,
    inner: Arc<Mutex<Inner>>,
}

impl InMemorySubscriptionControl {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .expect("InMemoryMessageBroker: lock poisoned")
    }
}

#[async_trait]
impl SubscriptionControl for InMemorySubscriptionControl {
    async fn subscribe(&mut self, topics: &[Topic]) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        for topic in topics {
            inner
                .topics
                .entry(topic.to_string())
                .or_default()
                .insert(self.id, self.tx.clone());
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, topics: &[Topic]) -> Result<(), BrokerError> {
        let mut inner = self.lock();
        for topic in topics {
            inner.remove_from_topic(topic.as_str(), self.id);
        }
        Ok(())
    }
}

impl Drop for InMemorySubscriptionControl {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            let topics: Vec<String> = inner.topics.keys().cloned().collect();
            for topic in topics {
                inner.remove_from_topic(&topic, self.id);
            }
            inner.subscriptions.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn section(id: &str) -> Topic {
        Topic::section(id)
    }

    #[tokio::test]
    async fn publish_reaches_subscribed_topic() {
        let broker = InMemoryMessageBroker::new();
        let mut sub = broker.open_subscription().await.unwrap();
        sub.control.subscribe(&[section("s1")]).await.unwrap();

        broker.publish(&section("s1"), "hello".into()).await.unwrap();

        let msg = sub.messages.next().await.unwrap().unwrap();
        assert_eq!(msg.topic, "section:s1");
        assert_eq!(msg.payload, "hello");
    }

    #[tokio::test]
    async fn publish_skips_other_topics() {
        let broker = InMemoryMessageBroker::new();
        let mut sub = broker.open_subscription().await.unwrap();
        sub.control.subscribe(&[section("s1")]).await.unwrap();

        broker.publish(&section("s2"), "nope".into()).await.unwrap();

        let next = tokio::time::timeout(Duration::from_millis(50), sub.messages.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let broker = InMemoryMessageBroker::new();
        let mut sub = broker.open_subscription().await.unwrap();
        sub.control.subscribe(&[section("s1")]).await.unwrap();
        sub.control.unsubscribe(&[section("s1")]).await.unwrap();

        assert_eq!(broker.subscriber_count(&section("s1")), 0);
        broker.publish(&section("s1"), "late".into()).await.unwrap();

        let next = tokio::time::timeout(Duration::from_millis(50), sub.messages.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn unsubscribe_unknown_topic_is_ok() {
        let broker = InMemoryMessageBroker::new();
        let mut sub = broker.open_subscription().await.unwrap();
        assert!(sub.control.unsubscribe(&[section("ghost")]).await.is_ok());
    }

    #[tokio::test]
    async fn dropping_control_releases_topics_and_ends_stream() {
        let broker = InMemoryMessageBroker::new();
        let BrokerSubscription { mut control, mut messages } =
            broker.open_subscription().await.unwrap();
        control.subscribe(&[section("s1"), section("s2")]).await.unwrap();
        assert_eq!(broker.open_subscriptions(), 1);

        drop(control);

        assert_eq!(broker.subscriber_count(&section("s1")), 0);
        assert_eq!(broker.open_subscriptions(), 0);
        assert!(messages.next().await.is_none());
    }

    #[tokio::test]
    async fn failing_publish_returns_connection_error() {
        let broker = InMemoryMessageBroker::new();
        broker.fail_publishes(true);

        let result = broker.publish(&section("s1"), "x".into()).await;
        assert!(matches!(result, Err(BrokerError::Connection(_))));
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn sever_delivers_receive_error() {
        let broker = InMemoryMessageBroker::new();
        let mut sub = broker.open_subscription().await.unwrap();

        broker.sever_subscriptions();

        assert!(matches!(sub.messages.next().await, Some(Err(BrokerError::Connection(_)))));
    }

    #[tokio::test]
    async fn published_to_filters_by_topic() {
        let broker = InMemoryMessageBroker::new();
        broker.publish(&section("s1"), "a".into()).await.unwrap();
        broker.publish(&section("s2"), "b".into()).await.unwrap();

        assert_eq!(broker.published_to(&section("s1")), vec!["a".to_string()]);
        assert_eq!(broker.published().len(), 2);
    }
}
