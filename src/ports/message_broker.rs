//! MessageBroker port - the publish/subscribe transport.
//!
//! The broker connection is shared process-wide for publishing, but every
//! WebSocket connection opens its own [`BrokerSubscription`]. A subscription
//! is split in two so the owning connection can change its topic set from
//! the read loop while the write loop is parked on the message stream:
//!
//! ```text
//!                 ┌──────────────────────┐
//!   read loop ──▶ │ SubscriptionControl  │  subscribe / unsubscribe
//!                 └──────────────────────┘
//!                 ┌──────────────────────┐
//!  write loop ◀── │ BrokerMessageStream  │  messages for subscribed topics
//!                 └──────────────────────┘
//! ```
//!
//! Dropping both halves releases the subscription.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use crate::domain::realtime::Topic;

/// Errors surfaced by broker adapters.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Could not reach the broker or the connection dropped.
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// The broker rejected or failed a command.
    #[error("Broker command failed: {0}")]
    Command(String),

    /// The subscription has already been closed.
    #[error("Broker subscription closed")]
    Closed,
}

/// One message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: String,
}

/// Receive half of a subscription.
///
/// An `Err` item or the end of the stream means the subscription is dead.
pub type BrokerMessageStream =
    Pin<Box<dyn Stream<Item = Result<BrokerMessage, BrokerError>> + Send>>;

/// Control half of a subscription.
#[async_trait]
pub trait SubscriptionControl: Send {
    async fn subscribe(&mut self, topics: &[Topic]) -> Result<(), BrokerError>;

    async fn unsubscribe(&mut self, topics: &[Topic]) -> Result<(), BrokerError>;
}

/// A private subscription handle, owned by exactly one connection.
pub struct BrokerSubscription {
    pub control: Box<dyn SubscriptionControl>,
    pub messages: BrokerMessageStream,
}

/// Port for the process-wide broker client.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a serialized payload to one topic.
    async fn publish(&self, topic: &Topic, payload: String) -> Result<(), BrokerError>;

    /// Open a new, initially empty subscription.
    async fn open_subscription(&self) -> Result<BrokerSubscription, BrokerError>;
}
