//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the realtime core and the outside world. Adapters implement these ports.
//!
//! - `MessageBroker` - Publish/subscribe transport (Redis in production)
//! - `EventPublisher` - Fire-and-forget interface CRUD handlers emit events through
//! - `SessionValidator` - Token validation supplied by the auth collaborator

mod event_publisher;
mod message_broker;
mod session_validator;

pub use event_publisher::EventPublisher;
pub use message_broker::{
    BrokerError, BrokerMessage, BrokerMessageStream, BrokerSubscription, MessageBroker,
    SubscriptionControl,
};
pub use session_validator::SessionValidator;
