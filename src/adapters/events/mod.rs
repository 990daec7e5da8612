//! Event publishing adapters.
//!
//! - `BrokerEventPublisher` - fire-and-forget envelopes over a `MessageBroker`

mod publisher;

pub use publisher::{BrokerEventPublisher, PublishError, DEFAULT_PUBLISH_TIMEOUT};
