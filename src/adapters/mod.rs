//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - Session validators (HS256 JWT, mock)
//! - `broker` - Message brokers (Redis pub/sub, in-memory)
//! - `events` - Event publisher over a broker
//! - `http` - HTTP middleware
//! - `websocket` - Realtime gateway

pub mod auth;
pub mod broker;
pub mod events;
pub mod http;
pub mod websocket;

pub use broker::{InMemoryMessageBroker, RedisMessageBroker};
pub use events::BrokerEventPublisher;
