//! Message broker adapters.
//!
//! - `RedisMessageBroker` - production pub/sub over Redis
//! - `InMemoryMessageBroker` - in-process broker for tests

mod in_memory;
mod redis;

pub use self::in_memory::InMemoryMessageBroker;
pub use self::redis::RedisMessageBroker;
