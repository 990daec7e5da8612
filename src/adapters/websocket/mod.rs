//! WebSocket gateway: per-user sockets bridged to broker topics.
//!
//! # Architecture
//!
//! ```text
//!   CRUD handler ──EventPublisher──► MessageBroker (Redis pub/sub)
//!                                          │
//!                      one private subscription per connection
//!                                          ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       ConnectionRegistry                            │
//! │   user-a → Connection      user-b → Connection      ...             │
//! │            ├── write_loop   (broker → socket)                       │
//! │            ├── read_loop    (subscribe / unsubscribe, pong)         │
//! │            └── keepalive    (ping)                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`connection`] - one socket, its subscription handle and topic set
//! - [`registry`] - at most one live connection per user
//! - [`tasks`] - read, write and keepalive loops
//! - [`handler`] - axum upgrade handler and router

pub mod connection;
pub mod handler;
pub mod registry;
pub mod tasks;

pub use connection::{CloseReason, Connection, ConnectionError, ConnectionSettings, CLOSE_REPLACED};
pub use handler::{run_connection, websocket_router, ws_handler, GatewayError, GatewayState};
pub use registry::ConnectionRegistry;
