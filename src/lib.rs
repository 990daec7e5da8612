//! Forum Realtime - per-user WebSocket gateway for the community platform.
//!
//! CRUD handlers publish event envelopes to broker topics; every connected
//! user holds one socket that relays the topics they are subscribed to.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
