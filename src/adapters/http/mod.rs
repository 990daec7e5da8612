//! HTTP adapters.

pub mod middleware;
