//! Domain layer containing the realtime rules and shared domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `realtime` - Topic naming, envelopes, control messages, subscription diff, origin policy

pub mod foundation;
pub mod realtime;
