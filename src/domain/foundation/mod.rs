//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types that the
//! realtime layer is built on.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::ValidationError;
pub use ids::{ConnectionId, UserId};
pub use timestamp::Timestamp;
