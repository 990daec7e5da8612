//! Authentication adapters implementing the `SessionValidator` port.
//!
//! - `jwt` - HS256 shared-secret access tokens
//! - `mock` - token map for tests

mod jwt;
mod mock;

pub use jwt::JwtSessionValidator;
pub use mock::MockSessionValidator;
