//! Session validation port.
//!
//! Authentication is an external collaborator: by the time the gateway runs,
//! something has to turn a bearer token into a verified [`AuthenticatedUser`].
//! This port is that seam. Implementations exist for HS256 JWTs and for
//! tests; an OIDC provider would slot in the same way.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidToken` for malformed/bad signature tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token (without "Bearer " prefix) and return the user.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
