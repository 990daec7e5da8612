//! Authentication configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

/// Authentication configuration (HS256 access tokens)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Shared secret the access tokens are signed with
    pub jwt_secret: String,

    /// Expected `iss` claim, if any
    #[serde(default)]
    pub issuer: Option<String>,

    /// Expected `aud` claim, if any
    #[serde(default)]
    pub audience: Option<String>,
}

impl AuthConfig {
    /// Validate authentication configuration
    ///
    /// In production, requires a secret of at least 32 bytes.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.jwt_secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_JWT_SECRET"));
        }
        if *environment == Environment::Production
            && self.jwt_secret.len() < MIN_PRODUCTION_SECRET_BYTES
        {
            return Err(ValidationError::JwtSecretTooShort);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_missing_secret() {
        let config = AuthConfig::default();
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("AUTH_JWT_SECRET"))
        );
    }

    #[test]
    fn test_validation_production_requires_long_secret() {
        let config = AuthConfig {
            jwt_secret: "short".to_string(),
            ..Default::default()
        };
        // Allowed in development
        assert!(config.validate(&Environment::Development).is_ok());
        // Rejected in production
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::JwtSecretTooShort)
        );
    }

    #[test]
    fn test_validation_valid_production_config() {
        let config = AuthConfig {
            jwt_secret: "x".repeat(48),
            issuer: Some("https://auth.example.com".to_string()),
            audience: None,
        };
        assert!(config.validate(&Environment::Production).is_ok());
    }
}
