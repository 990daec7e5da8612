//! Realtime gateway configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;
use crate::domain::realtime::{OriginPolicy, DEFAULT_DEV_ORIGIN};

/// WebSocket gateway tuning and origin policy
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Comma-separated `host[:port]` entries allowed to open sockets
    #[serde(default)]
    pub allowed_origins: Option<String>,

    /// Origin accepted when no allowlist is configured
    #[serde(default = "default_dev_origin")]
    pub dev_origin: String,

    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,

    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Largest inbound client frame, in bytes
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Upper bound on a single fire-and-forget publish
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
}

impl RealtimeConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// Build the origin policy from the allowlist and dev origin
    pub fn origin_policy(&self) -> OriginPolicy {
        OriginPolicy::from_allowlist(self.allowed_origins.as_deref(), &self.dev_origin)
    }

    /// Validate realtime configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.ping_interval_secs == 0 {
            return Err(ValidationError::ZeroTimeout("realtime.ping_interval_secs"));
        }
        if self.pong_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("realtime.pong_timeout_secs"));
        }
        if self.write_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("realtime.write_timeout_secs"));
        }
        if self.publish_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("realtime.publish_timeout_secs"));
        }
        if self.ping_interval_secs >= self.pong_timeout_secs {
            return Err(ValidationError::PingIntervalTooLong);
        }
        if self.max_message_bytes == 0 {
            return Err(ValidationError::InvalidMessageSize);
        }
        if *environment == Environment::Production && !self.origin_policy().has_allowlist() {
            return Err(ValidationError::OriginAllowlistRequired);
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            allowed_origins: None,
            dev_origin: default_dev_origin(),
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
            write_timeout_secs: default_write_timeout(),
            max_message_bytes: default_max_message_bytes(),
            publish_timeout_secs: default_publish_timeout(),
        }
    }
}

fn default_dev_origin() -> String {
    DEFAULT_DEV_ORIGIN.to_string()
}

fn default_ping_interval() -> u64 {
    54
}

fn default_pong_timeout() -> u64 {
    60
}

fn default_write_timeout() -> u64 {
    10
}

fn default_max_message_bytes() -> usize {
    4096
}

fn default_publish_timeout() -> u64 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_config_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.ping_interval(), Duration::from_secs(54));
        assert_eq!(config.pong_timeout(), Duration::from_secs(60));
        assert_eq!(config.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.publish_timeout(), Duration::from_secs(2));
        assert_eq!(config.max_message_bytes, 4096);
        assert_eq!(config.dev_origin, "localhost:5173");
        assert!(config.validate(&Environment::Development).is_ok());
    }

    #[test]
    fn test_validation_ping_must_be_shorter_than_pong() {
        let config = RealtimeConfig {
            ping_interval_secs: 60,
            pong_timeout_secs: 60,
            ..Default::default()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::PingIntervalTooLong)
        );
    }

    #[test]
    fn test_validation_zero_write_timeout() {
        let config = RealtimeConfig {
            write_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::ZeroTimeout("realtime.write_timeout_secs"))
        );
    }

    #[test]
    fn test_validation_zero_message_size() {
        let config = RealtimeConfig {
            max_message_bytes: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidMessageSize)
        );
    }

    #[test]
    fn test_production_requires_allowlist() {
        let config = RealtimeConfig::default();
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::OriginAllowlistRequired)
        );

        // Blank entries do not count as an allowlist
        let blank = RealtimeConfig {
            allowed_origins: Some(" , ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            blank.validate(&Environment::Production),
            Err(ValidationError::OriginAllowlistRequired)
        );

        let config = RealtimeConfig {
            allowed_origins: Some("forum.example.com".to_string()),
            ..Default::default()
        };
        assert!(config.validate(&Environment::Production).is_ok());
    }

    #[test]
    fn test_origin_policy_uses_allowlist() {
        let config = RealtimeConfig {
            allowed_origins: Some("Forum.Example.com, app.example.com:8443".to_string()),
            ..Default::default()
        };
        let policy = config.origin_policy();
        assert!(policy.check(Some("https://forum.example.com"), None));
        assert!(policy.check(Some("https://app.example.com:8443"), None));
        assert!(!policy.check(Some("http://localhost:5173"), None));
    }
}
