//! Origin check for WebSocket upgrades.
//!
//! Browsers attach an `Origin` header to every upgrade request. The check
//! compares its `host[:port]` against an explicit allowlist; with no
//! allowlist configured it falls back to a development posture that only
//! admits the local dev origin and same-origin requests.

use http::Uri;

/// Origin admitted when no allowlist is configured.
pub const DEFAULT_DEV_ORIGIN: &str = "localhost:5173";

/// Decides whether an upgrade request's origin is acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    allowlist: Vec<String>,
    dev_origin: String,
}

impl OriginPolicy {
    /// Builds a policy from a comma-separated `host[:port]` allowlist.
    ///
    /// Entries are trimmed and lower-cased; blank entries are ignored, so an
    /// empty or whitespace-only value means "no allowlist".
    pub fn from_allowlist(allowlist: Option<&str>, dev_origin: impl Into<String>) -> Self {
        let allowlist = allowlist
            .map(|raw| {
                raw.split(',')
                    .map(|entry| entry.trim().to_ascii_lowercase())
                    .filter(|entry| !entry.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            allowlist,
            dev_origin: dev_origin.into().trim().to_ascii_lowercase(),
        }
    }

    /// Policy with no allowlist and the default development origin.
    pub fn development() -> Self {
        Self::from_allowlist(None, DEFAULT_DEV_ORIGIN)
    }

    pub fn has_allowlist(&self) -> bool {
        !self.allowlist.is_empty()
    }

    /// `origin` is the raw `Origin` header, `host` the request's `Host` header.
    pub fn check(&self, origin: Option<&str>, host: Option<&str>) -> bool {
        let Some(origin) = origin.and_then(origin_authority) else {
            return false;
        };

        if self.has_allowlist() {
            return self.allowlist.iter().any(|entry| *entry == origin);
        }

        if origin == self.dev_origin {
            return true;
        }

        host.map(|h| h.trim().to_ascii_lowercase())
            .is_some_and(|h| h == origin)
    }
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::development()
    }
}

/// Extracts the lower-cased `host[:port]` of an origin such as
/// `https://Forum.example.com:8443`. Returns `None` for anything that is not
/// an absolute URI with a host (including the literal `null` origin).
fn origin_authority(origin: &str) -> Option<String> {
    let uri: Uri = origin.trim().parse().ok()?;
    uri.scheme()?;
    let host = uri.host().filter(|h| !h.is_empty())?.to_ascii_lowercase();

    Some(match uri.port_u16() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}
