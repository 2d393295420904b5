use std::env;
use std::time::Duration;

use url::Url;

use crate::error::NotifyError;

const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
const DEFAULT_TOAST_FRESHNESS_SECS: u64 = 10;
const DEFAULT_INFO_TOAST_TTL_SECS: u64 = 5;

/// Notification engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// REST base address, scheme included. The push endpoint is derived from
    /// this by scheme substitution.
    pub api_base: String,
    /// Maximum age at which a notification still qualifies for a toast.
    pub toast_freshness: Duration,
    /// Auto-dismiss delay for info toasts; urgent toasts never auto-dismiss.
    pub info_toast_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let base = env::var("WAYPOINT_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Self {
            toast_freshness: env_secs("WAYPOINT_TOAST_FRESHNESS_SECS", DEFAULT_TOAST_FRESHNESS_SECS),
            info_toast_ttl: env_secs("WAYPOINT_TOAST_INFO_TTL_SECS", DEFAULT_INFO_TOAST_TTL_SECS),
            ..Self::with_api_base(base)
        }
    }

    /// Configuration for a given backend base address; bare hosts get a
    /// scheme inferred from their address class.
    pub fn with_api_base(base: impl AsRef<str>) -> Self {
        let trimmed = base.as_ref().trim();
        let api_base = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("{}{}", infer_scheme(trimmed), trimmed)
        };
        Self {
            api_base,
            toast_freshness: Duration::from_secs(DEFAULT_TOAST_FRESHNESS_SECS),
            info_toast_ttl: Duration::from_secs(DEFAULT_INFO_TOAST_TTL_SECS),
        }
    }

    pub fn api_base_url(&self) -> Result<Url, NotifyError> {
        Url::parse(&self.api_base)
            .map_err(|err| NotifyError::InvalidConfig(format!("invalid api base url: {err}")))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }
}

fn env_secs(var: &str, default: u64) -> Duration {
    let secs = env::var(var)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

/// Loopback and private hosts default to plain http, everything else to
/// https.
fn infer_scheme(base: &str) -> &'static str {
    let host_part = base
        .split('/')
        .next()
        .unwrap_or(base)
        .trim_start_matches('[')
        .split(']')
        .next()
        .unwrap_or(base);
    let host_lower = host_part.to_ascii_lowercase();
    if host_lower.starts_with("localhost")
        || host_lower == "0.0.0.0"
        || host_lower.starts_with("127.")
        || host_lower == "::1"
        || host_lower.starts_with("10.")
        || host_lower.starts_with("192.168.")
    {
        "http://"
    } else {
        "https://"
    }
}
