//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::session::RetentionPolicy;

/// Default Discord REST endpoint.
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Origins that may always talk to the server.
const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "https://localhost:3000"];

/// Pacing and limits for a single export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Pause between flat-channel batches.
    pub batch_delay: Duration,
    /// Pause between archived-thread listing pages.
    pub archive_page_delay: Duration,
    /// Pause between comment pages within one forum post.
    pub comment_page_delay: Duration,
    /// Pause after each exported forum post.
    pub thread_delay: Duration,
    /// Message budget when the request leaves `maxMessages` unset or zero.
    pub default_max_messages: u32,
    /// Per-post comment cap when the request does not give a positive one.
    pub default_thread_cap: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(1500),
            archive_page_delay: Duration::from_millis(300),
            comment_page_delay: Duration::from_millis(200),
            thread_delay: Duration::from_millis(300),
            default_max_messages: 500,
            default_thread_cap: 5000,
        }
    }
}

impl ExportConfig {
    /// Same limits, no pacing. Used by tests.
    pub fn without_delays() -> Self {
        Self {
            batch_delay: Duration::ZERO,
            archive_page_delay: Duration::ZERO,
            comment_page_delay: Duration::ZERO,
            thread_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Public domain, only used to print the endpoint banner.
    pub domain: String,
    /// Origins allowed to open the WebSocket and fetch downloads.
    pub allowed_origins: Vec<String>,
    pub discord_api_base: String,
    pub retention: RetentionPolicy,
    pub export: ExportConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            domain: "localhost".to_string(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            discord_api_base: DEFAULT_DISCORD_API_BASE.to_string(),
            retention: RetentionPolicy::default(),
            export: ExportConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_var(&lookup, "PORT")?.unwrap_or(defaults.port);

        let domain = lookup("DOMAIN")
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(defaults.domain);

        let mut allowed_origins = defaults.allowed_origins;
        if let Some(site) = lookup("WEBSITE_URL").map(|s| s.trim().to_string()) {
            if !site.is_empty() && !allowed_origins.contains(&site) {
                allowed_origins.push(site);
            }
        }

        let discord_api_base = lookup("DISCORD_API_BASE")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.discord_api_base);

        let ttl = match parse_var::<u64, _>(&lookup, "EXPORT_RETENTION_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.retention.ttl,
        };
        let max_entries = match parse_var::<usize, _>(&lookup, "EXPORT_MAX_SESSIONS")? {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.retention.max_entries,
        };

        Ok(Self {
            port,
            domain,
            allowed_origins,
            discord_api_base,
            retention: RetentionPolicy { ttl, max_entries },
            export: defaults.export,
        })
    }

    /// Whether the server sits behind TLS on a public domain.
    pub fn is_local(&self) -> bool {
        self.domain == "localhost"
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}
