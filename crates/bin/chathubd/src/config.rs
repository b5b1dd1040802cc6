//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `chathub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use chathub_adapter_virtual::VirtualConfig;
use chathub_adapter_zapi::{ZapiConfig, ZapiInstance};
use chathub_app::registry::SessionConfig;
use chathub_app::retry::RetryPolicy;
use chathub_domain::id::OrganizationId;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Session limits and timers.
    pub sessions: SessionsConfig,
    /// Which channel backs the sessions.
    pub provider: ProviderConfig,
    /// Z-API credentials, used when `provider.kind = "zapi"`.
    pub zapi: ZapiSection,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Session handling.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub max_sessions: usize,
    pub qr_ttl_secs: u64,
    pub handshake_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// How long a webhook message id is remembered for redelivery checks.
    pub dedup_window_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_multiplier: u32,
}

/// Channel backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Simulated channel, for demos and local development.
    Virtual,
    Zapi,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Virtual => "virtual",
            Self::Zapi => "zapi",
        })
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "virtual" => Ok(Self::Virtual),
            "zapi" => Ok(Self::Zapi),
            other => Err(ConfigError::Validation(format!(
                "unknown provider {other:?}, expected \"virtual\" or \"zapi\""
            ))),
        }
    }
}

/// Provider selection.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Seconds after which virtual sessions pair by themselves. `0` waits
    /// for an explicit scan.
    pub virtual_auto_pair_secs: u64,
}

/// Z-API settings as written in the file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ZapiSection {
    pub base_url: String,
    pub client_token: Option<String>,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub logout_on_close: bool,
    /// Instance credentials keyed by organization id.
    pub instances: HashMap<String, ZapiInstanceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZapiInstanceConfig {
    pub instance_id: String,
    pub token: String,
}

impl Config {
    /// Load configuration from `chathub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if an
    /// override or the final configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("chathub.toml")?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("CHATHUB_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("CHATHUB_PORT")
            && let Ok(port) = val.parse()
        {
            self.server.port = port;
        }
        if let Ok(val) = std::env::var("CHATHUB_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("CHATHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("CHATHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("CHATHUB_PROVIDER") {
            self.provider.kind = val.parse()?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::Validation(
                "sessions.max_sessions must be at least 1".to_string(),
            ));
        }
        if self.sessions.qr_ttl_secs == 0 || self.sessions.handshake_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "session timers must be non-zero".to_string(),
            ));
        }
        if self.sessions.retry_max_attempts == 0 {
            return Err(ConfigError::Validation(
                "sessions.retry_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.provider.kind == ProviderKind::Zapi {
            self.zapi_config()?;
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let s = &self.sessions;
        SessionConfig {
            max_sessions: s.max_sessions,
            qr_ttl: Duration::from_secs(s.qr_ttl_secs),
            handshake_timeout: Duration::from_secs(s.handshake_timeout_secs),
            read_timeout: Duration::from_secs(s.read_timeout_secs),
            retry: RetryPolicy {
                max_attempts: s.retry_max_attempts,
                base_delay: Duration::from_millis(s.retry_base_delay_ms),
                multiplier: s.retry_multiplier,
            },
        }
    }

    #[must_use]
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.sessions.dedup_window_secs)
    }

    #[must_use]
    pub fn virtual_config(&self) -> VirtualConfig {
        VirtualConfig {
            auto_pair_after: match self.provider.virtual_auto_pair_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    /// Z-API adapter settings with organization ids validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a blank organization key or
    /// an instance with empty credentials.
    pub fn zapi_config(&self) -> Result<ZapiConfig, ConfigError> {
        let z = &self.zapi;
        let mut instances = HashMap::with_capacity(z.instances.len());
        for (org, instance) in &z.instances {
            let organization_id = OrganizationId::new(org).map_err(|err| {
                ConfigError::Validation(format!("zapi.instances: {err}"))
            })?;
            if instance.instance_id.trim().is_empty() || instance.token.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "zapi.instances.{org}: instance_id and token are required"
                )));
            }
            instances.insert(
                organization_id,
                ZapiInstance {
                    instance_id: instance.instance_id.clone(),
                    token: instance.token.clone(),
                },
            );
        }
        Ok(ZapiConfig {
            base_url: z.base_url.trim_end_matches('/').to_string(),
            client_token: z.client_token.clone().filter(|t| !t.trim().is_empty()),
            poll_interval: Duration::from_secs(z.poll_interval_secs.max(1)),
            request_timeout: Duration::from_secs(z.request_timeout_secs.max(1)),
            logout_on_close: z.logout_on_close,
            instances,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:chathub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "chathubd=info,chathub=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            max_sessions: session.max_sessions,
            qr_ttl_secs: session.qr_ttl.as_secs(),
            handshake_timeout_secs: session.handshake_timeout.as_secs(),
            read_timeout_secs: session.read_timeout.as_secs(),
            dedup_window_secs: chathub_app::normalizer::DEFAULT_DEDUP_WINDOW.as_secs(),
            retry_max_attempts: session.retry.max_attempts,
            retry_base_delay_ms: u64::try_from(session.retry.base_delay.as_millis())
                .unwrap_or(u64::MAX),
            retry_multiplier: session.retry.multiplier,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Virtual,
            virtual_auto_pair_secs: 3,
        }
    }
}

impl Default for ZapiSection {
    fn default() -> Self {
        let defaults = ZapiConfig::default();
        Self {
            base_url: defaults.base_url,
            client_token: None,
            poll_interval_secs: defaults.poll_interval.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
            logout_on_close: defaults.logout_on_close,
            instances: HashMap::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
