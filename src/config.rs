//! Gateway settings, loaded once at startup
//!
//! Sources, lowest priority first: built-in defaults, optional
//! `config/default`, `config/<app_env>` and `config/local` files, then the
//! process environment (`JWT_SIGN_KEY`, `TARGET_DOMAIN`, `APP_ENV`, ...).

use crate::diagnostics::{DiagnosticsSettings, LogFormat, QueueCapacity};
use crate::proxy::UpstreamOrigin;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub use config::ConfigError;

/// `APP_ENV` value that turns on TLS
pub const PRODUCTION_ENV: &str = "PROD";

/// Flat key space exactly as read from the sources
#[derive(Debug, Deserialize, Clone)]
struct RawSettings {
    jwt_sign_key: String,
    target_domain: String,
    app_env: String,
    ssl_cert_path: Option<String>,
    ssl_key_path: Option<String>,
    log_dir: String,
    log_format: String,
    diagnostics_capacity: usize,
    upstream_timeout_secs: u64,
    http_port: u16,
    https_port: u16,
    bind_host: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub token: TokenSettings,
    pub upstream: UpstreamSettings,
    pub diagnostics: DiagnosticsSettings,
    pub listener: ListenerSettings,
}

/// Shared HMAC secret for bearer tokens
#[derive(Clone)]
pub struct TokenSettings {
    signing_secret: String,
}

impl TokenSettings {
    pub fn signing_secret(&self) -> &[u8] {
        self.signing_secret.as_bytes()
    }
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("signing_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub origin: UpstreamOrigin,
    pub timeout: Duration,
}

/// Where the gateway listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerSettings {
    Plain {
        addr: SocketAddr,
    },
    Tls {
        addr: SocketAddr,
        cert_path: PathBuf,
        key_path: PathBuf,
    },
}

impl ListenerSettings {
    pub fn addr(&self) -> SocketAddr {
        match self {
            Self::Plain { addr } | Self::Tls { addr, .. } => *addr,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls { .. })
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Self::with_defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                File::with_name(&format!("config/{}", environment.to_lowercase())).required(false),
            )
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default())
            .build()?;

        Self::from_config(config)
    }

    /// Built-in defaults for every optional key
    pub fn with_defaults(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        builder
            .set_default("app_env", "development")?
            .set_default("log_dir", crate::diagnostics::DEFAULT_LOG_DIR)?
            .set_default("log_format", "text")?
            .set_default("diagnostics_capacity", crate::diagnostics::DEFAULT_CAPACITY as u64)?
            .set_default(
                "upstream_timeout_secs",
                crate::proxy::DEFAULT_UPSTREAM_TIMEOUT.as_secs(),
            )?
            .set_default("http_port", 80)?
            .set_default("https_port", 443)?
            .set_default("bind_host", "0.0.0.0")
    }

    /// Deserialize and validate an already-built configuration
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let raw: RawSettings = config.try_deserialize()?;
        Self::try_from(raw)
    }

    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION_ENV
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = ConfigError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        if raw.jwt_sign_key.is_empty() {
            return Err(invalid("JWT_SIGN_KEY must not be empty"));
        }

        let origin = UpstreamOrigin::try_new(raw.target_domain.clone()).map_err(|_| {
            invalid(format!(
                "TARGET_DOMAIN must be an http:// or https:// origin, got '{}'",
                raw.target_domain
            ))
        })?;

        let format: LogFormat = raw.log_format.parse().map_err(invalid)?;
        let capacity = QueueCapacity::try_new(raw.diagnostics_capacity)
            .map_err(|_| invalid("DIAGNOSTICS_CAPACITY must be greater than zero"))?;
        if raw.upstream_timeout_secs == 0 {
            return Err(invalid("UPSTREAM_TIMEOUT_SECS must be greater than zero"));
        }

        let host: IpAddr = raw
            .bind_host
            .parse()
            .map_err(|e| invalid(format!("BIND_HOST '{}': {e}", raw.bind_host)))?;

        let listener = if raw.app_env == PRODUCTION_ENV {
            let cert_path = non_empty(raw.ssl_cert_path)
                .ok_or_else(|| invalid("SSL_CERT_PATH is required when APP_ENV=PROD"))?;
            let key_path = non_empty(raw.ssl_key_path)
                .ok_or_else(|| invalid("SSL_KEY_PATH is required when APP_ENV=PROD"))?;
            ListenerSettings::Tls {
                addr: SocketAddr::new(host, raw.https_port),
                cert_path: PathBuf::from(cert_path),
                key_path: PathBuf::from(key_path),
            }
        } else {
            ListenerSettings::Plain {
                addr: SocketAddr::new(host, raw.http_port),
            }
        };

        Ok(Self {
            environment: raw.app_env,
            token: TokenSettings {
                signing_secret: raw.jwt_sign_key,
            },
            upstream: UpstreamSettings {
                origin,
                timeout: Duration::from_secs(raw.upstream_timeout_secs),
            },
            diagnostics: DiagnosticsSettings {
                log_dir: PathBuf::from(raw.log_dir),
                format,
                capacity,
            },
            listener,
        })
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Message(message.into())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
