use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::workflows::application::{SessionSettings, DEFAULT_AUTOSAVE_INTERVAL, DEFAULT_UPLOAD_TICK};

const DEFAULT_SUBMIT_LATENCY: Duration = Duration::from_millis(2000);
const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the portal service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub wizard: WizardConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(value) => LogFormat::parse(&value)?,
            Err(_) => LogFormat::Compact,
        };

        let wizard = WizardConfig {
            autosave_interval: duration_var(
                "WIZARD_AUTOSAVE_SECS",
                DEFAULT_AUTOSAVE_INTERVAL,
                Duration::from_secs,
            )?,
            upload_tick: duration_var(
                "WIZARD_UPLOAD_TICK_MS",
                DEFAULT_UPLOAD_TICK,
                Duration::from_millis,
            )?,
            submit_latency: duration_var(
                "WIZARD_SUBMIT_LATENCY_MS",
                DEFAULT_SUBMIT_LATENCY,
                Duration::from_millis,
            )?,
            session_idle_timeout: duration_var(
                "WIZARD_SESSION_IDLE_SECS",
                DEFAULT_SESSION_IDLE_TIMEOUT,
                Duration::from_secs,
            )?,
            draft_dir: env::var("WIZARD_DRAFT_DIR")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            wizard,
        })
    }
}

fn duration_var(
    key: &'static str,
    default: Duration,
    unit: fn(u64) -> Duration,
) -> Result<Duration, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };

    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidDuration {
            key,
            value: raw.clone(),
        })?;
    if value == 0 {
        return Err(ConfigError::InvalidDuration { key, value: raw });
    }

    Ok(unit(value))
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat {
                value: value.to_string(),
            }),
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Timers and storage for hosted wizard sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardConfig {
    pub autosave_interval: Duration,
    pub upload_tick: Duration,
    pub submit_latency: Duration,
    /// Mounted sessions untouched for this long are unmounted by the host.
    pub session_idle_timeout: Duration,
    /// Drafts are kept in memory when unset.
    pub draft_dir: Option<PathBuf>,
}

impl WizardConfig {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            autosave_interval: self.autosave_interval,
            upload_tick: self.upload_tick,
        }
    }
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            upload_tick: DEFAULT_UPLOAD_TICK,
            submit_latency: DEFAULT_SUBMIT_LATENCY,
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
            draft_dir: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDuration { key: &'static str, value: String },
    InvalidLogFormat { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDuration { key, value } => {
                write!(f, "{key} must be a positive integer (got '{value}')")
            }
            ConfigError::InvalidLogFormat { value } => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json' (got '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDuration { .. }
            | ConfigError::InvalidLogFormat { .. } => None,
        }
    }
}
