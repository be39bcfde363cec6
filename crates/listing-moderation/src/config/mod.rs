use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;

use crate::moderation::service::ServiceOptions;
use crate::moderation::settings::{ModerationSettings, SettingsError};

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

/// Top-level configuration for the worker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub moderation: ModerationConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            moderation: ModerationConfig::from_env()?,
        })
    }
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

const MAX_REVIEW_DELAY_SECS: u64 = 365 * 24 * 60 * 60;

/// Review timing, media location and tuning overrides for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationConfig {
    pub review_delay_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_batch: usize,
    pub media_root: PathBuf,
    pub settings_path: Option<PathBuf>,
    pub fusion_threshold: Option<f32>,
    pub amplification: Option<f32>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            review_delay_secs: 30,
            sweep_interval_secs: 15,
            sweep_batch: 50,
            media_root: PathBuf::from("./media"),
            settings_path: None,
            fusion_threshold: None,
            amplification: None,
        }
    }
}

impl ModerationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            review_delay_secs: parse_var("MODERATION_REVIEW_DELAY_SECS")?
                .unwrap_or(defaults.review_delay_secs),
            sweep_interval_secs: parse_var("MODERATION_SWEEP_INTERVAL_SECS")?
                .unwrap_or(defaults.sweep_interval_secs),
            sweep_batch: parse_var("MODERATION_SWEEP_BATCH")?.unwrap_or(defaults.sweep_batch),
            media_root: env::var("MODERATION_MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            settings_path: env::var("MODERATION_SETTINGS_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
            fusion_threshold: parse_var("MODERATION_FUSION_THRESHOLD")?,
            amplification: parse_var("MODERATION_AMPLIFICATION")?,
        })
    }

    /// Loads the settings file when one is configured, applies the environment
    /// overrides and validates the result.
    pub fn settings(&self) -> Result<ModerationSettings, ConfigError> {
        let mut settings = match &self.settings_path {
            Some(path) => ModerationSettings::load(path)?,
            None => ModerationSettings::default(),
        };
        if let Some(threshold) = self.fusion_threshold {
            settings.fusion.threshold = threshold;
        }
        if let Some(amplification) = self.amplification {
            settings.fusion.amplification = amplification;
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn service_options(&self) -> ServiceOptions {
        // Capped at one year.
        let delay_secs = self.review_delay_secs.min(MAX_REVIEW_DELAY_SECS) as i64;
        ServiceOptions {
            review_delay: Duration::seconds(delay_secs),
            sweep_batch: self.sweep_batch,
        }
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                variable: name,
                value: raw,
            }),
        _ => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { variable: &'static str, value: String },
    Settings(SettingsError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { variable, value } => {
                write!(f, "{variable} has an invalid value '{value}'")
            }
            ConfigError::Settings(err) => write!(f, "moderation settings rejected: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::Settings(err) => Some(err),
        }
    }
}

impl From<SettingsError> for ConfigError {
    fn from(value: SettingsError) -> Self {
        Self::Settings(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::fusion::FusionConfigError;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "MODERATION_REVIEW_DELAY_SECS",
            "MODERATION_SWEEP_INTERVAL_SECS",
            "MODERATION_SWEEP_BATCH",
            "MODERATION_MEDIA_ROOT",
            "MODERATION_SETTINGS_PATH",
            "MODERATION_FUSION_THRESHOLD",
            "MODERATION_AMPLIFICATION",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.moderation, ModerationConfig::default());

        let options = config.moderation.service_options();
        assert_eq!(options.review_delay, Duration::seconds(30));
        assert_eq!(options.sweep_batch, 50);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn reads_moderation_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MODERATION_REVIEW_DELAY_SECS", "5");
        env::set_var("MODERATION_SWEEP_BATCH", "10");
        env::set_var("MODERATION_FUSION_THRESHOLD", "0.55");
        let config = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(config.moderation.review_delay_secs, 5);
        assert_eq!(config.moderation.sweep_batch, 10);
        let settings = config.moderation.settings().expect("settings resolve");
        assert_eq!(settings.fusion.threshold, 0.55);
        assert_eq!(settings.fusion.amplification, 1.3);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MODERATION_SWEEP_BATCH", "lots");
        let result = AppConfig::load();
        reset_env();

        match result {
            Err(ConfigError::InvalidValue { variable, value }) => {
                assert_eq!(variable, "MODERATION_SWEEP_BATCH");
                assert_eq!(value, "lots");
            }
            other => panic!("expected invalid value error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_threshold_override() {
        let config = ModerationConfig {
            fusion_threshold: Some(1.5),
            ..ModerationConfig::default()
        };
        assert!(matches!(
            config.settings(),
            Err(ConfigError::Settings(SettingsError::Fusion(
                FusionConfigError::ThresholdOutOfRange(_)
            )))
        ));
    }
}
