//! Layer configuration and loading.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use access_token::StrategyConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

#[cfg(feature = "tracing")]
use crate::logging::{init_logging, LogFormat, DEFAULT_FILTER};

/// Prefix of environment variables that override file settings,
/// e.g. `ACCESS_TOKEN_VERIFY_TIMEOUT_MS=500` or
/// `ACCESS_TOKEN_STRATEGY__PASS_REQUEST_TO_CALLBACK=true`.
pub const ENV_PREFIX: &str = "ACCESS_TOKEN";

/// Deployment environment. Production hides error details from responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        })
    }
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(environment) => environment,
            Err(never) => match never {},
        }
    }
}

impl Environment {
    /// Read `APP_ENV`, falling back to `RUST_ENV`.
    pub fn from_env() -> Self {
        env::var("APP_ENV")
            .or_else(|_| env::var("RUST_ENV"))
            .map(Self::from)
            .unwrap_or_default()
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Settings for [`AccessTokenLayer::from_config`](crate::AccessTokenLayer::from_config).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub environment: Environment,
    /// Upper bound on token verification; unbounded when unset.
    #[serde(default)]
    pub verify_timeout_ms: Option<u64>,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl AuthConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn verify_timeout(&self) -> Option<Duration> {
        self.verify_timeout_ms.map(Duration::from_millis)
    }
}

impl AsRef<AuthConfig> for AuthConfig {
    fn as_ref(&self) -> &AuthConfig {
        self
    }
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    DotEnv,
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let file_name = path.file_name()?.to_str()?;
        if file_name == ".env" || file_name.starts_with(".env.") {
            return Some(Self::DotEnv);
        }

        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "env" => Some(Self::DotEnv),
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Loads [`AuthConfig`] (or any deserializable settings) from dotenv files, one
/// config file and `ACCESS_TOKEN_*` environment variables, in that order of
/// precedence from lowest to highest.
///
/// # Example
///
/// ```rust,no_run
/// use access_token_axum::AuthConfig;
///
/// let config: AuthConfig = AuthConfig::builder()
///     .with_dotenv()
///     .with_config_file("auth.toml")
///     .build()?;
/// # Ok::<_, access_token_axum::LoadError>(())
/// ```
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    load_default_dotenv: bool,
    config_files: Vec<PathBuf>,
    #[cfg(feature = "tracing")]
    init_logging: bool,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.env` from the current directory.
    pub fn with_dotenv(mut self) -> Self {
        self.load_default_dotenv = true;
        self
    }

    /// Add a config file. Dotenv files are all loaded; of the TOML / YAML /
    /// JSON files the last one wins.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_files.push(path.into());
        self
    }

    /// Initialize logging from `LOG_FORMAT` and `RUST_LOG` once dotenv files
    /// are loaded.
    #[cfg(feature = "tracing")]
    pub fn with_logging_from_env(mut self) -> Self {
        self.init_logging = true;
        self
    }

    pub fn build<C: DeserializeOwned>(self) -> Result<C, LoadError> {
        if self.load_default_dotenv {
            let _ = dotenvy::dotenv();
        }

        let mut main_config_file = None;
        for path in &self.config_files {
            match ConfigFormat::from_path(path) {
                Some(ConfigFormat::DotEnv) => {
                    if path.exists() {
                        let _ = dotenvy::from_path(path);
                    }
                }
                Some(_) => main_config_file = Some(path.as_path()),
                None => tracing::warn!(path = %path.display(), "ignoring config file with unknown format"),
            }
        }

        #[cfg(feature = "tracing")]
        if self.init_logging {
            init_logging(LogFormat::from_env(), DEFAULT_FILTER);
        }

        let mut builder = config::Config::builder();
        if let Some(path) = main_config_file {
            if !path.exists() {
                return Err(LoadError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder
            .add_source(EnvSource)
            .build()
            .and_then(|c| c.try_deserialize::<C>())
            .map_err(|e| LoadError::Parse(e.to_string()))
    }
}

/// `ACCESS_TOKEN_*` variables, plus `APP_ENV` / `RUST_ENV` for `environment`.
#[derive(Debug, Clone)]
struct EnvSource;

impl config::Source for EnvSource {
    fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<config::Map<String, config::Value>, config::ConfigError> {
        use config::{Environment, Value, ValueKind};

        let mut map = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .collect()?;

        if !map.contains_key("environment") {
            if let Ok(val) = env::var("APP_ENV").or_else(|_| env::var("RUST_ENV")) {
                map.insert(
                    "environment".to_string(),
                    Value::new(None, ValueKind::String(val)),
                );
            }
        }

        Ok(map)
    }
}
