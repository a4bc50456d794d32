//! Logging initialization.

use std::{env, str::FromStr};

/// Filter used when `RUST_LOG` is unset: authentication decisions at debug,
/// everything else at info.
pub const DEFAULT_FILTER: &str = "info,access_token=debug,access_token_axum=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Text,
        })
    }
}

impl LogFormat {
    /// Read `LOG_FORMAT`.
    pub fn from_env() -> Self {
        env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

/// Install a global subscriber. Does nothing if one is already set.
#[cfg(feature = "tracing")]
pub fn init_logging(format: LogFormat, filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = match format {
        LogFormat::Text => fmt().with_env_filter(env_filter).try_init(),
        LogFormat::Compact => fmt().compact().with_env_filter(env_filter).try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(env_filter)
            .try_init(),
    };
}

/// Install a global subscriber using `LOG_FORMAT` and `RUST_LOG`, falling back
/// to [`DEFAULT_FILTER`].
#[cfg(feature = "tracing")]
pub fn init_logging_from_env() {
    init_logging(LogFormat::from_env(), DEFAULT_FILTER);
}
