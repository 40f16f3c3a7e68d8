//! Logging setup for keel.
//!
//! The engine logs through `tracing` macros only; installing a subscriber is the
//! host's choice. With the `tracing-subscriber` feature, [`init`] installs one
//! driven by environment variables:
//!
//! - `KEEL_DEBUG=true|1|yes` - enable debug logging
//! - `KEEL_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `KEEL_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! use keel_migrate::logging;
//!
//! logging::init();
//! ```

use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Once;

use serde::{Deserialize, Serialize};

static INIT: Once = Once::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Canonical level name, or `None` when unrecognized.
pub fn parse_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

/// Whether `KEEL_DEBUG` asks for debug logging.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("KEEL_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Level from `KEEL_LOG_LEVEL`, falling back to `debug` under `KEEL_DEBUG`, else `warn`.
pub fn get_log_level() -> &'static str {
    env::var("KEEL_LOG_LEVEL")
        .ok()
        .and_then(|level| parse_level(&level))
        .unwrap_or(if is_debug_enabled() { "debug" } else { "warn" })
}

/// Format from `KEEL_LOG_FORMAT`, json by default.
pub fn get_log_format() -> LogFormat {
    env::var("KEEL_LOG_FORMAT")
        .ok()
        .and_then(|f| f.parse().ok())
        .unwrap_or_default()
}

/// Install the subscriber from environment variables.
///
/// Does nothing unless `KEEL_DEBUG` or `KEEL_LOG_LEVEL` is set. Only the first
/// initialization in a process takes effect.
pub fn init() {
    if !is_debug_enabled() && env::var("KEEL_LOG_LEVEL").is_err() {
        return;
    }
    init_with(get_log_level(), get_log_format());
}

/// Install the subscriber at `level`, with the format from `KEEL_LOG_FORMAT`.
pub fn init_with_level(level: &str) {
    init_with(level, get_log_format());
}

/// Install the subscriber with an explicit level and format.
pub fn init_with(level: &str, format: LogFormat) {
    let level = parse_level(level).unwrap_or("warn");
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!(
                "keel={},keel_migrate={},keel_sqlite={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level = level, format = %format, "keel logging initialized");
            }
        }

        #[cfg(not(feature = "tracing-subscriber"))]
        {
            let _ = (level, format);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some("debug"));
        assert_eq!(parse_level(" warning "), Some("warn"));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_log_format() {
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::default(), LogFormat::Json);
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }
}
