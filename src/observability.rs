//! Shared logging configuration and initialization.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    logging_config_from(|key| env::var(key).ok())
}

/// Resolves `GLYCO_LOG_LEVEL`, `GLYCO_LOG_FORMAT` and `GLYCO_LOG_TARGET`
/// through the given lookup; unset or unparseable values keep the defaults.
fn logging_config_from(lookup: impl Fn(&str) -> Option<String>) -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Some(level) = lookup("GLYCO_LOG_LEVEL") {
        let trimmed = level.trim();
        if !trimmed.is_empty() {
            config.level = trimmed.to_string();
        }
    }

    if let Some(format) = lookup("GLYCO_LOG_FORMAT").as_deref().and_then(parse_log_format) {
        config.format = format;
    }

    if let Some(target) = lookup("GLYCO_LOG_TARGET").as_deref().and_then(parse_bool) {
        config.include_target = target;
    }

    config
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(config: &LoggingConfig) {
    info!(
        component = "api_server",
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    info!(
        component = "api_server",
        event = "app.bind",
        bind_addr = %bound_addr,
        routes = "/predict,/estimate-a1c"
    );
}

/// Records which predictor implementation serves a model slot and where it
/// came from (artifact path or builtin default).
pub fn log_model_loaded(kind: &str, source: &str, path: Option<&str>) {
    match path {
        Some(path) => info!(
            component = "api_server",
            event = "model.selected",
            kind,
            source,
            path
        ),
        None => info!(
            component = "api_server",
            event = "model.selected",
            kind,
            source
        ),
    }
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = logging_config_from(lookup(&[]));
        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn parses_level_format_and_target() {
        let cfg = logging_config_from(lookup(&[
            ("GLYCO_LOG_LEVEL", "debug"),
            ("GLYCO_LOG_FORMAT", "json"),
            ("GLYCO_LOG_TARGET", "false"),
        ]));

        assert_eq!(cfg.level, "debug");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);
    }

    #[test]
    fn unparseable_format_or_target_keeps_defaults() {
        let cfg = logging_config_from(lookup(&[
            ("GLYCO_LOG_LEVEL", "trace"),
            ("GLYCO_LOG_FORMAT", "yaml"),
            ("GLYCO_LOG_TARGET", "maybe"),
        ]));

        assert_eq!(cfg.level, "trace");
        assert_eq!(cfg.format, LogFormat::Pretty);
        assert!(cfg.include_target);
    }
}
