//! Structured logging setup.
//!
//! Every run writes a fresh plain-text log file with the full diagnostic
//! trace (match attempts, fallback steps, failures). Warnings and errors are
//! echoed to stderr. `RUST_LOG` overrides the configured level when set.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level written to the log file
    pub level: Level,

    /// Log file, truncated at start of run. `None` logs to stderr only.
    pub log_file: Option<PathBuf>,

    /// Minimum level echoed to stderr
    pub console_level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_file: None,
            console_level: Level::WARN,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_console_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }
}

/// Parses a log level from a string, defaulting to INFO.
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Initializes the global subscriber. Subsequent calls are ignored.
///
/// # Errors
///
/// Returns the I/O error if the log file cannot be created.
pub fn init_logging(config: LoggingConfig) -> std::io::Result<()> {
    let file = match &config.log_file {
        Some(path) => Some(create_log_file(path)?),
        None => None,
    };

    INIT.call_once(|| {
        let filter = if env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(format!("recipe_provenance={}", config.level))
        };

        let file_layer = file.map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file))
        });

        let console_layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(LevelFilter::from_level(config.console_level));

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    });

    Ok(())
}

fn create_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("Warn"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_invalid() {
        assert_eq!(parse_level("loud"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.console_level, Level::WARN);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::with_level(Level::DEBUG)
            .with_log_file("run.log")
            .with_console_level(Level::ERROR);
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.log_file, Some(PathBuf::from("run.log")));
        assert_eq!(config.console_level, Level::ERROR);
    }

    #[test]
    fn test_create_log_file_truncates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs/run.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "previous run").unwrap();

        create_log_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
