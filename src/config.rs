//! Run configuration.
//!
//! Settings come from the command line, with a few environment overrides:
//! - `RECIPE_PROVENANCE_LOG_LEVEL`: Logging level - default: "info"
//! - `RECIPE_PROVENANCE_JOBS`: Packages processed concurrently - default: "4"
//!
//! Path problems are configuration errors: they are reported before any
//! processing starts.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::harvest::resolver::TagFallback;

pub const DEFAULT_OUTPUT_PATH: &str = "final_output.json";
pub const DEFAULT_LOG_PATH: &str = "recipe_provenance.log";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_JOBS: usize = 4;
pub const DEFAULT_CLONE_TIMEOUT_SECS: u64 = 300;

pub const ENV_LOG_LEVEL: &str = "RECIPE_PROVENANCE_LOG_LEVEL";
pub const ENV_JOBS: &str = "RECIPE_PROVENANCE_JOBS";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The {description} '{}' does not exist", .path.display())]
    MissingPath {
        description: &'static str,
        path: PathBuf,
    },

    #[error("The {description} '{}' is not a file", .path.display())]
    NotAFile {
        description: &'static str,
        path: PathBuf,
    },

    #[error("The {description} '{}' is not a directory", .path.display())]
    NotADirectory {
        description: &'static str,
        path: PathBuf,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Build manifest (`pn-buildlist`)
    pub manifest_path: PathBuf,

    /// Root of the recipe layers
    pub layers_path: PathBuf,

    pub output_path: PathBuf,

    /// Packages processed concurrently
    pub jobs: usize,

    /// Limit for each clone/checkout/describe
    pub clone_timeout: Duration,

    pub tag_fallback: TagFallback,

    /// Leave clone directories on disk after use
    pub keep_workdirs: bool,
}

impl RunConfig {
    pub fn new(manifest_path: impl Into<PathBuf>, layers_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            layers_path: layers_path.into(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            jobs: DEFAULT_JOBS,
            clone_timeout: Duration::from_secs(DEFAULT_CLONE_TIMEOUT_SECS),
            tag_fallback: TagFallback::default(),
            keep_workdirs: false,
        }
    }

    /// Applies environment overrides for settings not given explicitly.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(raw) = env::var(ENV_JOBS) {
            self.jobs = parse_jobs(&raw)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_file(&self.manifest_path, "manifest path")?;
        validate_dir(&self.layers_path, "recipe layers path")?;

        if self.jobs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "jobs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.clone_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "clone timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Log level from `RECIPE_PROVENANCE_LOG_LEVEL`, falling back to the default.
pub fn log_level_from_env() -> String {
    env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
}

fn parse_jobs(raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::InvalidValue {
            field: "jobs",
            reason: format!("'{}': {}", raw, e),
        })
}

fn validate_file(path: &Path, description: &'static str) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingPath {
            description,
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(ConfigError::NotAFile {
            description,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn validate_dir(path: &Path, description: &'static str) -> Result<(), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingPath {
            description,
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory {
            description,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("pn-buildlist");
        std::fs::write(&manifest, "mc:rcrip2-0:foo\n").unwrap();
        (dir, manifest)
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::new("pn-buildlist", "layers");
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert_eq!(config.jobs, DEFAULT_JOBS);
        assert_eq!(config.clone_timeout, Duration::from_secs(300));
        assert_eq!(config.tag_fallback, TagFallback::RevisionLabel);
        assert!(!config.keep_workdirs);
    }

    #[test]
    fn test_valid_paths() {
        let (dir, manifest) = fixture();
        let config = RunConfig::new(&manifest, dir.path());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::new(dir.path().join("nope"), dir.path());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPath { description: "manifest path", .. })
        ));
    }

    #[test]
    fn test_manifest_must_be_file() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::new(dir.path(), dir.path());
        assert!(matches!(config.validate(), Err(ConfigError::NotAFile { .. })));
    }

    #[test]
    fn test_layers_must_be_directory() {
        let (_dir, manifest) = fixture();
        let config = RunConfig::new(&manifest, &manifest);
        assert!(matches!(config.validate(), Err(ConfigError::NotADirectory { .. })));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let (dir, manifest) = fixture();
        let mut config = RunConfig::new(&manifest, dir.path());
        config.jobs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "jobs", .. })
        ));
    }

    #[test]
    fn test_parse_jobs() {
        assert_eq!(parse_jobs(" 8 ").unwrap(), 8);
        assert!(parse_jobs("many").is_err());
    }
}
