//! Configuration management for runvault.
//!
//! Configuration can be set via environment variables:
//! - `RUNVAULT_SESSION_DIR` - Optional. Session root directory. Defaults to `.runvault`
//!   in the current directory. Relative values resolve against the current directory.
//! - `RUNVAULT_KEEP_ON_DROP` - Optional. When truthy, a session dropped without `close()`
//!   leaves its directory tree in place for inspection. Defaults to `false`.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory name used when `RUNVAULT_SESSION_DIR` is not set.
pub const DEFAULT_SESSION_DIR: &str = ".runvault";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Could not determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute path of the session root
    pub session_root: PathBuf,

    /// Skip the drop-guard cleanup (explicit `close()` still removes the tree)
    pub keep_on_drop: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `RUNVAULT_SESSION_DIR` is set but blank,
    /// and `ConfigError::CurrentDir` if a relative root cannot be made absolute.
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_root = match std::env::var("RUNVAULT_SESSION_DIR") {
            Ok(value) if value.trim().is_empty() => {
                return Err(ConfigError::InvalidValue(
                    "RUNVAULT_SESSION_DIR".to_string(),
                    "must not be empty".to_string(),
                ));
            }
            Ok(value) => PathBuf::from(value.trim()),
            Err(_) => PathBuf::from(DEFAULT_SESSION_DIR),
        };

        let keep_on_drop = env_var_bool("RUNVAULT_KEEP_ON_DROP", false);

        Ok(Self {
            session_root: absolutize(&session_root)?,
            keep_on_drop,
        })
    }

    /// Create a config rooted at `session_root` (useful for testing and embedding).
    pub fn new(session_root: impl Into<PathBuf>) -> Self {
        Self {
            session_root: session_root.into(),
            keep_on_drop: false,
        }
    }
}

/// Make `path` absolute against the current directory without touching the filesystem.
pub fn absolutize(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
    Ok(cwd.join(path))
}

/// Parse an environment variable as a boolean, returning `default` if unset.
///
/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`;
/// everything else maps to `false`.
pub fn env_var_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        Err(_) => default,
    }
}
