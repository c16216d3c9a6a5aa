//! Supervisor configuration.
//!
//! Loaded from JSON; every field has a default so an empty object (or no file
//! at all) gives the stock daemon behaviour.
//!
//! ```
//! use ocspd_core::config::SupervisorConfig;
//!
//! let cfg: SupervisorConfig = serde_json::from_str(r#"{"trace_dir": "/var/log/ocspd"}"#).unwrap();
//! assert_eq!(cfg.trace_prefix, "ocspd_exception");
//! assert_eq!(cfg.escalation.give_up_at, 7);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::supervise::EscalationPolicy;

/// File name prefix of forensic trace dumps.
pub const DEFAULT_TRACE_PREFIX: &str = "ocspd_exception";

/// Config files tried in order when none is given explicitly. `~` is the
/// user's home directory.
pub const DEFAULT_CONFIG_FILE_LOCATIONS: [&str; 2] =
    ["~/.ocspd.conf.json", "/etc/ocspd/ocspd.conf.json"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Where forensic traces are written. `None` = current working directory.
    pub trace_dir: Option<PathBuf>,

    pub trace_prefix: String,

    /// Backoff for repeated resource-access failures.
    pub escalation: EscalationPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            trace_dir: None,
            trace_prefix: DEFAULT_TRACE_PREFIX.to_string(),
            escalation: EscalationPolicy::default(),
        }
    }
}

impl SupervisorConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the first existing file from [`DEFAULT_CONFIG_FILE_LOCATIONS`],
    /// or defaults when none exists.
    pub fn discover() -> Result<Self, ConfigError> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        for location in DEFAULT_CONFIG_FILE_LOCATIONS {
            let path = match (location.strip_prefix("~/"), &home) {
                (Some(rest), Some(home)) => home.join(rest),
                (Some(_), None) => continue,
                (None, _) => PathBuf::from(location),
            };
            if path.is_file() {
                return Self::from_json_file(path);
            }
        }
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ocspd-config-{}.json", ulid::Ulid::new()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn empty_object_gives_defaults() {
        let path = scratch_file("{}");
        let cfg = SupervisorConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg, SupervisorConfig::default());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn nested_escalation_overrides() {
        let path = scratch_file(
            r#"{"trace_dir": "/tmp/traces", "escalation": {"short_step_secs": 5}}"#,
        );
        let cfg = SupervisorConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.trace_dir, Some(PathBuf::from("/tmp/traces")));
        assert_eq!(cfg.escalation.short_step_secs, 5);
        assert_eq!(cfg.escalation.long_step_secs, 3600);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = scratch_file("{ nope");
        let err = SupervisorConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = SupervisorConfig::from_json_file("/nonexistent/ocspd.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
