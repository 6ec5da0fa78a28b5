//! Handler configuration.
//!
//! Loads settings from /etc/adu/fsupdate-handler.toml or uses defaults.
//! The work directory can additionally be overridden through the
//! `TEMP_ADU_WORK_DIR` environment variable and the trampoline path
//! through `ADU_SHELL_PATH`, so packaging can relocate both without a
//! config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::shell;

/// Config file path.
pub const CONFIG_PATH: &str = "/etc/adu/fsupdate-handler.toml";

/// Environment override for the sentinel work directory.
pub const WORK_DIR_ENV: &str = "TEMP_ADU_WORK_DIR";

/// Environment override for the adu-shell path.
pub const ADU_SHELL_ENV: &str = "ADU_SHELL_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Directory holding the rendezvous sentinels shared with the
    /// control client.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Mode bits of the work directory. The control client runs as a
    /// different user and must be able to create permission sentinels.
    #[serde(default = "default_work_dir_mode")]
    pub work_dir_mode: u32,

    /// Path to the setuid adu-shell trampoline.
    #[serde(default = "default_adu_shell_path")]
    pub adu_shell_path: PathBuf,

    /// Sleep between sentinel existence checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on any single sentinel wait. Absent means the wait
    /// is unbounded: a control client that never arrives will hang the
    /// calling phase forever. Set this unless strict compatibility with
    /// the unbounded behavior is required.
    #[serde(default)]
    pub poll_timeout_secs: Option<u64>,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("/tmp/adu/.work")
}

fn default_work_dir_mode() -> u32 {
    0o777
}

fn default_adu_shell_path() -> PathBuf {
    PathBuf::from(shell::ADU_SHELL_PATH)
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            work_dir_mode: default_work_dir_mode(),
            adu_shell_path: default_adu_shell_path(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_secs: None,
        }
    }
}

impl HandlerConfig {
    /// Load from the default config path, falling back to defaults.
    /// Environment overrides apply last.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    /// Load from an explicit path, falling back to defaults on a
    /// missing or malformed file. Environment overrides apply last.
    pub fn load_from(path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    info!("Loaded handler config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(WORK_DIR_ENV) {
            if !dir.is_empty() {
                self.work_dir = PathBuf::from(dir);
            }
        }
        if let Ok(path) = std::env::var(ADU_SHELL_ENV) {
            if !path.is_empty() {
                self.adu_shell_path = PathBuf::from(path);
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HandlerConfig::default();
        assert_eq!(config.work_dir, PathBuf::from("/tmp/adu/.work"));
        assert_eq!(config.work_dir_mode, 0o777);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.poll_timeout(), None);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = HandlerConfig::load_from(Path::new("/nonexistent/handler.toml"));
        assert_eq!(config.adu_shell_path, PathBuf::from(shell::ADU_SHELL_PATH));
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handler.toml");
        std::fs::write(&path, "work_dir = \"/var/adu/.work\"\npoll_timeout_secs = 30\n").unwrap();

        let config = HandlerConfig::load_from(&path);
        assert_eq!(config.work_dir, PathBuf::from("/var/adu/.work"));
        assert_eq!(config.poll_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn test_load_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handler.toml");
        std::fs::write(&path, "work_dir = [not toml").unwrap();

        let config = HandlerConfig::load_from(&path);
        assert_eq!(config.work_dir, PathBuf::from("/tmp/adu/.work"));
    }
}
