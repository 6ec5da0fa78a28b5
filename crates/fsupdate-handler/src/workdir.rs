//! Sentinel work directory.
//!
//! The agent and the external control client rendezvous through files
//! in a shared directory (default `/tmp/adu/.work`). The agent writes
//! metadata (`update_version`, `update_type`, `update_size`,
//! `update_location`) and the install outcome (`errorState`); the
//! control client grants permissions by creating `downloadUpdate`,
//! `installUpdate` and `applyUpdate`. Existence is the signal; content
//! of the permission files is ignored. No locks are used; each name
//! has exactly one writer.
//!
//! Waiting for a permission sentinel polls at the configured interval.
//! With no deadline configured the wait is unbounded and a missing
//! control client hangs the calling phase indefinitely; deployments
//! that cannot tolerate that must set `poll_timeout_secs`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// Metadata sentinels, written by the agent during Download.
pub const UPDATE_VERSION: &str = "update_version";
pub const UPDATE_TYPE: &str = "update_type";
pub const UPDATE_SIZE: &str = "update_size";
pub const UPDATE_LOCATION: &str = "update_location";

// Permission sentinels, created by the control client.
pub const DOWNLOAD_UPDATE: &str = "downloadUpdate";
pub const INSTALL_UPDATE: &str = "installUpdate";
pub const APPLY_UPDATE: &str = "applyUpdate";

// Status sentinel, written by the agent at the end of Install.
pub const ERROR_STATE: &str = "errorState";

/// Mode of agent-written sentinel files.
const SENTINEL_MODE: u32 = 0o644;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timed out after {0:?} waiting for sentinel '{1}'")]
    TimedOut(Duration, String),
}

/// Handle on the shared work directory.
#[derive(Debug, Clone)]
pub struct Workdir {
    path: PathBuf,
    mode: u32,
    poll_interval: Duration,
    poll_timeout: Option<Duration>,
}

impl Workdir {
    pub fn new(
        path: PathBuf,
        mode: u32,
        poll_interval: Duration,
        poll_timeout: Option<Duration>,
    ) -> Self {
        Self { path, mode, poll_interval, poll_timeout }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wipe and recreate the directory.
    ///
    /// Stale sentinels from a previous update attempt must not leak
    /// into the new one, so the directory is always rebuilt from empty.
    /// The mode bits let the control-client user create its permission
    /// files inside.
    pub fn reset(&self) -> std::io::Result<()> {
        if self.path.exists() {
            debug!("Work dir {} exists, removing", self.path.display());
            std::fs::remove_dir_all(&self.path)?;
        }
        std::fs::create_dir_all(&self.path)?;
        set_mode(&self.path, self.mode)?;
        debug!("Work dir {} created", self.path.display());
        Ok(())
    }

    /// Create-or-truncate a sentinel and write `content`.
    pub fn write_sentinel(&self, name: &str, content: &[u8]) -> std::io::Result<()> {
        let path = self.path.join(name);
        let mut file = std::fs::File::create(&path)?;
        file.write_all(content)?;
        // Close before the control client can observe the file.
        drop(file);
        set_mode(&path, SENTINEL_MODE)?;
        debug!("Wrote sentinel {}", path.display());
        Ok(())
    }

    pub fn sentinel_exists(&self, name: &str) -> bool {
        self.path.join(name).exists()
    }

    /// Unlink a sentinel; missing is not an error.
    pub fn remove_sentinel(&self, name: &str) {
        let path = self.path.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed sentinel {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }

    /// Block until the control client creates `name`.
    pub fn await_sentinel(&self, name: &str) -> Result<(), WaitError> {
        let started = Instant::now();
        let mut logged = false;
        while !self.sentinel_exists(name) {
            if let Some(timeout) = self.poll_timeout {
                if started.elapsed() >= timeout {
                    warn!("Control client did not create '{}' within {:?}", name, timeout);
                    return Err(WaitError::TimedOut(timeout, name.to_string()));
                }
            }
            if !logged {
                debug!("Waiting for sentinel '{}'", name);
                logged = true;
            }
            std::thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}
