//! Updater state probes.
//!
//! Read-only queries against the updater, all routed through the
//! adu-shell execute action:
//! `adu-shell --update_type fus/update --update_action execute
//! --target_options <opt>`. The reboot state and the commit outcome
//! arrive as the exit code; the version probes answer on stdout.

use std::path::{Path, PathBuf};
use tracing::{debug, error};

use fsupdate_common::states::RebootState;
use fsupdate_common::shell;

use crate::process::{run_child, SpawnError};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// The updater answered with an exit code outside the reboot-state
    /// domain.
    #[error("unrecognized updater state code {0}")]
    UnrecognizedState(i32),
    /// A version probe exited non-zero.
    #[error("version probe failed with exit code {0}")]
    ProbeFailed(i32),
    /// A version probe exited zero but produced no version string.
    #[error("version probe produced no output (exit code {0})")]
    EmptyOutput(i32),
}

/// Probe interface to the updater, via the adu-shell trampoline.
#[derive(Debug, Clone)]
pub struct StateProbe {
    shell: PathBuf,
}

impl StateProbe {
    pub fn new(shell: PathBuf) -> Self {
        Self { shell }
    }

    fn execute(&self, target_option: &str) -> Result<(i32, String), SpawnError> {
        let args = [
            shell::UPDATE_TYPE_OPT,
            shell::UPDATE_TYPE_FUS_UPDATE,
            shell::UPDATE_ACTION_OPT,
            shell::UPDATE_ACTION_EXECUTE,
            shell::TARGET_OPTIONS_OPT,
            target_option,
        ];
        let child = run_child(&self.shell, &args)?;
        Ok((child.exit_code, child.output))
    }

    /// Current position in the A/B + commit state machine.
    pub fn reboot_state(&self) -> Result<RebootState, ProbeError> {
        let (code, _) = self.execute(shell::OPTION_UPDATE_REBOOT_STATE)?;
        match RebootState::from_exit_code(code) {
            Some(state) => {
                debug!("Updater reboot state: {} ({})", state, code);
                Ok(state)
            }
            None => {
                error!("Updater reported unrecognized state code {}", code);
                Err(ProbeError::UnrecognizedState(code))
            }
        }
    }

    pub fn firmware_version(&self) -> Result<String, ProbeError> {
        self.version(shell::OPTION_FIRMWARE_VERSION)
    }

    pub fn application_version(&self) -> Result<String, ProbeError> {
        self.version(shell::OPTION_APPLICATION_VERSION)
    }

    /// Run a version probe and clean its answer.
    fn version(&self, flag: &str) -> Result<String, ProbeError> {
        let (code, output) = self.execute(flag)?;
        if code != 0 {
            error!("Version probe {} failed, exit code {}", flag, code);
            return Err(ProbeError::ProbeFailed(code));
        }
        let version = extract_flag_value(&output, flag);
        if version.is_empty() {
            error!("Version probe {} produced no output", flag);
            return Err(ProbeError::EmptyOutput(code));
        }
        Ok(version)
    }

    /// Commit a pending update; the exit code is interpreted by the
    /// caller in the commit domain.
    pub fn commit_update(&self) -> Result<i32, SpawnError> {
        debug!("Committing pending update state");
        let (code, _) = self.execute(shell::OPTION_COMMIT_UPDATE)?;
        Ok(code)
    }

    pub fn shell_path(&self) -> &Path {
        &self.shell
    }
}

/// Clean a version probe answer.
///
/// The trampoline's combined output may echo the probe flag back
/// (`--firmware_version 1.2.3`); in that form the token after the flag
/// is the version. Line wraps and tabs are stripped either way.
fn extract_flag_value(output: &str, flag: &str) -> String {
    let cleaned: String = output.chars().filter(|c| *c != '\n' && *c != '\t').collect();
    match cleaned.find(flag) {
        Some(pos) => {
            let rest = cleaned[pos + flag.len()..].trim_start_matches(' ');
            let end = rest.find(' ').unwrap_or(rest.len());
            rest[..end].to_string()
        }
        None => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Drop a fake adu-shell script into `dir` and return its path.
    fn fake_shell(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("adu-shell");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_extract_flag_value_plain() {
        assert_eq!(extract_flag_value("1.2.3\n", "--firmware_version"), "1.2.3");
        assert_eq!(extract_flag_value("\t2.0\n", "--application_version"), "2.0");
    }

    #[test]
    fn test_extract_flag_value_echoed_form() {
        assert_eq!(
            extract_flag_value("running --firmware_version 1.2.3 done", "--firmware_version"),
            "1.2.3"
        );
        assert_eq!(
            extract_flag_value("--application_version  4.5.6\n", "--application_version"),
            "4.5.6"
        );
    }

    #[test]
    fn test_extract_flag_value_empty() {
        assert_eq!(extract_flag_value("\n\t", "--firmware_version"), "");
    }

    #[test]
    fn test_reboot_state_known_code() {
        let tmp = tempfile::tempdir().unwrap();
        let shell = fake_shell(tmp.path(), "exit 1");
        let probe = StateProbe::new(shell);
        assert_eq!(probe.reboot_state().unwrap(), RebootState::UpdateRebootPending);
    }

    #[test]
    fn test_reboot_state_unknown_code() {
        let tmp = tempfile::tempdir().unwrap();
        let shell = fake_shell(tmp.path(), "exit 42");
        let probe = StateProbe::new(shell);
        assert!(matches!(probe.reboot_state(), Err(ProbeError::UnrecognizedState(42))));
    }

    #[test]
    fn test_version_probe_success() {
        let tmp = tempfile::tempdir().unwrap();
        let shell = fake_shell(tmp.path(), "echo '--firmware_version 1.2.3'");
        let probe = StateProbe::new(shell);
        assert_eq!(probe.firmware_version().unwrap(), "1.2.3");
    }

    #[test]
    fn test_version_probe_nonzero_exit() {
        let tmp = tempfile::tempdir().unwrap();
        let shell = fake_shell(tmp.path(), "exit 3");
        let probe = StateProbe::new(shell);
        assert!(matches!(probe.firmware_version(), Err(ProbeError::ProbeFailed(3))));
    }

    #[test]
    fn test_version_probe_empty_output() {
        let tmp = tempfile::tempdir().unwrap();
        let shell = fake_shell(tmp.path(), "exit 0");
        let probe = StateProbe::new(shell);
        assert!(matches!(probe.application_version(), Err(ProbeError::EmptyOutput(0))));
    }

    #[test]
    fn test_commit_update_returns_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let shell = fake_shell(tmp.path(), "exit 10");
        let probe = StateProbe::new(shell);
        assert_eq!(probe.commit_update().unwrap(), 10);
    }
}
