//! Compiled-in exit-code domains of the `fs-updater` utility.
//!
//! The updater reports state through process exit codes; each action has
//! its own small-integer domain. The values here must match the updater
//! build installed on the device. An integer outside a domain is never
//! silently matched: conversions are fallible and the caller decides how
//! fatal an unrecognized code is.

use serde::{Deserialize, Serialize};

/// Device position in the A/B + commit state machine, reported by
/// `--update_reboot_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebootState {
    NoUpdateRebootPending,
    UpdateRebootPending,
    IncompleteFwUpdate,
    IncompleteAppUpdate,
    IncompleteAppFwUpdate,
    RollbackFwRebootPending,
    RollbackAppRebootPending,
    FailedFwUpdate,
    FailedAppUpdate,
    FwUpdateRebootFailed,
}

impl RebootState {
    pub fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::NoUpdateRebootPending),
            1 => Some(Self::UpdateRebootPending),
            2 => Some(Self::IncompleteFwUpdate),
            3 => Some(Self::IncompleteAppUpdate),
            4 => Some(Self::IncompleteAppFwUpdate),
            5 => Some(Self::RollbackFwRebootPending),
            6 => Some(Self::RollbackAppRebootPending),
            7 => Some(Self::FailedFwUpdate),
            8 => Some(Self::FailedAppUpdate),
            9 => Some(Self::FwUpdateRebootFailed),
            _ => None,
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::NoUpdateRebootPending => 0,
            Self::UpdateRebootPending => 1,
            Self::IncompleteFwUpdate => 2,
            Self::IncompleteAppUpdate => 3,
            Self::IncompleteAppFwUpdate => 4,
            Self::RollbackFwRebootPending => 5,
            Self::RollbackAppRebootPending => 6,
            Self::FailedFwUpdate => 7,
            Self::FailedAppUpdate => 8,
            Self::FwUpdateRebootFailed => 9,
        }
    }
}

impl std::fmt::Display for RebootState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoUpdateRebootPending => "no update reboot pending",
            Self::UpdateRebootPending => "update reboot pending",
            Self::IncompleteFwUpdate => "incomplete firmware update",
            Self::IncompleteAppUpdate => "incomplete application update",
            Self::IncompleteAppFwUpdate => "incomplete application and firmware update",
            Self::RollbackFwRebootPending => "firmware rollback reboot pending",
            Self::RollbackAppRebootPending => "application rollback reboot pending",
            Self::FailedFwUpdate => "failed firmware update",
            Self::FailedAppUpdate => "failed application update",
            Self::FwUpdateRebootFailed => "firmware update reboot failed",
        };
        write!(f, "{}", name)
    }
}

/// Exit codes of the install action. The updater reports one success
/// code regardless of the flavour (firmware, application or both) being
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    UpdateSuccessful,
    UpdateNotNeeded,
    UpdateFailed,
    UpdateSystemError,
    InternalError,
}

impl InstallState {
    pub fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::UpdateSuccessful),
            1 => Some(Self::UpdateNotNeeded),
            2 => Some(Self::UpdateFailed),
            3 => Some(Self::UpdateSystemError),
            5 => Some(Self::InternalError),
            _ => None,
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::UpdateSuccessful => 0,
            Self::UpdateNotNeeded => 1,
            Self::UpdateFailed => 2,
            Self::UpdateSystemError => 3,
            Self::InternalError => 5,
        }
    }
}

/// Exit codes of `--commit_update`.
///
/// `UpdateNotNeeded` is dispatched from the same probe result as the
/// reboot states during Apply, so it must stay outside the 0..=9 range
/// of [`RebootState`]. `CommitSuccessful` shares the zero value with
/// `NoUpdateRebootPending`: Cancel's post-reboot branch interprets the
/// commit exit code in the reboot-state domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    CommitSuccessful,
    UpdateNotNeeded,
    CommitFailed,
}

impl CommitState {
    pub fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::CommitSuccessful),
            10 => Some(Self::UpdateNotNeeded),
            11 => Some(Self::CommitFailed),
            _ => None,
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::CommitSuccessful => 0,
            Self::UpdateNotNeeded => 10,
            Self::CommitFailed => 11,
        }
    }
}

/// Exit codes of the cancel (rollback) action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackState {
    RollbackSuccessful,
    RollbackFailed,
    InternalError,
}

impl RollbackState {
    pub fn from_exit_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::RollbackSuccessful),
            1 => Some(Self::RollbackFailed),
            2 => Some(Self::InternalError),
            _ => None,
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::RollbackSuccessful => 0,
            Self::RollbackFailed => 1,
            Self::InternalError => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reboot_state_round_trip() {
        for code in 0..=9 {
            let state = RebootState::from_exit_code(code).unwrap();
            assert_eq!(state.exit_code(), code);
        }
    }

    #[test]
    fn test_reboot_state_unknown_code() {
        assert_eq!(RebootState::from_exit_code(10), None);
        assert_eq!(RebootState::from_exit_code(-1), None);
        assert_eq!(RebootState::from_exit_code(255), None);
    }

    #[test]
    fn test_commit_not_needed_outside_reboot_domain() {
        // Apply dispatches commit and reboot codes from one probe.
        let code = CommitState::UpdateNotNeeded.exit_code();
        assert_eq!(RebootState::from_exit_code(code), None);
    }

    #[test]
    fn test_commit_success_aliases_no_reboot_pending() {
        // Cancel's post-reboot branch reads the commit exit code as a
        // reboot state.
        assert_eq!(
            CommitState::CommitSuccessful.exit_code(),
            RebootState::NoUpdateRebootPending.exit_code()
        );
    }

    #[test]
    fn test_install_state_codes() {
        assert_eq!(InstallState::from_exit_code(0), Some(InstallState::UpdateSuccessful));
        assert_eq!(InstallState::from_exit_code(5), Some(InstallState::InternalError));
        assert_eq!(InstallState::from_exit_code(4), None);
    }

    #[test]
    fn test_rollback_state_codes() {
        assert_eq!(RollbackState::from_exit_code(0), Some(RollbackState::RollbackSuccessful));
        assert_eq!(RollbackState::from_exit_code(1), Some(RollbackState::RollbackFailed));
        assert_eq!(RollbackState::from_exit_code(7), None);
    }
}
