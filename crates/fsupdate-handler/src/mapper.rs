//! Result mapping.
//!
//! Pure dispatch tables from updater states to phase decisions. Every
//! function is total over its input domain; the no-match arm is always
//! the calling phase's unknown-state failure, never a success.

use fsupdate_common::result::erc;
use fsupdate_common::states::{CommitState, InstallState, RebootState};
use fsupdate_common::{PhaseResult, ResultCode, UpdateType};

/// Install exit code to phase result.
///
/// Anything but a successful install maps to a failure whose extended
/// code is selected by the update flavour. Combined and unknown
/// flavours report `INSTALL_FAILURE_BAD_FILE_ENTITY`; the code predates
/// the combined flavour and is kept for compatibility with existing
/// control clients.
pub fn map_install_exit(exit_code: i32, update_type: UpdateType) -> PhaseResult {
    if InstallState::from_exit_code(exit_code) == Some(InstallState::UpdateSuccessful) {
        return PhaseResult::ok(ResultCode::InstallSuccess);
    }
    let extended = if update_type.is_firmware() {
        erc::INSTALL_FAILURE_FIRMWARE_UPDATE
    } else if update_type.is_application() {
        erc::INSTALL_FAILURE_APPLICATION_UPDATE
    } else {
        erc::INSTALL_FAILURE_BAD_FILE_ENTITY
    };
    PhaseResult::failure(extended)
}

/// IsInstalled: reboot state once the probed version equals the
/// installed criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMatchDecision {
    /// A/B swap happened but the commit is still outstanding.
    MissingCommit,
    /// Nothing pending; the expected version is live.
    Installed,
    Unknown,
}

pub fn map_version_match_state(state: RebootState) -> VersionMatchDecision {
    match state {
        RebootState::IncompleteAppFwUpdate
        | RebootState::IncompleteAppUpdate
        | RebootState::IncompleteFwUpdate => VersionMatchDecision::MissingCommit,
        RebootState::NoUpdateRebootPending => VersionMatchDecision::Installed,
        _ => VersionMatchDecision::Unknown,
    }
}

/// Same check for the application side of a common-both update. The
/// firmware-only incomplete state is not expected here and stays in the
/// unknown arm.
pub fn map_app_version_match_state(state: RebootState) -> VersionMatchDecision {
    match state {
        RebootState::IncompleteAppUpdate | RebootState::IncompleteAppFwUpdate => {
            VersionMatchDecision::MissingCommit
        }
        RebootState::NoUpdateRebootPending => VersionMatchDecision::Installed,
        _ => VersionMatchDecision::Unknown,
    }
}

/// IsInstalled: reboot state once no probed version matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedVersionDecision {
    /// A previous application update failed; commit it away before
    /// reporting installed.
    CommitPreviousFailedApplication,
    /// Same for a failed firmware update.
    CommitPreviousFailedFirmware,
    /// The reboot into the update failed; the retry path is external.
    Installed,
    NotInstalled,
}

pub fn map_unmatched_version_state(state: RebootState) -> UnmatchedVersionDecision {
    match state {
        RebootState::FailedAppUpdate => UnmatchedVersionDecision::CommitPreviousFailedApplication,
        RebootState::FailedFwUpdate => UnmatchedVersionDecision::CommitPreviousFailedFirmware,
        RebootState::FwUpdateRebootFailed => UnmatchedVersionDecision::Installed,
        _ => UnmatchedVersionDecision::NotInstalled,
    }
}

/// Apply dispatch, over the raw probe exit code: the updater answers
/// this probe from two domains (reboot states plus the commit-domain
/// `UpdateNotNeeded`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyDecision {
    /// Swap armed; wait for the apply permission, then reboot.
    AwaitPermissionThenReboot,
    /// Swap done but uncommitted; wait for the apply permission, then
    /// reboot into the commit path.
    AwaitPermissionIncomplete,
    Success,
    Unknown,
}

pub fn map_apply_code(code: i32) -> ApplyDecision {
    match RebootState::from_exit_code(code) {
        Some(RebootState::UpdateRebootPending) => ApplyDecision::AwaitPermissionThenReboot,
        Some(
            RebootState::IncompleteFwUpdate
            | RebootState::IncompleteAppUpdate
            | RebootState::IncompleteAppFwUpdate,
        ) => ApplyDecision::AwaitPermissionIncomplete,
        Some(RebootState::NoUpdateRebootPending) => ApplyDecision::Success,
        Some(_) => ApplyDecision::Unknown,
        None => match CommitState::from_exit_code(code) {
            Some(CommitState::UpdateNotNeeded) => ApplyDecision::Success,
            _ => ApplyDecision::Unknown,
        },
    }
}

/// Cancel dispatch on the initial reboot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelDecision {
    /// Roll the half-done application update back.
    RollbackApplication,
    /// The rollback reboot already happened; commit the old side.
    CommitRollbackReboot,
    /// Update already applied, nothing left to cancel.
    NothingToCancel,
    NotAllowed,
}

pub fn map_cancel_state(state: RebootState) -> CancelDecision {
    match state {
        RebootState::IncompleteAppUpdate => CancelDecision::RollbackApplication,
        RebootState::RollbackFwRebootPending => CancelDecision::CommitRollbackReboot,
        RebootState::NoUpdateRebootPending => CancelDecision::NothingToCancel,
        _ => CancelDecision::NotAllowed,
    }
}

/// Cancel: reboot state after a successful rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostRollbackDecision {
    RebootRequired,
    Complete,
    NotAllowed,
}

pub fn map_post_rollback_state(state: RebootState) -> PostRollbackDecision {
    match state {
        RebootState::RollbackFwRebootPending => PostRollbackDecision::RebootRequired,
        RebootState::NoUpdateRebootPending => PostRollbackDecision::Complete,
        _ => PostRollbackDecision::NotAllowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_success_for_all_flavours() {
        for t in [
            UpdateType::Firmware,
            UpdateType::Application,
            UpdateType::CommonFirmware,
            UpdateType::CommonApplication,
            UpdateType::CommonBoth,
        ] {
            let result = map_install_exit(0, t);
            assert_eq!(result.code, ResultCode::InstallSuccess);
            assert_eq!(result.extended, 0);
        }
    }

    #[test]
    fn test_install_failure_code_by_flavour() {
        assert_eq!(
            map_install_exit(2, UpdateType::Firmware).extended,
            erc::INSTALL_FAILURE_FIRMWARE_UPDATE
        );
        assert_eq!(
            map_install_exit(2, UpdateType::CommonFirmware).extended,
            erc::INSTALL_FAILURE_FIRMWARE_UPDATE
        );
        assert_eq!(
            map_install_exit(2, UpdateType::Application).extended,
            erc::INSTALL_FAILURE_APPLICATION_UPDATE
        );
        assert_eq!(
            map_install_exit(2, UpdateType::CommonApplication).extended,
            erc::INSTALL_FAILURE_APPLICATION_UPDATE
        );
        assert_eq!(
            map_install_exit(2, UpdateType::CommonBoth).extended,
            erc::INSTALL_FAILURE_BAD_FILE_ENTITY
        );
        assert_eq!(
            map_install_exit(2, UpdateType::Unknown).extended,
            erc::INSTALL_FAILURE_BAD_FILE_ENTITY
        );
    }

    #[test]
    fn test_version_match_dispatch() {
        assert_eq!(
            map_version_match_state(RebootState::IncompleteAppFwUpdate),
            VersionMatchDecision::MissingCommit
        );
        assert_eq!(
            map_version_match_state(RebootState::IncompleteFwUpdate),
            VersionMatchDecision::MissingCommit
        );
        assert_eq!(
            map_version_match_state(RebootState::NoUpdateRebootPending),
            VersionMatchDecision::Installed
        );
        assert_eq!(
            map_version_match_state(RebootState::RollbackFwRebootPending),
            VersionMatchDecision::Unknown
        );
    }

    #[test]
    fn test_app_version_match_excludes_fw_incomplete() {
        assert_eq!(
            map_app_version_match_state(RebootState::IncompleteFwUpdate),
            VersionMatchDecision::Unknown
        );
        assert_eq!(
            map_app_version_match_state(RebootState::IncompleteAppUpdate),
            VersionMatchDecision::MissingCommit
        );
    }

    #[test]
    fn test_unmatched_version_dispatch() {
        assert_eq!(
            map_unmatched_version_state(RebootState::FailedAppUpdate),
            UnmatchedVersionDecision::CommitPreviousFailedApplication
        );
        assert_eq!(
            map_unmatched_version_state(RebootState::FailedFwUpdate),
            UnmatchedVersionDecision::CommitPreviousFailedFirmware
        );
        assert_eq!(
            map_unmatched_version_state(RebootState::FwUpdateRebootFailed),
            UnmatchedVersionDecision::Installed
        );
        assert_eq!(
            map_unmatched_version_state(RebootState::UpdateRebootPending),
            UnmatchedVersionDecision::NotInstalled
        );
    }

    #[test]
    fn test_apply_dispatch() {
        assert_eq!(map_apply_code(1), ApplyDecision::AwaitPermissionThenReboot);
        for code in 2..=4 {
            assert_eq!(map_apply_code(code), ApplyDecision::AwaitPermissionIncomplete);
        }
        assert_eq!(map_apply_code(0), ApplyDecision::Success);
        // Commit-domain "update not needed" leaks into this dispatch.
        assert_eq!(
            map_apply_code(CommitState::UpdateNotNeeded.exit_code()),
            ApplyDecision::Success
        );
        assert_eq!(map_apply_code(7), ApplyDecision::Unknown);
        assert_eq!(map_apply_code(77), ApplyDecision::Unknown);
    }

    #[test]
    fn test_cancel_dispatch() {
        assert_eq!(
            map_cancel_state(RebootState::IncompleteAppUpdate),
            CancelDecision::RollbackApplication
        );
        assert_eq!(
            map_cancel_state(RebootState::RollbackFwRebootPending),
            CancelDecision::CommitRollbackReboot
        );
        assert_eq!(
            map_cancel_state(RebootState::NoUpdateRebootPending),
            CancelDecision::NothingToCancel
        );
        assert_eq!(map_cancel_state(RebootState::IncompleteFwUpdate), CancelDecision::NotAllowed);
    }

    #[test]
    fn test_post_rollback_dispatch() {
        assert_eq!(
            map_post_rollback_state(RebootState::RollbackFwRebootPending),
            PostRollbackDecision::RebootRequired
        );
        assert_eq!(
            map_post_rollback_state(RebootState::NoUpdateRebootPending),
            PostRollbackDecision::Complete
        );
        assert_eq!(
            map_post_rollback_state(RebootState::IncompleteAppUpdate),
            PostRollbackDecision::NotAllowed
        );
    }
}
