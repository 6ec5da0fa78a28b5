//! Workflow phase results.
//!
//! Every phase operation returns a [`PhaseResult`]: a result code from a
//! closed set plus an extended result code. The extended code is either
//! one of the handler-defined constants in [`erc`] or an opaque
//! passthrough from the updater / download extension.

use serde::{Deserialize, Serialize};

/// Closed set of phase outcomes.
///
/// The integer values are part of the contract with the host workflow
/// and with the control client (which reads them back from the
/// `errorState` sentinel); they never change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Failure,
    FailureCancelled,
    Success,
    DownloadSuccess,
    InstallSuccess,
    ApplySuccess,
    ApplyRequiredImmediateReboot,
    CancelSuccess,
    CancelRequiredImmediateReboot,
    Installed,
    NotInstalled,
    MissingCommit,
    BackupSuccess,
    RestoreSuccessUnsupported,
}

impl ResultCode {
    /// Wire value reported to the host and written to `errorState`.
    pub fn value(self) -> i32 {
        match self {
            Self::Failure => 0,
            Self::FailureCancelled => -1,
            Self::Success => 1,
            Self::DownloadSuccess => 500,
            Self::InstallSuccess => 600,
            Self::ApplySuccess => 700,
            Self::ApplyRequiredImmediateReboot => 705,
            Self::CancelSuccess => 800,
            Self::CancelRequiredImmediateReboot => 805,
            Self::Installed => 900,
            Self::NotInstalled => 901,
            Self::MissingCommit => 902,
            Self::BackupSuccess => 1000,
            Self::RestoreSuccessUnsupported => 1101,
        }
    }

    /// Whether the host workflow treats this code as a failed step.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure | Self::FailureCancelled)
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Failure => "failure",
            Self::FailureCancelled => "failure_cancelled",
            Self::Success => "success",
            Self::DownloadSuccess => "download_success",
            Self::InstallSuccess => "install_success",
            Self::ApplySuccess => "apply_success",
            Self::ApplyRequiredImmediateReboot => "apply_required_immediate_reboot",
            Self::CancelSuccess => "cancel_success",
            Self::CancelRequiredImmediateReboot => "cancel_required_immediate_reboot",
            Self::Installed => "installed",
            Self::NotInstalled => "not_installed",
            Self::MissingCommit => "missing_commit",
            Self::BackupSuccess => "backup_success",
            Self::RestoreSuccessUnsupported => "restore_success_unsupported",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one phase operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub code: ResultCode,
    /// Handler-defined constant from [`erc`], or an opaque code passed
    /// through from the updater or the download extension.
    pub extended: i32,
}

impl PhaseResult {
    pub fn new(code: ResultCode, extended: i32) -> Self {
        Self { code, extended }
    }

    /// Success-family result with no extended code.
    pub fn ok(code: ResultCode) -> Self {
        Self { code, extended: 0 }
    }

    /// Generic failure carrying an extended code.
    pub fn failure(extended: i32) -> Self {
        Self { code: ResultCode::Failure, extended }
    }

    /// The `Failure_Cancelled` outcome (nothing to cancel).
    pub fn cancelled() -> Self {
        Self { code: ResultCode::FailureCancelled, extended: 0 }
    }

    pub fn is_failure(&self) -> bool {
        self.code.is_failure()
    }

    /// Text form written to the `errorState` sentinel: result code,
    /// newline, extended result code.
    pub fn to_sentinel_text(&self) -> String {
        format!("{}\n{}\n", self.code.value(), self.extended)
    }
}

impl std::fmt::Display for PhaseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}), extended 0x{:08x}", self.code, self.code.value(), self.extended)
    }
}

/// Handler-defined extended result codes.
///
/// The high nibble is the step-handler facility; the next byte selects
/// the phase block. Codes are reported to the host workflow and written
/// to the `errorState` sentinel, so their values are frozen.
pub mod erc {
    const FACILITY: i32 = 0x3100_0000;

    // Cross-phase.
    pub const MISSING_UPDATE_TYPE_PROPERTY: i32 = FACILITY | 0x001;
    pub const CONTROL_CLIENT_TIMEOUT: i32 = FACILITY | 0x002;
    pub const CHILD_PROCESS_FAILURE: i32 = FACILITY | 0x003;

    // Download.
    pub const DOWNLOAD_FAILURE_UNKNOWN_UPDATE_VERSION: i32 = FACILITY | 0x101;
    pub const DOWNLOAD_FAILURE_WRONG_UPDATE_VERSION: i32 = FACILITY | 0x102;
    pub const DOWNLOAD_FAILURE_WRONG_FILECOUNT: i32 = FACILITY | 0x103;
    pub const DOWNLOAD_FAILURE_BAD_FILE_ENTITY: i32 = FACILITY | 0x104;
    pub const DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_VERSION: i32 = FACILITY | 0x105;
    pub const DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_TYPE: i32 = FACILITY | 0x106;
    pub const DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_SIZE: i32 = FACILITY | 0x107;
    pub const DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_LOCATION: i32 = FACILITY | 0x108;

    // Install.
    pub const INSTALL_FAILURE_CANNOT_OPEN_WORKFOLDER: i32 = FACILITY | 0x201;
    pub const INSTALL_FAILURE_BAD_FILE_ENTITY: i32 = FACILITY | 0x202;
    pub const INSTALL_FAILURE_FIRMWARE_UPDATE: i32 = FACILITY | 0x203;
    pub const INSTALL_FAILURE_APPLICATION_UPDATE: i32 = FACILITY | 0x204;

    // Apply.
    pub const APPLY_FAILURE_UNKNOWN_ERROR: i32 = FACILITY | 0x301;

    // Cancel.
    pub const CANCEL_ROLLBACK_FIRMWARE_ERROR: i32 = FACILITY | 0x401;
    pub const CANCEL_NOT_ALLOWED_STATE_ERROR: i32 = FACILITY | 0x402;

    // IsInstalled.
    pub const ISINSTALLED_FAILURE_UNKNOWN_STATE: i32 = FACILITY | 0x501;
    pub const ISINSTALLED_FAILURE_COMMIT_PREVIOUS_FAILED_UPDATE: i32 = FACILITY | 0x502;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_values_are_frozen() {
        assert_eq!(ResultCode::Failure.value(), 0);
        assert_eq!(ResultCode::FailureCancelled.value(), -1);
        assert_eq!(ResultCode::InstallSuccess.value(), 600);
        assert_eq!(ResultCode::ApplyRequiredImmediateReboot.value(), 705);
        assert_eq!(ResultCode::Installed.value(), 900);
        assert_eq!(ResultCode::NotInstalled.value(), 901);
        assert_eq!(ResultCode::MissingCommit.value(), 902);
    }

    #[test]
    fn test_failure_classification() {
        assert!(PhaseResult::failure(0).is_failure());
        assert!(PhaseResult::cancelled().is_failure());
        assert!(!PhaseResult::ok(ResultCode::ApplySuccess).is_failure());
        assert!(!PhaseResult::ok(ResultCode::NotInstalled).is_failure());
    }

    #[test]
    fn test_sentinel_text_form() {
        let result = PhaseResult::new(ResultCode::InstallSuccess, 0);
        assert_eq!(result.to_sentinel_text(), "600\n0\n");

        let result = PhaseResult::failure(erc::INSTALL_FAILURE_FIRMWARE_UPDATE);
        assert_eq!(
            result.to_sentinel_text(),
            format!("0\n{}\n", erc::INSTALL_FAILURE_FIRMWARE_UPDATE)
        );
    }

    #[test]
    fn test_erc_constants_are_distinct() {
        let all = [
            erc::MISSING_UPDATE_TYPE_PROPERTY,
            erc::CONTROL_CLIENT_TIMEOUT,
            erc::CHILD_PROCESS_FAILURE,
            erc::DOWNLOAD_FAILURE_UNKNOWN_UPDATE_VERSION,
            erc::DOWNLOAD_FAILURE_WRONG_UPDATE_VERSION,
            erc::DOWNLOAD_FAILURE_WRONG_FILECOUNT,
            erc::DOWNLOAD_FAILURE_BAD_FILE_ENTITY,
            erc::DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_VERSION,
            erc::DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_TYPE,
            erc::DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_SIZE,
            erc::DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_LOCATION,
            erc::INSTALL_FAILURE_CANNOT_OPEN_WORKFOLDER,
            erc::INSTALL_FAILURE_BAD_FILE_ENTITY,
            erc::INSTALL_FAILURE_FIRMWARE_UPDATE,
            erc::INSTALL_FAILURE_APPLICATION_UPDATE,
            erc::APPLY_FAILURE_UNKNOWN_ERROR,
            erc::CANCEL_ROLLBACK_FIRMWARE_ERROR,
            erc::CANCEL_NOT_ALLOWED_STATE_ERROR,
            erc::ISINSTALLED_FAILURE_UNKNOWN_STATE,
            erc::ISINSTALLED_FAILURE_COMMIT_PREVIOUS_FAILED_UPDATE,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
