//! The update step handler.
//!
//! One phase method per host workflow step. Each phase takes the
//! workflow-data handle, runs its piece of the state machine and
//! reports a [`PhaseResult`]; errors never escape as panics or `Err`.
//! The handler keeps no state between phases: every phase rederives
//! the update flavour from the manifest's `updateType` handler
//! property.

use tracing::{debug, error, info, warn};

use fsupdate_common::result::erc;
use fsupdate_common::shell;
use fsupdate_common::states::{CommitState, InstallState, RebootState, RollbackState};
use fsupdate_common::update_type::parse_manifest_update_type;
use fsupdate_common::{HandlerConfig, PhaseResult, ResultCode, UpdateType};

use crate::mapper::{
    self, ApplyDecision, CancelDecision, PostRollbackDecision, UnmatchedVersionDecision,
    VersionMatchDecision,
};
use crate::probe::{ProbeError, StateProbe};
use crate::process::run_child;
use crate::workdir::{self, Workdir};
use crate::workflow::{ContentDownloader, Workflow, UPDATE_TYPE_PROPERTY};

pub struct StepHandler {
    config: HandlerConfig,
    workdir: Workdir,
    probe: StateProbe,
}

impl StepHandler {
    pub fn new(config: HandlerConfig) -> Self {
        let workdir = Workdir::new(
            config.work_dir.clone(),
            config.work_dir_mode,
            config.poll_interval(),
            config.poll_timeout(),
        );
        let probe = StateProbe::new(config.adu_shell_path.clone());
        Self { config, workdir, probe }
    }

    /// Handler with configuration from the default config path and
    /// environment.
    pub fn from_default_config() -> Self {
        Self::new(HandlerConfig::load())
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Check whether the installed criteria is already satisfied.
    pub fn is_installed(&self, workflow: &dyn Workflow) -> PhaseResult {
        let type_name = match workflow.handler_property(UPDATE_TYPE_PROPERTY) {
            Some(name) => name,
            None => {
                error!("Manifest carries no updateType handler property");
                return PhaseResult::failure(erc::MISSING_UPDATE_TYPE_PROPERTY);
            }
        };
        let update_type = UpdateType::classify(type_name);
        info!("IsInstalled, update type '{}'", type_name);
        if update_type == UpdateType::Unknown {
            error!("IsInstalled failed, '{}' is not a recognized update type", type_name);
            return PhaseResult::failure(InstallState::InternalError.exit_code());
        }

        let installed_criteria = workflow.installed_criteria();
        let mut current_version = match self.probe_version(update_type.probes_application_version())
        {
            Ok(version) => version,
            Err(result) => return result,
        };
        info!(
            "Compare {} version '{}' and installed criteria '{}'",
            type_name, current_version, installed_criteria
        );

        if current_version == installed_criteria {
            let state = match self.probe.reboot_state() {
                Ok(state) => state,
                Err(e) => return self.reboot_probe_failure(e, erc::ISINSTALLED_FAILURE_UNKNOWN_STATE),
            };
            match mapper::map_version_match_state(state) {
                VersionMatchDecision::MissingCommit => {
                    info!("{}; apply is mandatory", state);
                    return PhaseResult::ok(ResultCode::MissingCommit);
                }
                VersionMatchDecision::Installed => {
                    info!(
                        "Update already installed, expected version matches current: '{}'",
                        installed_criteria
                    );
                    if update_type != UpdateType::CommonBoth {
                        return PhaseResult::ok(ResultCode::Installed);
                    }
                    // Common-both: the application side still has to
                    // pass the same check.
                }
                VersionMatchDecision::Unknown => {
                    error!("Unexpected updater state '{}' while versions match", state);
                    return PhaseResult::failure(erc::ISINSTALLED_FAILURE_UNKNOWN_STATE);
                }
            }
        }

        if update_type == UpdateType::CommonBoth {
            current_version = match self.probe_version(true) {
                Ok(version) => version,
                Err(result) => return result,
            };
            info!(
                "Compare application version '{}' and installed criteria '{}'",
                current_version, installed_criteria
            );
            if current_version == installed_criteria {
                let state = match self.probe.reboot_state() {
                    Ok(state) => state,
                    Err(e) => {
                        return self.reboot_probe_failure(e, erc::ISINSTALLED_FAILURE_UNKNOWN_STATE)
                    }
                };
                return match mapper::map_app_version_match_state(state) {
                    VersionMatchDecision::MissingCommit => {
                        info!("{}; apply is mandatory", state);
                        PhaseResult::ok(ResultCode::MissingCommit)
                    }
                    VersionMatchDecision::Installed => {
                        info!(
                            "Application update already installed, expected version matches: '{}'",
                            installed_criteria
                        );
                        PhaseResult::ok(ResultCode::Installed)
                    }
                    VersionMatchDecision::Unknown => {
                        error!("Unexpected updater state '{}' while versions match", state);
                        PhaseResult::failure(erc::ISINSTALLED_FAILURE_UNKNOWN_STATE)
                    }
                };
            }
        }

        let state = match self.probe.reboot_state() {
            Ok(state) => state,
            Err(e) => return self.reboot_probe_failure(e, erc::ISINSTALLED_FAILURE_UNKNOWN_STATE),
        };
        match mapper::map_unmatched_version_state(state) {
            UnmatchedVersionDecision::CommitPreviousFailedApplication => {
                info!("Previous application update failed; committing it away");
                self.commit_previous_failed_update()
            }
            UnmatchedVersionDecision::CommitPreviousFailedFirmware => {
                info!("Previous firmware update failed; committing it away");
                self.commit_previous_failed_update()
            }
            UnmatchedVersionDecision::Installed => {
                info!("Update reboot failed; reboot retry is handled externally");
                PhaseResult::ok(ResultCode::Installed)
            }
            UnmatchedVersionDecision::NotInstalled => {
                info!(
                    "Installed criteria '{}' not satisfied, current version is '{}'",
                    installed_criteria, current_version
                );
                PhaseResult::ok(ResultCode::NotInstalled)
            }
        }
    }

    /// Publish the update metadata, wait for the control client's
    /// download permission, then hand the payload to the download
    /// extension.
    pub fn download(
        &self,
        workflow: &dyn Workflow,
        downloader: &dyn ContentDownloader,
    ) -> PhaseResult {
        match parse_manifest_update_type(workflow.update_type()) {
            None => {
                error!("Download failed, unparseable update type '{}'", workflow.update_type());
                return PhaseResult::failure(erc::DOWNLOAD_FAILURE_UNKNOWN_UPDATE_VERSION);
            }
            Some((_, 1)) => {}
            Some((name, version)) => {
                error!("Download failed, unsupported {} version {}", name, version);
                return PhaseResult::failure(erc::DOWNLOAD_FAILURE_WRONG_UPDATE_VERSION);
            }
        }

        let file_count = workflow.file_count();
        if file_count != 1 {
            error!("Expecting exactly one payload file, manifest has {}", file_count);
            return PhaseResult::failure(erc::DOWNLOAD_FAILURE_WRONG_FILECOUNT);
        }
        let entity = match workflow.file(0) {
            Some(entity) => entity,
            None => return PhaseResult::failure(erc::DOWNLOAD_FAILURE_BAD_FILE_ENTITY),
        };
        let update_filename = workflow.work_folder().join(&entity.target_filename);

        let type_name = match workflow.handler_property(UPDATE_TYPE_PROPERTY) {
            Some(name) => name,
            None => {
                error!("Manifest carries no updateType handler property");
                return PhaseResult::failure(erc::MISSING_UPDATE_TYPE_PROPERTY);
            }
        };
        let canonical = match UpdateType::classify(type_name).canonical_name() {
            Some(name) => name,
            None => {
                error!("Download failed, '{}' is not a recognized update type", type_name);
                return PhaseResult::failure(InstallState::InternalError.exit_code());
            }
        };

        // Metadata must be complete before the permission poll so the
        // control client always observes a consistent set.
        if let Err(e) = self.workdir.reset() {
            warn!("Could not rebuild work dir {}: {}", self.workdir.path().display(), e);
        }
        if let Err(e) =
            self.workdir.write_sentinel(workdir::UPDATE_VERSION, workflow.installed_criteria().as_bytes())
        {
            error!("Could not create {}: {}", workdir::UPDATE_VERSION, e);
            return PhaseResult::failure(erc::DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_VERSION);
        }
        if let Err(e) = self.workdir.write_sentinel(workdir::UPDATE_TYPE, canonical.as_bytes()) {
            error!("Could not create {}: {}", workdir::UPDATE_TYPE, e);
            return PhaseResult::failure(erc::DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_TYPE);
        }
        if let Err(e) = self
            .workdir
            .write_sentinel(workdir::UPDATE_SIZE, workflow.update_size().to_string().as_bytes())
        {
            error!("Could not create {}: {}", workdir::UPDATE_SIZE, e);
            return PhaseResult::failure(erc::DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_SIZE);
        }

        if self.workdir.await_sentinel(workdir::DOWNLOAD_UPDATE).is_err() {
            return PhaseResult::failure(erc::CONTROL_CLIENT_TIMEOUT);
        }

        if let Err(e) = self
            .workdir
            .write_sentinel(workdir::UPDATE_LOCATION, update_filename.to_string_lossy().as_bytes())
        {
            error!("Could not create {}: {}", workdir::UPDATE_LOCATION, e);
            return PhaseResult::failure(erc::DOWNLOAD_FAILURE_CREATE_FAILED_UPDATE_LOCATION);
        }

        info!("Start download of update file '{}'", update_filename.display());
        let result = downloader.download(&entity, workflow.id(), workflow.work_folder());
        info!("Download result {}", result);
        result
    }

    /// Wait for the install permission, then write the payload through
    /// the privileged trampoline.
    pub fn install(&self, workflow: &dyn Workflow) -> PhaseResult {
        let result = self.install_inner(workflow);
        if result.code != ResultCode::InstallSuccess {
            // Failed installs drop the permission so the control client
            // can re-arm the attempt.
            self.workdir.remove_sentinel(workdir::INSTALL_UPDATE);
        }
        if let Err(e) =
            self.workdir.write_sentinel(workdir::ERROR_STATE, result.to_sentinel_text().as_bytes())
        {
            error!("Could not create {}: {}", workdir::ERROR_STATE, e);
        }
        result
    }

    fn install_inner(&self, workflow: &dyn Workflow) -> PhaseResult {
        let work_folder = workflow.work_folder();
        info!("Installing from {}", work_folder.display());
        if let Err(e) = std::fs::read_dir(work_folder) {
            error!("Cannot open work folder {}: {}", work_folder.display(), e);
            return PhaseResult::failure(erc::INSTALL_FAILURE_CANNOT_OPEN_WORKFOLDER);
        }

        let entity = match workflow.file(0) {
            Some(entity) => entity,
            None => return PhaseResult::failure(erc::INSTALL_FAILURE_BAD_FILE_ENTITY),
        };
        let type_name = match workflow.handler_property(UPDATE_TYPE_PROPERTY) {
            Some(name) => name,
            None => {
                error!("Manifest carries no updateType handler property");
                return PhaseResult::failure(erc::MISSING_UPDATE_TYPE_PROPERTY);
            }
        };
        let update_type = UpdateType::classify(type_name);

        if self.workdir.await_sentinel(workdir::INSTALL_UPDATE).is_err() {
            return PhaseResult::failure(erc::CONTROL_CLIENT_TIMEOUT);
        }

        let target_data = work_folder.join(&entity.target_filename);
        let mut args: Vec<String> = vec![
            shell::UPDATE_TYPE_OPT.into(),
            shell::UPDATE_TYPE_FUS_UPDATE.into(),
            shell::UPDATE_ACTION_OPT.into(),
            shell::UPDATE_ACTION_INSTALL.into(),
            shell::TARGET_DATA_OPT.into(),
            target_data.to_string_lossy().into_owned(),
        ];
        // Single-flavour updates narrow the install to one side of the
        // image; common updates carry the side selection in the image
        // itself.
        match update_type {
            UpdateType::Application => {
                args.push(shell::TARGET_OPTIONS_OPT.into());
                args.push(shell::TARGET_OPTION_APP.into());
            }
            UpdateType::Firmware => {
                args.push(shell::TARGET_OPTIONS_OPT.into());
                args.push(shell::TARGET_OPTION_FW.into());
            }
            _ => {}
        }
        debug!("Install update image '{}'", target_data.display());

        match run_child(&self.config.adu_shell_path, &args) {
            Ok(child) => {
                let result = mapper::map_install_exit(child.exit_code, update_type);
                if result.code == ResultCode::InstallSuccess {
                    debug!("Install succeeded");
                } else {
                    error!("Install failed, updater exit code {}", child.exit_code);
                }
                result
            }
            Err(e) => {
                error!("Install failed: {}", e);
                PhaseResult::failure(erc::CHILD_PROCESS_FAILURE)
            }
        }
    }

    /// Drive the armed A/B swap to its reboot, or confirm a finished
    /// one.
    pub fn apply(&self, workflow: &dyn Workflow) -> PhaseResult {
        let code = match self.probe.reboot_state() {
            Ok(state) => state.exit_code(),
            Err(ProbeError::UnrecognizedState(code)) => code,
            Err(e) => {
                error!("Apply failed: {}", e);
                return PhaseResult::failure(erc::CHILD_PROCESS_FAILURE);
            }
        };

        match mapper::map_apply_code(code) {
            ApplyDecision::AwaitPermissionThenReboot => {
                debug!("Update reboot pending; waiting for apply permission");
                self.await_apply_then_reboot(workflow)
            }
            ApplyDecision::AwaitPermissionIncomplete => {
                debug!("Incomplete update; commit is mandatory after reboot");
                self.await_apply_then_reboot(workflow)
            }
            ApplyDecision::Success => {
                debug!("No reboot outstanding; apply complete");
                PhaseResult::ok(ResultCode::ApplySuccess)
            }
            ApplyDecision::Unknown => {
                error!("Unknown updater state {} while applying", code);
                PhaseResult::failure(erc::APPLY_FAILURE_UNKNOWN_ERROR)
            }
        }
    }

    fn await_apply_then_reboot(&self, workflow: &dyn Workflow) -> PhaseResult {
        if self.workdir.await_sentinel(workdir::APPLY_UPDATE).is_err() {
            return PhaseResult::failure(erc::CONTROL_CLIENT_TIMEOUT);
        }
        workflow.request_immediate_reboot();
        PhaseResult::ok(ResultCode::ApplyRequiredImmediateReboot)
    }

    /// Roll a half-done update back, or finish a rollback that already
    /// rebooted.
    pub fn cancel(&self, workflow: &dyn Workflow) -> PhaseResult {
        let state = match self.probe.reboot_state() {
            Ok(state) => state,
            Err(ProbeError::UnrecognizedState(code)) => {
                error!("Unknown updater state {} while cancelling", code);
                return PhaseResult::failure(erc::CANCEL_NOT_ALLOWED_STATE_ERROR);
            }
            Err(e) => {
                error!("Cancel failed: {}", e);
                return PhaseResult::failure(erc::CHILD_PROCESS_FAILURE);
            }
        };

        match mapper::map_cancel_state(state) {
            CancelDecision::RollbackApplication => self.rollback_application(workflow),
            CancelDecision::CommitRollbackReboot => self.commit_rollback_after_reboot(),
            CancelDecision::NothingToCancel => {
                info!("Nothing to cancel, update already applied");
                PhaseResult::cancelled()
            }
            CancelDecision::NotAllowed => {
                error!("Cancel not possible in state '{}'", state);
                PhaseResult::failure(erc::CANCEL_NOT_ALLOWED_STATE_ERROR)
            }
        }
    }

    fn rollback_application(&self, workflow: &dyn Workflow) -> PhaseResult {
        info!("Incomplete application update; proceeding with rollback");
        let args = [
            shell::UPDATE_TYPE_OPT,
            shell::UPDATE_TYPE_FUS_UPDATE,
            shell::UPDATE_ACTION_OPT,
            shell::UPDATE_ACTION_CANCEL,
        ];
        let exit_code = match run_child(&self.config.adu_shell_path, &args) {
            Ok(child) => child.exit_code,
            Err(e) => {
                error!("Rollback failed: {}", e);
                return PhaseResult::failure(erc::CHILD_PROCESS_FAILURE);
            }
        };
        if RollbackState::from_exit_code(exit_code) != Some(RollbackState::RollbackSuccessful) {
            error!("Rollback failed, updater exit code {}", exit_code);
            return PhaseResult::failure(erc::CANCEL_ROLLBACK_FIRMWARE_ERROR);
        }

        let state = match self.probe.reboot_state() {
            Ok(state) => state,
            Err(ProbeError::UnrecognizedState(code)) => {
                error!("Unknown updater state {} after rollback", code);
                return PhaseResult::failure(erc::CANCEL_NOT_ALLOWED_STATE_ERROR);
            }
            Err(e) => {
                error!("Cancel failed: {}", e);
                return PhaseResult::failure(erc::CHILD_PROCESS_FAILURE);
            }
        };
        match mapper::map_post_rollback_state(state) {
            PostRollbackDecision::RebootRequired => {
                info!("Firmware rollback pending; proceeding with reboot");
                workflow.request_immediate_reboot();
                PhaseResult::ok(ResultCode::CancelRequiredImmediateReboot)
            }
            PostRollbackDecision::Complete => {
                info!("Firmware rollback complete");
                PhaseResult::ok(ResultCode::CancelSuccess)
            }
            PostRollbackDecision::NotAllowed => {
                error!("No permitted rollback state '{}'", state);
                PhaseResult::failure(erc::CANCEL_NOT_ALLOWED_STATE_ERROR)
            }
        }
    }

    fn commit_rollback_after_reboot(&self) -> PhaseResult {
        info!("Firmware rollback reboot processed; committing");
        let exit_code = match self.probe.commit_update() {
            Ok(code) => code,
            Err(e) => {
                error!("Commit after rollback failed: {}", e);
                return PhaseResult::failure(erc::CHILD_PROCESS_FAILURE);
            }
        };
        // The commit exit code is read in the reboot-state domain here;
        // control clients depend on the tagged-success form below.
        if exit_code == RebootState::NoUpdateRebootPending.exit_code() {
            info!("Cancelled firmware update committed");
            PhaseResult::ok(ResultCode::CancelSuccess)
        } else {
            warn!("Commit after rollback reboot answered {}", exit_code);
            PhaseResult::new(ResultCode::CancelSuccess, erc::CANCEL_NOT_ALLOWED_STATE_ERROR)
        }
    }

    /// Backup is not needed for A/B updates; the inactive side is the
    /// backup.
    pub fn backup(&self, _workflow: &dyn Workflow) -> PhaseResult {
        info!("No backup operation required (no-op)");
        PhaseResult::ok(ResultCode::BackupSuccess)
    }

    /// Restore is unsupported; rollback runs through Cancel instead.
    pub fn restore(&self, _workflow: &dyn Workflow) -> PhaseResult {
        info!("Backup & restore is not supported (no-op)");
        PhaseResult::ok(ResultCode::RestoreSuccessUnsupported)
    }

    fn probe_version(&self, application: bool) -> Result<String, PhaseResult> {
        let probed =
            if application { self.probe.application_version() } else { self.probe.firmware_version() };
        probed.map_err(|e| match e {
            ProbeError::ProbeFailed(code) => {
                error!("IsInstalled failed, version probe exit code {}", code);
                PhaseResult::failure(code)
            }
            ProbeError::EmptyOutput(code) => {
                error!("Version of updater command could not be read");
                PhaseResult::failure(code)
            }
            ProbeError::Spawn(e) => {
                error!("Version probe failed: {}", e);
                PhaseResult::failure(erc::CHILD_PROCESS_FAILURE)
            }
            ProbeError::UnrecognizedState(code) => {
                // Version probes do not classify states; keep the raw
                // code if this ever surfaces.
                PhaseResult::failure(code)
            }
        })
    }

    fn reboot_probe_failure(&self, e: ProbeError, unknown_code: i32) -> PhaseResult {
        match e {
            ProbeError::UnrecognizedState(code) => {
                error!("Unknown updater state code {}", code);
                PhaseResult::failure(unknown_code)
            }
            ProbeError::Spawn(e) => {
                error!("Reboot-state probe failed: {}", e);
                PhaseResult::failure(erc::CHILD_PROCESS_FAILURE)
            }
            _ => PhaseResult::failure(unknown_code),
        }
    }

    fn commit_previous_failed_update(&self) -> PhaseResult {
        let exit_code = match self.probe.commit_update() {
            Ok(code) => code,
            Err(e) => {
                error!("Commit of failed update did not run: {}", e);
                return PhaseResult::failure(erc::CHILD_PROCESS_FAILURE);
            }
        };
        if CommitState::from_exit_code(exit_code) == Some(CommitState::CommitSuccessful) {
            info!("Committed the previously failed update");
            PhaseResult::ok(ResultCode::Installed)
        } else {
            error!("Failed to commit the previously failed update, exit code {}", exit_code);
            PhaseResult::failure(erc::ISINSTALLED_FAILURE_COMMIT_PREVIOUS_FAILED_UPDATE)
        }
    }
}
