//! Manifest-backed workflow handle.
//!
//! Adapts a local deployment manifest to the `Workflow` trait the
//! handler consumes, standing in for the host workflow framework. A
//! reboot request is recorded and reported instead of rebooting the
//! bench machine.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use fsupdate_common::manifest::DeploymentManifest;
use fsupdate_common::{PhaseResult, ResultCode};
use fsupdate_handler::{ContentDownloader, FileEntity, Workflow};

pub struct ManifestWorkflow {
    manifest: DeploymentManifest,
    work_folder: PathBuf,
    reboot_requested: Cell<bool>,
}

impl ManifestWorkflow {
    pub fn new(manifest: DeploymentManifest, work_folder: PathBuf) -> Self {
        Self { manifest, work_folder, reboot_requested: Cell::new(false) }
    }

    pub fn reboot_requested(&self) -> bool {
        self.reboot_requested.get()
    }
}

impl Workflow for ManifestWorkflow {
    fn id(&self) -> &str {
        &self.manifest.workflow_id
    }

    fn work_folder(&self) -> &Path {
        &self.work_folder
    }

    fn installed_criteria(&self) -> &str {
        &self.manifest.installed_criteria
    }

    fn update_size(&self) -> i64 {
        self.manifest.update_size
    }

    fn update_type(&self) -> &str {
        &self.manifest.update_type
    }

    fn file_count(&self) -> usize {
        self.manifest.files.len()
    }

    fn file(&self, index: usize) -> Option<FileEntity> {
        self.manifest
            .files
            .get(index)
            .map(|f| FileEntity { target_filename: f.target_filename.clone() })
    }

    fn handler_property(&self, key: &str) -> Option<&str> {
        self.manifest
            .handler_properties
            .get(key)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    fn request_immediate_reboot(&self) {
        info!("Host reboot requested; deferred to the operator on the bench");
        self.reboot_requested.set(true);
    }
}

/// Extended result code of the staged downloader, opaque to the
/// handler (download-extension facility).
pub const STAGED_PAYLOAD_MISSING: i32 = 0x3200_0001;

/// Download extension for bench runs: the payload is expected to be
/// staged in the work folder beforehand; no bytes are moved.
pub struct StagedDownloader;

impl ContentDownloader for StagedDownloader {
    fn download(&self, entity: &FileEntity, workflow_id: &str, work_folder: &Path) -> PhaseResult {
        let payload = work_folder.join(&entity.target_filename);
        if payload.is_file() {
            info!("Payload for workflow {} staged at {}", workflow_id, payload.display());
            PhaseResult::ok(ResultCode::DownloadSuccess)
        } else {
            warn!("Payload {} is not staged", payload.display());
            PhaseResult::failure(STAGED_PAYLOAD_MISSING)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> DeploymentManifest {
        DeploymentManifest::from_json(
            r#"{
                "workflowId": "wf-7",
                "installedCriteria": "2.1.0",
                "updateType": "fus/update:1",
                "updateSize": 1024,
                "files": [{"targetFilename": "app.fsimage"}],
                "handlerProperties": {"updateType": "application"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_manifest_workflow_exposes_fields() {
        let workflow = ManifestWorkflow::new(manifest(), PathBuf::from("/var/adu/wf-7"));
        assert_eq!(workflow.id(), "wf-7");
        assert_eq!(workflow.installed_criteria(), "2.1.0");
        assert_eq!(workflow.update_type(), "fus/update:1");
        assert_eq!(workflow.file_count(), 1);
        assert_eq!(workflow.file(0).unwrap().target_filename, "app.fsimage");
        assert_eq!(workflow.file(1), None);
        assert_eq!(workflow.handler_property("updateType"), Some("application"));
        assert_eq!(workflow.handler_property("missing"), None);
    }

    #[test]
    fn test_reboot_request_is_recorded() {
        let workflow = ManifestWorkflow::new(manifest(), PathBuf::from("/tmp"));
        assert!(!workflow.reboot_requested());
        workflow.request_immediate_reboot();
        assert!(workflow.reboot_requested());
    }

    #[test]
    fn test_staged_downloader_requires_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let entity = FileEntity { target_filename: "app.fsimage".to_string() };

        let result = StagedDownloader.download(&entity, "wf-7", tmp.path());
        assert_eq!(result, PhaseResult::failure(STAGED_PAYLOAD_MISSING));

        std::fs::write(tmp.path().join("app.fsimage"), b"image").unwrap();
        let result = StagedDownloader.download(&entity, "wf-7", tmp.path());
        assert_eq!(result, PhaseResult::ok(ResultCode::DownloadSuccess));
    }
}
