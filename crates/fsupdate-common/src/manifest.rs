//! Deployment manifest model.
//!
//! The host workflow framework normally feeds the handler from its own
//! manifest parser; `fsupdatectl` and the tests feed it from a local
//! JSON file with the same fields instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One payload file of the update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    pub target_filename: String,
}

/// Local deployment manifest, mirroring the workflow-data fields the
/// handler consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManifest {
    pub workflow_id: String,
    pub installed_criteria: String,
    /// Handler selector of the form `name:version`, e.g. `fus/update:1`.
    pub update_type: String,
    #[serde(default)]
    pub update_size: i64,
    #[serde(default)]
    pub files: Vec<ManifestFile>,
    /// Free-form handler properties; the step handler reads `updateType`.
    #[serde(default)]
    pub handler_properties: HashMap<String, String>,
}

impl DeploymentManifest {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The `updateType` handler property, if present and non-empty.
    pub fn update_type_property(&self) -> Option<&str> {
        self.handler_properties
            .get("updateType")
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}
