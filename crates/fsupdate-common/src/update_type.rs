//! Update-type classification.
//!
//! The update manifest carries two type strings: the handler property
//! `updateType` selecting the update flavour, and the manifest-level
//! `updateType` of the form `name:version` selecting the handler itself.

use serde::{Deserialize, Serialize};

/// Update flavour from the `updateType` handler property.
///
/// Matching is case-sensitive and exact; anything unrecognized is
/// `Unknown`, which the phases treat as a misconfigured manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateType {
    Firmware,
    Application,
    CommonFirmware,
    CommonApplication,
    CommonBoth,
    Unknown,
}

impl UpdateType {
    pub fn classify(name: &str) -> Self {
        match name {
            "firmware" => Self::Firmware,
            "application" => Self::Application,
            "common-firmware" => Self::CommonFirmware,
            "common-application" => Self::CommonApplication,
            "common-both" => Self::CommonBoth,
            _ => Self::Unknown,
        }
    }

    /// Canonical name written to the `update_type` sentinel.
    pub fn canonical_name(self) -> Option<&'static str> {
        match self {
            Self::Firmware => Some("firmware"),
            Self::Application => Some("application"),
            Self::CommonFirmware => Some("common-firmware"),
            Self::CommonApplication => Some("common-application"),
            Self::CommonBoth => Some("common-both"),
            Self::Unknown => None,
        }
    }

    /// Whether the version probe for this flavour reads the application
    /// version. Firmware, common-firmware and common-both start with the
    /// firmware version.
    pub fn probes_application_version(self) -> bool {
        matches!(self, Self::Application | Self::CommonApplication)
    }

    /// True for the flavours updating the firmware side.
    pub fn is_firmware(self) -> bool {
        matches!(self, Self::Firmware | Self::CommonFirmware)
    }

    /// True for the flavours updating the application side.
    pub fn is_application(self) -> bool {
        matches!(self, Self::Application | Self::CommonApplication)
    }
}

impl std::fmt::Display for UpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_name().unwrap_or("unknown"))
    }
}

/// Split a manifest update-type string (`"fus/update:1"`) into its name
/// and version. Returns `None` when the form is not `name:version` with
/// a decimal version.
pub fn parse_manifest_update_type(raw: &str) -> Option<(&str, u32)> {
    let (name, version) = raw.rsplit_once(':')?;
    if name.is_empty() {
        return None;
    }
    let version = version.parse().ok()?;
    Some((name, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_names() {
        assert_eq!(UpdateType::classify("firmware"), UpdateType::Firmware);
        assert_eq!(UpdateType::classify("application"), UpdateType::Application);
        assert_eq!(UpdateType::classify("common-firmware"), UpdateType::CommonFirmware);
        assert_eq!(UpdateType::classify("common-application"), UpdateType::CommonApplication);
        assert_eq!(UpdateType::classify("common-both"), UpdateType::CommonBoth);
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(UpdateType::classify("Firmware"), UpdateType::Unknown);
        assert_eq!(UpdateType::classify("APPLICATION"), UpdateType::Unknown);
        assert_eq!(UpdateType::classify("common-Both"), UpdateType::Unknown);
    }

    #[test]
    fn test_classify_rejects_unknown() {
        assert_eq!(UpdateType::classify(""), UpdateType::Unknown);
        assert_eq!(UpdateType::classify("foo"), UpdateType::Unknown);
        assert_eq!(UpdateType::classify("common"), UpdateType::Unknown);
    }

    #[test]
    fn test_canonical_name_round_trip() {
        for name in ["firmware", "application", "common-firmware", "common-application", "common-both"] {
            let t = UpdateType::classify(name);
            assert_eq!(t.canonical_name(), Some(name));
        }
        assert_eq!(UpdateType::Unknown.canonical_name(), None);
    }

    #[test]
    fn test_probe_flag_selection() {
        assert!(UpdateType::Application.probes_application_version());
        assert!(UpdateType::CommonApplication.probes_application_version());
        assert!(!UpdateType::Firmware.probes_application_version());
        assert!(!UpdateType::CommonFirmware.probes_application_version());
        assert!(!UpdateType::CommonBoth.probes_application_version());
    }

    #[test]
    fn test_parse_manifest_update_type() {
        assert_eq!(parse_manifest_update_type("fus/update:1"), Some(("fus/update", 1)));
        assert_eq!(parse_manifest_update_type("fus/update:4"), Some(("fus/update", 4)));
        assert_eq!(parse_manifest_update_type("fus/update"), None);
        assert_eq!(parse_manifest_update_type(":1"), None);
        assert_eq!(parse_manifest_update_type("fus/update:one"), None);
        assert_eq!(parse_manifest_update_type(""), None);
    }
}
