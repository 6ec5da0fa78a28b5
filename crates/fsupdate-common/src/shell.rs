//! adu-shell argv vocabulary.
//!
//! Every privileged updater invocation goes through the setuid adu-shell
//! trampoline with the fixed argv grammar
//! `adu-shell --update_type <type> --update_action <action>
//! [--target_data <path>] [--target_options <opt>...]`.
//! The strings here are a compatibility contract with the installed
//! trampoline; they are never derived at runtime.

/// Default install location of the setuid trampoline.
pub const ADU_SHELL_PATH: &str = "/usr/lib/adu/adu-shell";

pub const UPDATE_TYPE_OPT: &str = "--update_type";
pub const UPDATE_ACTION_OPT: &str = "--update_action";
pub const TARGET_DATA_OPT: &str = "--target_data";
pub const TARGET_OPTIONS_OPT: &str = "--target_options";

pub const UPDATE_TYPE_FUS_UPDATE: &str = "fus/update";
pub const UPDATE_TYPE_FUS_FIRMWARE: &str = "fus/firmware";
pub const UPDATE_TYPE_FUS_APPLICATION: &str = "fus/application";

pub const UPDATE_ACTION_INSTALL: &str = "install";
pub const UPDATE_ACTION_APPLY: &str = "apply";
pub const UPDATE_ACTION_EXECUTE: &str = "execute";
pub const UPDATE_ACTION_CANCEL: &str = "cancel";
pub const UPDATE_ACTION_REBOOT: &str = "reboot";

// Target options forwarded to the updater by the execute action.
pub const OPTION_UPDATE_REBOOT_STATE: &str = "--update_reboot_state";
pub const OPTION_FIRMWARE_VERSION: &str = "--firmware_version";
pub const OPTION_APPLICATION_VERSION: &str = "--application_version";
pub const OPTION_COMMIT_UPDATE: &str = "--commit_update";

// Target options narrowing an install to one side of the image.
pub const TARGET_OPTION_APP: &str = "app";
pub const TARGET_OPTION_FW: &str = "fw";
