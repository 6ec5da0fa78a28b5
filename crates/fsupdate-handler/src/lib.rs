//! Update step handler for fs-update A/B updates.
//!
//! Drives a single update through IsInstalled → Download → Install →
//! Apply (plus Cancel/Backup/Restore) by translating the manifest into
//! privileged adu-shell invocations, interpreting the updater's exit
//! codes, and synchronizing with an external control client through
//! sentinel files in a shared work directory.
//!
//! The handler is single-threaded and blocking: phases run on the host
//! workflow's calling thread, suspend only on child-process waits and
//! sentinel polls, and report every outcome as a [`PhaseResult`]; the
//! API neither panics nor returns `Err`.

pub mod handler;
pub mod mapper;
pub mod probe;
pub mod process;
pub mod workdir;
pub mod workflow;


pub use fsupdate_common::{HandlerConfig, PhaseResult, ResultCode};
pub use handler::StepHandler;
pub use workflow::{ContentDownloader, FileEntity, Workflow};
