//! Child-process execution.
//!
//! All updater work happens in child processes (the adu-shell
//! trampoline). The runner blocks until exit, captures stdout and
//! stderr into one string, and hands back the raw exit status without
//! translating it; exit-code interpretation belongs to the callers.

use std::path::Path;
use std::process::Command;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
#[error("failed to launch {executable}: {source}")]
pub struct SpawnError {
    pub executable: String,
    #[source]
    pub source: std::io::Error,
}

/// Captured outcome of a finished child.
#[derive(Debug, Clone)]
pub struct ChildOutput {
    /// Raw exit code; a signal death is reported as the negated signal
    /// number.
    pub exit_code: i32,
    /// stdout followed by stderr.
    pub output: String,
}

impl ChildOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `executable` with `args`, blocking until it exits.
pub fn run_child<S: AsRef<str>>(executable: &Path, args: &[S]) -> Result<ChildOutput, SpawnError> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    debug!("Running {} {}", executable.display(), args.join(" "));

    let output = Command::new(executable)
        .args(&args)
        .output()
        .map_err(|source| SpawnError { executable: executable.display().to_string(), source })?;

    let exit_code = match output.status.code() {
        Some(code) => code,
        // Killed by a signal; surface it distinctly from any updater code.
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                -output.status.signal().unwrap_or(0)
            }
            #[cfg(not(unix))]
            {
                -1
            }
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    debug!("{} exited with code {}", executable.display(), exit_code);
    Ok(ChildOutput { exit_code, output: combined })
}
