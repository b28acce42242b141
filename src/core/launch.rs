//! Child process launch.
//!
//! [`Launcher`] turns a [`LaunchSpec`] into a running [`Child`] whose stdout
//! and stderr are piped back to the supervisor. [`JavaLauncher`] is the
//! production implementation; tests substitute their own.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};

/// Program, arguments and working directory of the server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub working_dir: PathBuf,
}

/// Spawns the server process.
///
/// Implementations must pipe stdout and stderr, and should kill the child
/// when its handle is dropped.
pub trait Launcher: Send + Sync + 'static {
    /// Spawns the process described by `spec`.
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Child>;
}

/// Runs `spec` as-is with [`tokio::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaLauncher;

impl Launcher for JavaLauncher {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Child> {
        Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}
