//! Error types used by the supervisor, the RCON client and configuration loading.
//!
//! This module defines:
//!
//! - [`SupervisorError`]: rejected `start`/`stop`/`send_command` operations.
//! - [`RconError`]: failures of the remote-console connection.
//! - [`QueryError`]: failures reported by a [`StatusQuery`](crate::StatusQuery).
//! - [`ConfigError`]: failures loading a [`SupervisorConfig`](crate::SupervisorConfig).
//!
//! Every enum provides `as_label` (a stable snake_case label for logs), and
//! [`RconError::is_retryable`] tells [`RetryLoop`](crate::RetryLoop) whether
//! an attempt may be repeated.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::events::ServerStatus;
use crate::policies::Retryable;

/// # Errors surfaced by the server supervisor.
///
/// Every guard in the lifecycle state machine has its own variant (or its own
/// message, for [`SupervisorError::AlreadyInState`]), so callers can tell a
/// no-op command from a command that lost a race.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The requested transition is a no-op in the current state.
    #[error("{}", already_in_state_message(.status))]
    AlreadyInState {
        /// Status observed when the command was rejected.
        status: ServerStatus,
    },

    /// A pending shutdown was voided by a `start` issued while it was scheduled.
    #[error("Cancelled shutdown, continuing with boot.")]
    CancelledTransition,

    /// An awaited transition did not land where expected because another command intervened.
    #[error("{}", raced_message(.expected, .actual))]
    TransitionRaced {
        /// Final status the interrupted operation was heading for (`Up` for start, `Down` for stop).
        expected: ServerStatus,
        /// Status that was actually reached.
        actual: ServerStatus,
    },

    /// The child process exited before the first successful status query.
    #[error("{}", exited_during_boot_message(.code))]
    ProcessExitedDuringBoot {
        /// Exit code, if the process exited normally (`None` when killed by a signal).
        code: Option<i32>,
    },

    /// The configured server jar does not exist.
    #[error(
        "{} does not exist. Please check the server path and server jar file are correct.",
        .path.display()
    )]
    JarNotFound {
        /// Resolved jar path.
        path: PathBuf,
    },

    /// The child process could not be spawned.
    #[error("failed to spawn server process: {0}")]
    Spawn(#[source] io::Error),

    /// The remote stop command could not be delivered.
    #[error("Something went wrong with the rcon stop command: {0}")]
    RconCommandFailed(#[source] RconError),

    /// No remote-console connection exists for the current session.
    #[error("Server is not running or has no rcon connection.")]
    MissingConnection,

    /// A command round-trip failed.
    #[error(transparent)]
    Rcon(#[from] RconError),
}

fn already_in_state_message(status: &ServerStatus) -> &'static str {
    match status {
        ServerStatus::Down => "Server is already down.",
        ServerStatus::BootingUp => "Server is already booting up.",
        ServerStatus::Up => "Server is already up.",
        ServerStatus::ShuttingDown => "Server is already shutting down.",
        ServerStatus::SchedulingBootup => "Server is already scheduling a boot up.",
        ServerStatus::SchedulingShutdown => "Server is already scheduling a shutdown.",
    }
}

fn raced_message(expected: &ServerStatus, actual: &ServerStatus) -> String {
    match expected {
        ServerStatus::Up => {
            format!("Another command stopped the server from booting up (now {actual}).")
        }
        ServerStatus::Down => {
            format!("Another command stopped the server from shutting down (now {actual}).")
        }
        _ => format!("Another command interrupted the transition to {expected} (now {actual})."),
    }
}

fn exited_during_boot_message(code: &Option<i32>) -> String {
    match *code {
        Some(0) => "Server process shut down during boot up.".to_string(),
        Some(code) => format!("Server process crashed during boot up (exit code {code})."),
        None => "Server process was killed during boot up.".to_string(),
    }
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use mcvisor::{ServerStatus, SupervisorError};
    ///
    /// let err = SupervisorError::AlreadyInState { status: ServerStatus::Up };
    /// assert_eq!(err.as_label(), "already_in_state");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::AlreadyInState { .. } => "already_in_state",
            SupervisorError::CancelledTransition => "cancelled_transition",
            SupervisorError::TransitionRaced { .. } => "transition_raced",
            SupervisorError::ProcessExitedDuringBoot { .. } => "process_exited_during_boot",
            SupervisorError::JarNotFound { .. } => "jar_not_found",
            SupervisorError::Spawn(_) => "spawn_failed",
            SupervisorError::RconCommandFailed(_) => "rcon_command_failed",
            SupervisorError::MissingConnection => "missing_connection",
            SupervisorError::Rcon(e) => e.as_label(),
        }
    }

    /// True when the process exited with code 0 during boot (as opposed to crashing).
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, SupervisorError::ProcessExitedDuringBoot { code: Some(0) })
    }
}

/// # Errors produced by the remote-console client.
///
/// The type is `Clone` because one connect attempt is shared by every caller
/// awaiting it; I/O errors are kept behind an `Arc` for that reason.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RconError {
    /// The server rejected the password (response id `-1`). Never retried.
    #[error("Authentication failed (invalid RCON password)")]
    AuthFailed,

    /// Socket-level failure (connect refused, reset, EOF...).
    #[error("rcon i/o failure: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The peer sent a frame that does not follow the wire format.
    #[error("invalid rcon frame: {reason}")]
    InvalidFrame {
        /// What was wrong with the frame.
        reason: String,
    },

    /// No reply arrived within the configured response timeout.
    #[error("rcon response timed out")]
    Timeout,

    /// There is currently no authenticated socket; a reconnect has been scheduled.
    #[error("rcon socket not connected")]
    NotConnected,

    /// The server answered a command with an empty body where one was required.
    #[error("empty rcon response")]
    EmptyResponse,

    /// The client was destroyed; pending and future operations are abandoned.
    #[error("rcon client destroyed")]
    Destroyed,
}

impl RconError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RconError::AuthFailed => "rcon_auth_failed",
            RconError::Io(_) => "rcon_io",
            RconError::InvalidFrame { .. } => "rcon_invalid_frame",
            RconError::Timeout => "rcon_timeout",
            RconError::NotConnected => "rcon_not_connected",
            RconError::EmptyResponse => "rcon_empty_response",
            RconError::Destroyed => "rcon_destroyed",
        }
    }

    /// Indicates whether another attempt may succeed.
    ///
    /// Returns `false` for [`RconError::AuthFailed`] (a wrong password stays
    /// wrong) and [`RconError::Destroyed`], `true` otherwise.
    ///
    /// # Example
    /// ```
    /// use mcvisor::RconError;
    ///
    /// assert!(RconError::NotConnected.is_retryable());
    /// assert!(!RconError::AuthFailed.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RconError::AuthFailed | RconError::Destroyed)
    }

    pub(crate) fn invalid_frame(reason: impl Into<String>) -> Self {
        RconError::InvalidFrame {
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for RconError {
    fn from(e: io::Error) -> Self {
        RconError::Io(Arc::new(e))
    }
}

impl Retryable for RconError {
    fn is_retryable(&self) -> bool {
        RconError::is_retryable(self)
    }
}

/// Failure of the external status query. Carries only a message: the
/// supervisor treats every failure the same way (no data for that tick).
#[derive(Error, Debug, Clone)]
#[error("status query failed: {reason}")]
pub struct QueryError {
    /// Human-readable reason.
    pub reason: String,
}

impl QueryError {
    /// Creates a query error from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML or has unexpected keys.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "config_io",
            ConfigError::Parse(_) => "config_parse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_in_state_messages_are_distinct_per_status() {
        let statuses = [
            ServerStatus::Down,
            ServerStatus::BootingUp,
            ServerStatus::Up,
            ServerStatus::ShuttingDown,
            ServerStatus::SchedulingBootup,
            ServerStatus::SchedulingShutdown,
        ];
        let mut messages: Vec<String> = statuses
            .iter()
            .map(|s| SupervisorError::AlreadyInState { status: *s }.to_string())
            .collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), statuses.len());
    }

    #[test]
    fn exit_during_boot_distinguishes_clean_exit_from_crash() {
        let clean = SupervisorError::ProcessExitedDuringBoot { code: Some(0) };
        let crash = SupervisorError::ProcessExitedDuringBoot { code: Some(1) };
        assert!(clean.is_clean_exit());
        assert!(!crash.is_clean_exit());
        assert!(clean.to_string().contains("shut down"));
        assert!(crash.to_string().contains("crashed"));
    }

    #[test]
    fn raced_message_names_the_interrupted_direction() {
        let boot = SupervisorError::TransitionRaced {
            expected: ServerStatus::Up,
            actual: ServerStatus::SchedulingShutdown,
        };
        let shutdown = SupervisorError::TransitionRaced {
            expected: ServerStatus::Down,
            actual: ServerStatus::Up,
        };
        assert!(boot.to_string().contains("booting up"));
        assert!(shutdown.to_string().contains("shutting down"));
    }

    #[test]
    fn auth_failure_is_terminal_and_io_is_not() {
        let io = RconError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(io.is_retryable());
        assert!(!RconError::AuthFailed.is_retryable());
        assert_eq!(io.as_label(), "rcon_io");
        assert_eq!(
            SupervisorError::from(RconError::AuthFailed).as_label(),
            "rcon_auth_failed"
        );
    }
}
