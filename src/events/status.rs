//! # Server status model.
//!
//! [`ServerStatus`] is the single current state of the lifecycle state machine.
//! [`ServerStatusInformation`] is what gets published on every externally
//! visible transition, optionally carrying [`ActiveServerInformation`] from the
//! last successful status query.
//!
//! ## States
//! ```text
//!   Down ──► BootingUp ──► Up ──► ShuttingDown ──► Down
//!              │    ▲                 │    ▲
//!   stop() ────┘    │ start()         │    │ stop()
//!              ▼    │                 ▼    │
//!       SchedulingShutdown      SchedulingBootup ◄── start()
//! ```
//! The two `Scheduling*` states are intent states: a command received while
//! the opposite transition is still in flight.

use std::fmt;

use serde::Serialize;

use crate::status::QueryResult;

/// Lifecycle state of the managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// No process is running.
    Down,
    /// The process was spawned; waiting for the first successful status query.
    BootingUp,
    /// The server answers status queries.
    Up,
    /// A stop command was delivered; waiting for the process to exit.
    ShuttingDown,
    /// A start arrived while shutting down; boot follows once the process exits.
    SchedulingBootup,
    /// A stop arrived while booting; shutdown follows once boot completes.
    SchedulingShutdown,
}

impl ServerStatus {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServerStatus::Down => "down",
            ServerStatus::BootingUp => "booting_up",
            ServerStatus::Up => "up",
            ServerStatus::ShuttingDown => "shutting_down",
            ServerStatus::SchedulingBootup => "scheduling_bootup",
            ServerStatus::SchedulingShutdown => "scheduling_shutdown",
        }
    }

    /// True for the flips that resolve an intent state back into its
    /// underlying state (`SchedulingBootup → Down`, `SchedulingShutdown → Up`).
    ///
    /// These are only visible to waiting transitions, never to listeners.
    pub(crate) fn is_internal_flip(from: ServerStatus, to: ServerStatus) -> bool {
        matches!(
            (from, to),
            (ServerStatus::SchedulingBootup, ServerStatus::Down)
                | (ServerStatus::SchedulingShutdown, ServerStatus::Up)
        )
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ServerStatus::Down => "down",
            ServerStatus::BootingUp => "booting up",
            ServerStatus::Up => "up",
            ServerStatus::ShuttingDown => "shutting down",
            ServerStatus::SchedulingBootup => "scheduling boot up",
            ServerStatus::SchedulingShutdown => "scheduling shutdown",
        };
        f.write_str(text)
    }
}

/// Details of a running server, taken from the last successful status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveServerInformation {
    /// Players currently online.
    pub players_active: u32,
    /// Player slots.
    pub max_players: u32,
    /// Names of online players, in the order the query reported them.
    pub player_list: Vec<String>,
    /// Server version string.
    pub version: String,
}

impl From<&QueryResult> for ActiveServerInformation {
    /// Players without a name are left out of `player_list`; the count is
    /// taken from the query as-is.
    fn from(q: &QueryResult) -> Self {
        Self {
            players_active: q.numplayers,
            max_players: q.maxplayers,
            player_list: q.players.iter().filter_map(|p| p.name.clone()).collect(),
            version: q.version.clone(),
        }
    }
}

/// Payload of the `status` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatusInformation {
    /// Status after the transition.
    pub status: ServerStatus,
    /// Present only while `Up` and the last status query succeeded.
    pub active_server_information: Option<ActiveServerInformation>,
}

impl ServerStatusInformation {
    /// Status without any server details.
    pub fn bare(status: ServerStatus) -> Self {
        Self {
            status,
            active_server_information: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::QueryPlayer;

    #[test]
    fn active_information_skips_unnamed_players() {
        let q = QueryResult {
            numplayers: 2,
            maxplayers: 20,
            players: vec![
                QueryPlayer {
                    name: Some("Alice".into()),
                },
                QueryPlayer { name: None },
            ],
            version: "1.21.1".into(),
        };
        let info = ActiveServerInformation::from(&q);
        assert_eq!(info.players_active, 2);
        assert_eq!(info.max_players, 20);
        assert_eq!(info.player_list, vec!["Alice".to_string()]);
        assert_eq!(info.version, "1.21.1");
    }

    #[test]
    fn only_intent_resolutions_are_internal() {
        use ServerStatus::*;
        assert!(ServerStatus::is_internal_flip(SchedulingBootup, Down));
        assert!(ServerStatus::is_internal_flip(SchedulingShutdown, Up));
        assert!(!ServerStatus::is_internal_flip(ShuttingDown, Down));
        assert!(!ServerStatus::is_internal_flip(BootingUp, Up));
        assert!(!ServerStatus::is_internal_flip(SchedulingShutdown, BootingUp));
    }
}
