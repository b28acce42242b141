//! # LogWriter: renders supervisor events through `tracing`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO mcvisor::events: server status status=booting_up
//! INFO mcvisor::events: server status status=up players=1 max_players=20 version="1.21.1"
//! INFO mcvisor::events: player event kind=join player="Bob" message="Bob joined the game"
//! INFO mcvisor::events: player event kind=chat player="Bob" message="hi"
//! ```

use async_trait::async_trait;
use tracing::info;

use super::Listen;
use crate::events::{PlayerEvent, ServerStatusInformation};

/// Listener that logs every status and player event at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn player(&self, e: &PlayerEvent) {
        info!(
            target: "mcvisor::events",
            kind = e.kind.as_label(),
            player = %e.player,
            message = %e.message,
            "player event"
        );
    }
}

#[async_trait]
impl Listen for LogWriter {
    async fn on_status(&self, s: &ServerStatusInformation) {
        match &s.active_server_information {
            Some(a) => info!(
                target: "mcvisor::events",
                status = s.status.as_label(),
                players = a.players_active,
                max_players = a.max_players,
                version = %a.version,
                "server status"
            ),
            None => info!(target: "mcvisor::events", status = s.status.as_label(), "server status"),
        }
    }

    async fn on_chat(&self, e: &PlayerEvent) {
        self.player(e);
    }

    async fn on_join(&self, e: &PlayerEvent) {
        self.player(e);
    }

    async fn on_leave(&self, e: &PlayerEvent) {
        self.player(e);
    }

    async fn on_achievement(&self, e: &PlayerEvent) {
        self.player(e);
    }

    async fn on_death(&self, e: &PlayerEvent) {
        self.player(e);
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
