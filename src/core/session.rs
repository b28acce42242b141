//! Per-boot session plumbing.
//!
//! A [`Session`] exists from a successful spawn until the process exits. It
//! owns that lifetime's RCON client and a cancellation token for the
//! background tasks tied to it (status poller).
//!
//! ```text
//! child.stdout ─► lines ─┬─► tracing (info, target mcvisor::server)
//!                        ├─► LogBuffer
//!                        └─► LogLineParser ─► Channels::publish_player
//! child.stderr ─► lines ───► tracing (warn, target mcvisor::server)
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::events::Channels;
use crate::output::{LogBuffer, LogLineParser};
use crate::rcon::RconClient;

#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub(crate) id: u64,
    pub(crate) rcon: Option<Arc<RconClient>>,
    pub(crate) token: CancellationToken,
}

impl Session {
    pub(crate) fn new(id: u64, rcon: Option<Arc<RconClient>>) -> Self {
        Self {
            id,
            rcon,
            token: CancellationToken::new(),
        }
    }

    /// Stops the session's background tasks and tears down its RCON client.
    pub(crate) fn close(&self) {
        self.token.cancel();
        if let Some(rcon) = &self.rcon {
            rcon.destroy();
        }
    }
}

/// Reads stdout until EOF, feeding the log, the buffer and the parser.
pub(crate) fn spawn_stdout_pump<R>(
    stdout: R,
    session: u64,
    channels: Channels,
    logs: Arc<Mutex<LogBuffer>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut parser = LogLineParser::new();
        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(session, error = %e, "failed to read server stdout");
                    break;
                }
            };
            info!(target: "mcvisor::server", "{line}");
            logs.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(line.as_str());
            if let Some(event) = parser.parse_line(&line) {
                trace!(session, kind = event.kind.as_label(), player = %event.player, "player event");
                channels.publish_player(event);
            }
        }
        trace!(session, "stdout closed");
    })
}

/// Reads stderr until EOF, logging each line.
pub(crate) fn spawn_stderr_pump<R>(stderr: R, session: u64) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            warn!(target: "mcvisor::server", "{line}");
        }
        trace!(session, "stderr closed");
    })
}
