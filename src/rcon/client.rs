//! # RconClient: authenticated remote-console connection.
//!
//! ```text
//! connect() ──► connect RetryLoop ──► open(): TCP connect ─► AUTH ─► store socket
//!                                            id == -1 ─► AuthFailed (terminal, remembered)
//!
//! send_command(text)
//!   ├─ password rejected earlier ─► Err(AuthFailed), no reconnect
//!   ├─ lock socket (one request in flight; later callers queue on the lock)
//!   ├─ no socket ─► kick background reconnect, Err(NotConnected)
//!   ├─ write COMMAND(id) ─► read until reply.id == id (bounded by response_timeout)
//!   └─ failure ─► drop socket, kick background reconnect, Err(e)
//!
//! send_stop() ──► stop RetryLoop ──► send_command("stop") until the reply is non-empty
//! destroy()   ──► cancel both loops, drop socket (idempotent)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::packet::RconPacket;
use crate::error::RconError;
use crate::policies::{RetryLoop, RetryPolicy};

/// Where and how to authenticate.
#[derive(Clone, PartialEq, Eq)]
pub struct RconSettings {
    /// Host name or address of the game server.
    pub host: String,
    /// `rcon.port` from `server.properties`.
    pub port: u16,
    /// `rcon.password` from `server.properties`.
    pub password: String,
}

impl std::fmt::Debug for RconSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Retry and timeout tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RconOptions {
    /// Policy for the (re)connect loop.
    pub retry: RetryPolicy,
    /// Policy for [`RconClient::send_stop`].
    pub stop_retry: RetryPolicy,
    /// Maximum wait for a single reply.
    pub response_timeout: Duration,
}

impl Default for RconOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            stop_retry: RetryPolicy::default().with_max_attempts(20),
            response_timeout: Duration::from_secs(10),
        }
    }
}

struct Link {
    settings: RconSettings,
    response_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
    next_id: AtomicI32,
    auth_rejected: AtomicBool,
    destroyed: CancellationToken,
}

impl Link {
    /// Positive ids only; `-1` is reserved for auth failures.
    fn next_id(&self) -> i32 {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(if n >= i32::MAX - 1 { 1 } else { n + 1 })
            })
            .unwrap_or_else(|prev| prev)
    }

    async fn open(&self) -> Result<(), RconError> {
        if self.destroyed.is_cancelled() {
            return Err(RconError::Destroyed);
        }
        if self.auth_rejected.load(Ordering::Acquire) {
            return Err(RconError::AuthFailed);
        }
        if self.stream.lock().await.is_some() {
            return Ok(());
        }

        let addr = (self.settings.host.as_str(), self.settings.port);
        let mut stream = select! {
            res = TcpStream::connect(addr) => res?,
            _ = self.destroyed.cancelled() => return Err(RconError::Destroyed),
        };
        stream.set_nodelay(true)?;

        let id = self.next_id();
        select! {
            res = time::timeout(self.response_timeout, self.authenticate(&mut stream, id)) => {
                res.unwrap_or(Err(RconError::Timeout))?
            }
            _ = self.destroyed.cancelled() => return Err(RconError::Destroyed),
        }

        let mut slot = self.stream.lock().await;
        if self.destroyed.is_cancelled() {
            return Err(RconError::Destroyed);
        }
        *slot = Some(stream);
        info!(host = %self.settings.host, port = self.settings.port, "rcon connected");
        Ok(())
    }

    async fn authenticate(&self, stream: &mut TcpStream, id: i32) -> Result<(), RconError> {
        RconPacket::new(id, RconPacket::AUTH, self.settings.password.as_str())
            .write_to(stream)
            .await?;
        loop {
            let reply = RconPacket::read_from(stream).await?;
            if reply.request_id == -1 {
                self.auth_rejected.store(true, Ordering::Release);
                warn!(host = %self.settings.host, port = self.settings.port, "rcon password rejected");
                return Err(RconError::AuthFailed);
            }
            if reply.request_id == id && reply.packet_type == RconPacket::AUTH_RESPONSE {
                return Ok(());
            }
            trace!(request_id = reply.request_id, "skipping packet before auth response");
        }
    }

    async fn exchange(
        &self,
        connect: &RetryLoop<(), RconError>,
        command: &str,
    ) -> Result<String, RconError> {
        if self.destroyed.is_cancelled() {
            return Err(RconError::Destroyed);
        }
        if self.auth_rejected.load(Ordering::Acquire) {
            return Err(RconError::AuthFailed);
        }
        let mut slot = self.stream.lock().await;
        let Some(stream) = slot.as_mut() else {
            drop(slot);
            kick_reconnect(connect);
            return Err(RconError::NotConnected);
        };

        let packet = RconPacket::new(self.next_id(), RconPacket::COMMAND, command);
        let res = select! {
            res = time::timeout(self.response_timeout, round_trip(stream, &packet)) => {
                res.unwrap_or(Err(RconError::Timeout))
            }
            _ = self.destroyed.cancelled() => Err(RconError::Destroyed),
        };

        if let Err(e) = &res {
            *slot = None;
            drop(slot);
            if !matches!(e, RconError::Destroyed) {
                warn!(error = %e, label = e.as_label(), "rcon command failed, reconnecting");
                kick_reconnect(connect);
            }
        }
        res
    }
}

async fn round_trip(stream: &mut TcpStream, packet: &RconPacket) -> Result<String, RconError> {
    packet.write_to(stream).await?;
    loop {
        let reply = RconPacket::read_from(stream).await?;
        if reply.request_id == packet.request_id {
            return Ok(reply.body);
        }
        trace!(
            expected = packet.request_id,
            got = reply.request_id,
            "skipping uncorrelated rcon packet"
        );
    }
}

fn kick_reconnect(connect: &RetryLoop<(), RconError>) {
    if connect.is_cancelled() {
        return;
    }
    let connect = connect.clone();
    tokio::spawn(async move {
        let _ = connect.run().await;
    });
}

/// Remote-console client for one server session.
///
/// Commands are serialized internally: at most one request is on the wire at a
/// time and concurrent callers wait their turn.
pub struct RconClient {
    link: Arc<Link>,
    connect_loop: RetryLoop<(), RconError>,
    stop_loop: RetryLoop<String, RconError>,
}

impl RconClient {
    /// Creates a disconnected client. Nothing happens until [`RconClient::connect`].
    pub fn new(settings: RconSettings, options: RconOptions) -> Self {
        let link = Arc::new(Link {
            settings,
            response_timeout: options.response_timeout,
            stream: Mutex::new(None),
            next_id: AtomicI32::new(1),
            auth_rejected: AtomicBool::new(false),
            destroyed: CancellationToken::new(),
        });

        let connect_loop = {
            let link = Arc::clone(&link);
            RetryLoop::new("rcon-connect", options.retry, move || {
                let link = Arc::clone(&link);
                async move { link.open().await }
            })
        };

        let stop_loop = {
            let link = Arc::clone(&link);
            let connect = connect_loop.clone();
            RetryLoop::new("rcon-stop", options.stop_retry, move || {
                let link = Arc::clone(&link);
                let connect = connect.clone();
                async move {
                    let body = link.exchange(&connect, "stop").await?;
                    if body.trim().is_empty() {
                        return Err(RconError::EmptyResponse);
                    }
                    Ok(body)
                }
            })
        };

        Self {
            link,
            connect_loop,
            stop_loop,
        }
    }

    /// Settings this client authenticates with.
    pub fn settings(&self) -> &RconSettings {
        &self.link.settings
    }

    /// Connects and authenticates, retrying transient failures.
    ///
    /// Resolves immediately when already connected. Fails with
    /// [`RconError::AuthFailed`] on a wrong password and with
    /// [`RconError::Destroyed`] when the client is destroyed meanwhile.
    pub async fn connect(&self) -> Result<(), RconError> {
        self.connect_loop
            .run()
            .await
            .into_result(|| RconError::Destroyed)
    }

    /// Sends one command and returns the reply body.
    pub async fn send_command(&self, command: &str) -> Result<String, RconError> {
        self.link.exchange(&self.connect_loop, command).await
    }

    /// Sends `stop` until the server acknowledges it with a non-empty reply.
    pub async fn send_stop(&self) -> Result<String, RconError> {
        self.stop_loop
            .run()
            .await
            .into_result(|| RconError::Destroyed)
    }

    /// Cancels pending retries and closes the socket. Idempotent.
    pub fn destroy(&self) {
        if self.link.destroyed.is_cancelled() {
            return;
        }
        self.link.destroyed.cancel();
        self.connect_loop.cancel();
        self.stop_loop.cancel();
        if let Ok(mut slot) = self.link.stream.try_lock() {
            slot.take();
        }
        debug!(port = self.link.settings.port, "rcon client destroyed");
    }

    /// True once [`RconClient::destroy`] was called.
    pub fn is_destroyed(&self) -> bool {
        self.link.destroyed.is_cancelled()
    }
}

impl Drop for RconClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for RconClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconClient")
            .field("settings", &self.link.settings)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
