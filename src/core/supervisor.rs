//! # ServerSupervisor: lifecycle state machine of one game server.
//!
//! The supervisor owns the child process, one [`RconClient`] per session, the
//! idle-shutdown timer, and the event channels. Status changes happen only in
//! [`Inner::set_status`], under the state lock, so every observer sees
//! transitions in the order they happened.
//!
//! ## Transitions
//! ```text
//! start():
//!   BootingUp | SchedulingBootup | Up ─► Err(AlreadyInState)
//!   SchedulingShutdown               ─► BootingUp, Err(CancelledTransition)   (pending stop is void)
//!   ShuttingDown                     ─► SchedulingBootup, wait ─► Down? boot : Err(TransitionRaced)
//!   Down                             ─► boot
//!
//! boot:
//!   BootingUp ─► launch ─► spawn pumps, exit watcher, status poller
//!             └─► wait for next status: Up ─► Ok
//!                                       Down ─► Err(ProcessExitedDuringBoot{code})
//!                                       other ─► Err(TransitionRaced)
//!
//! stop():
//!   Down | ShuttingDown | SchedulingShutdown ─► Err(AlreadyInState)
//!   BootingUp ─► SchedulingShutdown, wait ─► Up? continue : Err(TransitionRaced)
//!   Up | SchedulingBootup ─► ShuttingDown ─► rcon stop (retried) ─► wait for Down
//! ```
//!
//! The flips `SchedulingBootup → Down` and `SchedulingShutdown → Up` only
//! reach the internal transition channel that waiting operations watch; the
//! public status channel never sees them.
//!
//! ## Background tasks per session
//! ```text
//! watch_exit   child.wait() ─► exit code ─► close session ─► Down
//! poll_status  rcon.connect() ─► every status_interval: query
//!                 first success while BootingUp/SchedulingShutdown ─► Up
//!                 later results while Up ─► re-publish Up (+ idle timer)
//! stdout/err   see session pumps
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::process::Child;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use super::launch::Launcher;
use super::session::{self, Session};
use super::timer::CancellableTimer;
use crate::config::SupervisorConfig;
use crate::error::{RconError, SupervisorError};
use crate::events::{
    ActiveServerInformation, Channels, ChatRelayMessage, PlayerEvent, ServerStatus,
    ServerStatusInformation,
};
use crate::output::LogBuffer;
use crate::properties::ServerProperties;
use crate::rcon::{RconClient, RconSettings};
use crate::status::{QueryRef, QueryResult};
use crate::subscribers::ListenerSet;

const TRANSITION_CAPACITY: usize = 64;

struct State {
    status: ServerStatus,
    /// Last status sent on the public channel.
    published: ServerStatus,
    info: Option<ActiveServerInformation>,
    session: Option<Session>,
}

pub(crate) struct Inner {
    cfg: SupervisorConfig,
    query: QueryRef,
    launcher: Arc<dyn Launcher>,
    channels: Channels,
    transitions: broadcast::Sender<ServerStatus>,
    state: Mutex<State>,
    idle: Option<CancellableTimer>,
    logs: Arc<Mutex<LogBuffer>>,
    sessions: AtomicU64,
    _listeners: Option<Arc<ListenerSet>>,
}

/// Receiver for the next status change after a transition was applied.
struct TransitionWatch {
    rx: broadcast::Receiver<ServerStatus>,
    from: ServerStatus,
}

/// Held by a caller waiting in an intent state (`SchedulingBootup` or
/// `SchedulingShutdown`). If the caller goes away before its wait ends, the
/// intent is withdrawn, or the status the intent flipped back to is published.
struct PendingIntent<'a> {
    inner: &'a Inner,
    intent: ServerStatus,
    fallback: ServerStatus,
    armed: bool,
}

impl<'a> PendingIntent<'a> {
    fn new(inner: &'a Inner, intent: ServerStatus, fallback: ServerStatus) -> Self {
        Self {
            inner,
            intent,
            fallback,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingIntent<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut st = self.inner.lock_state();
        if st.status == self.intent {
            info!(intent = self.intent.as_label(), "waiter dropped, withdrawing intent");
            self.inner.set_status(&mut st, self.fallback, None);
        } else if st.published == self.intent {
            debug!(status = st.status.as_label(), "publishing unobserved internal transition");
            self.inner.publish(&mut st);
        }
    }
}

/// Manages the lifecycle of one game server process.
///
/// Cheap to clone; clones drive the same server. Build it with
/// [`SupervisorBuilder`](crate::SupervisorBuilder) or [`ServerSupervisor::new`].
#[derive(Clone)]
pub struct ServerSupervisor {
    inner: Arc<Inner>,
}

impl ServerSupervisor {
    /// Supervisor with the default [`JavaLauncher`](crate::JavaLauncher) and no listeners.
    pub fn new(cfg: SupervisorConfig, query: QueryRef) -> Self {
        Self::builder(cfg, query).build()
    }

    /// Starts a [`SupervisorBuilder`](crate::SupervisorBuilder).
    pub fn builder(cfg: SupervisorConfig, query: QueryRef) -> super::SupervisorBuilder {
        super::SupervisorBuilder::new(cfg, query)
    }

    pub(crate) fn from_parts(
        cfg: SupervisorConfig,
        query: QueryRef,
        launcher: Arc<dyn Launcher>,
        channels: Channels,
        listeners: Option<Arc<ListenerSet>>,
    ) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let idle = cfg.idle_shutdown.map(|delay| idle_timer(weak.clone(), delay));
            Inner {
                cfg,
                query,
                launcher,
                channels,
                transitions,
                state: Mutex::new(State {
                    status: ServerStatus::Down,
                    published: ServerStatus::Down,
                    info: None,
                    session: None,
                }),
                idle,
                logs: Arc::new(Mutex::new(LogBuffer::default())),
                sessions: AtomicU64::new(0),
                _listeners: listeners,
            }
        });
        Self { inner }
    }

    /// Boots the server.
    ///
    /// Resolves once the first status query succeeds. See the module docs for
    /// how a call interacts with a transition already in flight.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let watch = {
            let mut st = self.inner.lock_state();
            match st.status {
                status @ (ServerStatus::BootingUp | ServerStatus::SchedulingBootup | ServerStatus::Up) => {
                    return Err(SupervisorError::AlreadyInState { status });
                }
                ServerStatus::SchedulingShutdown => {
                    info!("start requested while a shutdown was scheduled, cancelling the shutdown");
                    self.inner.set_status(&mut st, ServerStatus::BootingUp, None);
                    return Err(SupervisorError::CancelledTransition);
                }
                ServerStatus::ShuttingDown => {
                    info!("waiting for shutdown to complete before starting");
                    Some(self.inner.transition(&mut st, ServerStatus::SchedulingBootup))
                }
                ServerStatus::Down => None,
            }
        };

        if let Some(watch) = watch {
            let pending = PendingIntent::new(
                &self.inner,
                ServerStatus::SchedulingBootup,
                ServerStatus::ShuttingDown,
            );
            let reached = self.inner.wait(watch, &[]).await;
            pending.disarm();
            if reached != ServerStatus::Down {
                return Err(SupervisorError::TransitionRaced {
                    expected: ServerStatus::Up,
                    actual: reached,
                });
            }
        }
        Arc::clone(&self.inner).boot().await
    }

    /// Shuts the server down through RCON and waits for the process to exit.
    pub async fn stop(&self) -> Result<String, SupervisorError> {
        let watch = {
            let mut st = self.inner.lock_state();
            match st.status {
                status @ (ServerStatus::Down
                | ServerStatus::ShuttingDown
                | ServerStatus::SchedulingShutdown) => {
                    return Err(SupervisorError::AlreadyInState { status });
                }
                ServerStatus::BootingUp => {
                    info!("stop requested during boot, shutting down once boot completes");
                    Some(self.inner.transition(&mut st, ServerStatus::SchedulingShutdown))
                }
                ServerStatus::Up | ServerStatus::SchedulingBootup => None,
            }
        };

        if let Some(watch) = watch {
            let pending = PendingIntent::new(
                &self.inner,
                ServerStatus::SchedulingShutdown,
                ServerStatus::BootingUp,
            );
            let reached = self.inner.wait(watch, &[]).await;
            pending.disarm();
            if reached != ServerStatus::Up {
                return Err(SupervisorError::TransitionRaced {
                    expected: ServerStatus::Down,
                    actual: reached,
                });
            }
        }

        let (rcon, session_id, watch) = {
            let mut st = self.inner.lock_state();
            if !matches!(st.status, ServerStatus::Up | ServerStatus::SchedulingBootup) {
                return Err(SupervisorError::TransitionRaced {
                    expected: ServerStatus::Down,
                    actual: st.status,
                });
            }
            let Some((rcon, id)) = st
                .session
                .as_ref()
                .and_then(|s| s.rcon.clone().map(|r| (r, s.id)))
            else {
                return Err(SupervisorError::MissingConnection);
            };
            (rcon, id, self.inner.transition(&mut st, ServerStatus::ShuttingDown))
        };

        info!(session = session_id, "sending stop command");
        match rcon.send_stop().await {
            Ok(reply) => debug!(session = session_id, reply = %reply.trim(), "stop acknowledged"),
            Err(RconError::Destroyed) => {
                debug!(session = session_id, "rcon closed before stop was acknowledged");
            }
            Err(e) => {
                warn!(session = session_id, error = %e, label = e.as_label(), "stop command failed");
                let mut st = self.inner.lock_state();
                let same_session = st.session.as_ref().is_some_and(|s| s.id == session_id);
                if same_session
                    && matches!(st.status, ServerStatus::ShuttingDown | ServerStatus::SchedulingBootup)
                {
                    self.inner.set_status(&mut st, ServerStatus::Up, None);
                }
                return Err(SupervisorError::RconCommandFailed(e));
            }
        }

        match self.inner.wait(watch, &[ServerStatus::SchedulingBootup]).await {
            ServerStatus::Down => Ok("Server successfully shut down.".to_string()),
            actual => Err(SupervisorError::TransitionRaced {
                expected: ServerStatus::Down,
                actual,
            }),
        }
    }

    /// Sends a console command through RCON and returns the reply.
    pub async fn send_command(&self, command: &str) -> Result<String, SupervisorError> {
        let rcon = self.inner.rcon().ok_or(SupervisorError::MissingConnection)?;
        Ok(rcon.send_command(command).await?)
    }

    /// Shows a chat message from an external platform to every player.
    ///
    /// Best-effort: does nothing without an RCON connection and swallows errors.
    pub async fn relay_chat_message(&self, msg: &ChatRelayMessage) {
        let Some(rcon) = self.inner.rcon() else {
            trace!("no rcon connection, chat relay dropped");
            return;
        };
        if let Err(e) = rcon.send_command(&msg.to_tellraw()).await {
            debug!(error = %e, label = e.as_label(), "chat relay failed");
        }
    }

    /// True while the server is `Up`.
    pub fn is_running(&self) -> bool {
        self.inner.lock_state().status == ServerStatus::Up
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> ServerStatusInformation {
        let st = self.inner.lock_state();
        ServerStatusInformation {
            status: st.status,
            active_server_information: st.info.clone(),
        }
    }

    /// Up to `n` most recent console lines, oldest first.
    pub fn recent_logs(&self, n: usize) -> Vec<String> {
        self.inner
            .logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent(n)
    }

    /// Configuration in use.
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.cfg
    }

    /// Status transitions (and periodic `Up` refreshes).
    pub fn subscribe_status(&self) -> broadcast::Receiver<ServerStatusInformation> {
        self.inner.channels.status.subscribe()
    }

    /// Chat messages.
    pub fn subscribe_chat(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.channels.chat.subscribe()
    }

    /// Player joins.
    pub fn subscribe_join(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.channels.join.subscribe()
    }

    /// Player leaves.
    pub fn subscribe_leave(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.channels.leave.subscribe()
    }

    /// Advancements and achievements.
    pub fn subscribe_achievement(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.channels.achievement.subscribe()
    }

    /// Death messages.
    pub fn subscribe_death(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.channels.death.subscribe()
    }
}

impl std::fmt::Debug for ServerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSupervisor")
            .field("status", &self.inner.lock_state().status)
            .field("server_path", &self.inner.cfg.server_path)
            .finish()
    }
}

fn idle_timer(weak: Weak<Inner>, delay: std::time::Duration) -> CancellableTimer {
    CancellableTimer::new(delay, move || {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let sup = ServerSupervisor { inner };
        tokio::spawn(async move {
            info!(
                minutes = delay.as_secs() / 60,
                "server has been empty for the idle period, shutting down"
            );
            if let Err(e) = sup.stop().await {
                warn!(error = %e, label = e.as_label(), "idle shutdown did not stop the server");
            }
        });
    })
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rcon(&self) -> Option<Arc<RconClient>> {
        self.lock_state()
            .session
            .as_ref()
            .and_then(|s| s.rcon.clone())
    }

    /// Applies a status change. The only place that writes `State::status`.
    fn set_status(&self, st: &mut State, status: ServerStatus, query: Option<&QueryResult>) {
        let previous = st.status;
        st.status = status;
        let _ = self.transitions.send(status);

        if ServerStatus::is_internal_flip(previous, status) {
            st.info = None;
            debug!(from = previous.as_label(), to = status.as_label(), "internal transition");
            return;
        }

        if let Some(timer) = &self.idle {
            match query {
                Some(q) if q.numplayers == 0 => timer.start(),
                _ => timer.cancel(),
            }
        }
        if previous != status {
            info!(from = previous.as_label(), to = status.as_label(), "server status changed");
        }

        st.info = query.map(ActiveServerInformation::from);
        self.publish(st);
    }

    fn publish(&self, st: &mut State) {
        st.published = st.status;
        self.channels.status.publish(ServerStatusInformation {
            status: st.status,
            active_server_information: st.info.clone(),
        });
    }

    /// Applies `status` and returns a watch for the change after it.
    fn transition(&self, st: &mut State, status: ServerStatus) -> TransitionWatch {
        let rx = self.transitions.subscribe();
        self.set_status(st, status, None);
        TransitionWatch { rx, from: status }
    }

    /// Next status different from the watch's origin, ignoring `skip`.
    async fn wait(&self, mut watch: TransitionWatch, skip: &[ServerStatus]) -> ServerStatus {
        let wanted = |s: ServerStatus| s != watch.from && !skip.contains(&s);
        loop {
            match watch.rx.recv().await {
                Ok(s) if wanted(s) => return s,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "transition watch lagged");
                    let now = self.lock_state().status;
                    if wanted(now) {
                        return now;
                    }
                }
                Err(RecvError::Closed) => return ServerStatus::Down,
            }
        }
    }

    async fn boot(self: Arc<Self>) -> Result<(), SupervisorError> {
        let (watch, id) = {
            let mut st = self.lock_state();
            if st.status != ServerStatus::Down {
                return Err(SupervisorError::AlreadyInState { status: st.status });
            }
            let id = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
            (self.transition(&mut st, ServerStatus::BootingUp), id)
        };

        let exit_rx = match Arc::clone(&self).launch(id).await {
            Ok(rx) => rx,
            Err(e) => {
                error!(session = id, error = %e, label = e.as_label(), "server failed to launch");
                let mut st = self.lock_state();
                if matches!(st.status, ServerStatus::BootingUp | ServerStatus::SchedulingShutdown) {
                    self.set_status(&mut st, ServerStatus::Down, None);
                }
                return Err(e);
            }
        };

        match self.wait(watch, &[]).await {
            ServerStatus::Up => Ok(()),
            ServerStatus::Down => {
                let mut exit_rx = exit_rx;
                Err(SupervisorError::ProcessExitedDuringBoot {
                    code: exit_rx.try_recv().ok().flatten(),
                })
            }
            actual => Err(SupervisorError::TransitionRaced {
                expected: ServerStatus::Up,
                actual,
            }),
        }
    }

    /// Spawns the process and its session tasks. Returns the exit-code receiver.
    async fn launch(
        self: Arc<Self>,
        id: u64,
    ) -> Result<oneshot::Receiver<Option<i32>>, SupervisorError> {
        let jar = self.cfg.jar_path();
        if !tokio::fs::try_exists(&jar).await.unwrap_or(false) {
            return Err(SupervisorError::JarNotFound { path: jar });
        }

        let rcon = self
            .rcon_settings()
            .await
            .map(|settings| Arc::new(RconClient::new(settings, self.cfg.rcon)));

        let spec = self.cfg.launch_spec();
        let mut child = self.launcher.launch(&spec).map_err(SupervisorError::Spawn)?;
        info!(
            session = id,
            pid = ?child.id(),
            program = %spec.program,
            args = ?spec.args,
            "server process spawned"
        );

        if let Some(stdout) = child.stdout.take() {
            session::spawn_stdout_pump(stdout, id, self.channels.clone(), Arc::clone(&self.logs));
        }
        if let Some(stderr) = child.stderr.take() {
            session::spawn_stderr_pump(stderr, id);
        }

        let session = Session::new(id, rcon);
        self.lock_state().session = Some(session.clone());

        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(Arc::clone(&self).watch_exit(id, child, exit_tx));
        tokio::spawn(self.poll_status(session));
        Ok(exit_rx)
    }

    async fn rcon_settings(&self) -> Option<RconSettings> {
        let props = match ServerProperties::load(&self.cfg.server_path).await {
            Ok(props) => props,
            Err(e) => {
                warn!(error = %e, "could not read server.properties, rcon disabled");
                return None;
            }
        };
        match props.rcon() {
            Some(endpoint) => Some(RconSettings {
                host: self.cfg.host.clone(),
                port: endpoint.port,
                password: endpoint.password,
            }),
            None => {
                warn!(
                    "set enable-rcon=true and a non-empty rcon.password in server.properties; \
                     without rcon the server cannot be stopped or sent commands"
                );
                None
            }
        }
    }

    async fn watch_exit(self: Arc<Self>, id: u64, mut child: Child, exit_tx: oneshot::Sender<Option<i32>>) {
        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                error!(session = id, error = %e, "failed to wait for server process");
                None
            }
        };
        info!(session = id, code = ?code, "server process exited");
        let _ = exit_tx.send(code);

        let mut st = self.lock_state();
        if st.session.as_ref().is_some_and(|s| s.id == id) {
            if let Some(session) = st.session.take() {
                session.close();
            }
            self.set_status(&mut st, ServerStatus::Down, None);
        }
    }

    async fn poll_status(self: Arc<Self>, session: Session) {
        if let Some(rcon) = &session.rcon {
            tokio::select! {
                res = rcon.connect() => {
                    if let Err(e) = res {
                        warn!(session = session.id, error = %e, label = e.as_label(), "rcon unavailable for this session");
                    }
                }
                _ = session.token.cancelled() => return,
            }
        }

        let mut ticker = time::interval(self.cfg.status_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = session.token.cancelled() => return,
            }
            let res = tokio::select! {
                res = self.query.query(&self.cfg.host) => res,
                _ = session.token.cancelled() => return,
            };

            let mut st = self.lock_state();
            if !st.session.as_ref().is_some_and(|s| s.id == session.id) {
                return;
            }
            match (st.status, res) {
                (ServerStatus::BootingUp | ServerStatus::SchedulingShutdown, Ok(q)) => {
                    info!(session = session.id, version = %q.version, "server is up");
                    self.set_status(&mut st, ServerStatus::Up, Some(&q));
                }
                (ServerStatus::Up, Ok(q)) => self.set_status(&mut st, ServerStatus::Up, Some(&q)),
                (ServerStatus::Up, Err(e)) => {
                    debug!(session = session.id, error = %e, "status query failed");
                    self.set_status(&mut st, ServerStatus::Up, None);
                }
                (status, Err(e)) => {
                    trace!(session = session.id, status = status.as_label(), error = %e, "status query failed");
                }
                (status, Ok(_)) => {
                    trace!(session = session.id, status = status.as_label(), "status result ignored");
                }
            }
        }
    }
}
