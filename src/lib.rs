//! # mcvisor
//!
//! **mcvisor** supervises one game server process: it boots and stops it,
//! talks to it over RCON, watches its console output, and publishes what
//! happens as typed events.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   start() / stop() / send_command()
//!                 │
//!                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ServerSupervisor (lifecycle state machine)                       │
//! │  - transition cell (status + internal transition channel)         │
//! │  - Session (per boot: RconClient + cancellation token)            │
//! │  - CancellableTimer (idle shutdown)                               │
//! │  - LogBuffer (recent console lines)                               │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌────────────┐    ┌──────────────┐   ┌──────────────┐
//!  │ watch_exit │    │ poll_status  │   │ stdout pump  │
//!  │ child.wait │    │ StatusQuery  │   │ LogLineParser│
//!  └─────┬──────┘    └──────┬───────┘   └──────┬───────┘
//!        │ Down             │ Up (+info)       │ chat/join/leave/
//!        ▼                  ▼                  ▼ achievement/death
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                  Channels (tokio broadcast, one per stream)       │
//! └───────────┬───────────────────────────────────────┬───────────────┘
//!             ▼                                       ▼
//!    subscribe_*() receivers                 ListenerSet forwarder
//!                                         ┌─────────┼─────────┐
//!                                         ▼         ▼         ▼
//!                                      worker1  worker2  workerN
//!                                         ▼         ▼         ▼
//!                                      Listen::on_* callbacks
//! ```
//!
//! ### RCON
//! ```text
//! RconClient ──► connect loop (RetryLoop, fixed interval, auth failure is terminal)
//!            ──► send_command: one request at a time, response timeout
//!            ──► send_stop:    RetryLoop, capped attempts, until the server answers
//! ```
//!
//! ## Features
//! | Area             | Description                                              | Key types / traits                           |
//! |------------------|----------------------------------------------------------|----------------------------------------------|
//! | **Supervision**  | Boot, stop and command one server process.               | [`ServerSupervisor`], [`SupervisorBuilder`]  |
//! | **Events**       | Status transitions and player activity.                  | [`ServerStatus`], [`PlayerEvent`], [`Listen`]|
//! | **RCON**         | Remote-console client with reconnect and retry.          | [`RconClient`], [`RconPacket`]               |
//! | **Status query** | Pluggable player-count query.                            | [`StatusQuery`], [`QueryFn`]                 |
//! | **Policies**     | Retry pacing.                                            | [`RetryPolicy`], [`BackoffPolicy`]           |
//! | **Errors**       | Typed errors per concern.                                | [`SupervisorError`], [`RconError`]           |
//! | **Configuration**| Server install, idle shutdown, RCON tuning, TOML loading.| [`SupervisorConfig`]                         |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mcvisor::{
//!     Listen, LogWriter, QueryError, QueryFn, QueryRef, QueryResult, ServerSupervisor,
//!     SupervisorConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = SupervisorConfig::default();
//!     cfg.server_path = "/srv/minecraft".into();
//!     cfg.max_memory = Some("4G".into());
//!     cfg.idle_shutdown = Some(Duration::from_secs(15 * 60));
//!
//!     // Plug in any status query implementation.
//!     let query: QueryRef = QueryFn::arc(|_host: String| async move {
//!         Ok::<_, QueryError>(QueryResult::default())
//!     });
//!
//!     let listeners: Vec<Arc<dyn Listen>> = vec![Arc::new(LogWriter::new())];
//!     let sup = ServerSupervisor::builder(cfg, query)
//!         .with_listeners(listeners)
//!         .build();
//!
//!     sup.start().await?;
//!     println!("{}", sup.send_command("list").await?);
//!     println!("{}", sup.stop().await?);
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod output;
mod policies;
mod properties;
mod rcon;
mod status;
mod subscribers;

// ---- Public re-exports ----

pub use config::SupervisorConfig;
pub use crate::core::{
    CancellableTimer, JavaLauncher, LaunchSpec, Launcher, ServerSupervisor, SupervisorBuilder,
};
pub use error::{ConfigError, QueryError, RconError, SupervisorError};
pub use events::{
    ActiveServerInformation, Channel, Channels, ChatRelayMessage, PlayerEvent, PlayerEventKind,
    ServerStatus, ServerStatusInformation,
};
pub use output::{LogBuffer, LogLineParser};
pub use policies::{
    BackoffPolicy, JitterPolicy, RetryLoop, RetryOutcome, RetryPolicy, Retryable,
};
pub use properties::{DEFAULT_RCON_PORT, RconEndpoint, ServerProperties};
pub use rcon::{RconClient, RconOptions, RconPacket, RconSettings};
pub use status::{QueryFn, QueryPlayer, QueryRef, QueryResult, StatusQuery};
pub use subscribers::{Listen, ListenerSet, LogWriter};
