//! # Event listeners.
//!
//! [`Listen`] is the consumer-side trait, [`ListenerSet`] the fan-out that feeds
//! every listener from the supervisor's [`Channels`](crate::events::Channels),
//! and [`LogWriter`] a built-in listener that logs everything.
//!
//! ```text
//! ServerSupervisor ── publish ──► Channels ──► ListenerSet forwarder
//!                                                   │
//!                                       ┌───────────┼───────────┐
//!                                       ▼           ▼           ▼
//!                                   LogWriter   ChatBridge    Custom ...
//! ```
//!
//! Consumers that prefer raw streams can use the per-channel
//! `subscribe_*` methods of [`ServerSupervisor`](crate::ServerSupervisor) instead.

mod listen;
mod log;
mod set;

pub use listen::Listen;
pub use log::LogWriter;
pub use set::ListenerSet;
