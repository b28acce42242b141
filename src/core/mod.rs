//! Runtime core: process lifecycle and its supporting pieces.
//!
//! The public entry point is [`ServerSupervisor`], built directly or through
//! [`SupervisorBuilder`].
//!
//! Internal modules:
//! - [`supervisor`]: the lifecycle state machine, exit watcher and status poller;
//! - [`session`]: per-boot state and the stdout/stderr pumps;
//! - [`launch`]: spawning the child process;
//! - [`timer`]: the restartable one-shot timer behind idle shutdown;
//! - [`builder`]: wiring of channels, listeners and launcher.

mod builder;
mod launch;
mod session;
mod supervisor;
mod timer;

pub use builder::SupervisorBuilder;
pub use launch::{JavaLauncher, LaunchSpec, Launcher};
pub use supervisor::ServerSupervisor;
pub use timer::CancellableTimer;
