//! Published events: payload types and typed broadcast channels.
//!
//! This module groups the **data model** the supervisor publishes and the
//! **channels** used to deliver it. There is one channel per event stream,
//! each carrying a concrete payload type:
//!
//! | channel        | payload                     |
//! |----------------|-----------------------------|
//! | `status`       | [`ServerStatusInformation`] |
//! | `chat`         | [`PlayerEvent`]             |
//! | `join`         | [`PlayerEvent`]             |
//! | `leave`        | [`PlayerEvent`]             |
//! | `achievement`  | [`PlayerEvent`]             |
//! | `death`        | [`PlayerEvent`]             |
//!
//! ## Quick reference
//! - **Publishers**: the supervisor's transition cell (status), the stdout
//!   pump of the current session (player events).
//! - **Consumers**: `ServerSupervisor::subscribe_*` receivers and the
//!   [`ListenerSet`](crate::ListenerSet) forwarder.

mod channel;
mod player;
mod status;

pub use channel::{Channel, Channels};
pub use player::{ChatRelayMessage, PlayerEvent, PlayerEventKind};
pub use status::{ActiveServerInformation, ServerStatus, ServerStatusInformation};
