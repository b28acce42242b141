//! # Typed broadcast channels.
//!
//! [`Channel`] is a thin wrapper around [`tokio::sync::broadcast`] carrying one
//! payload type. [`Channels`] bundles one channel per published stream.
//!
//! ## Architecture
//! ```text
//! Publishers:                          Subscribers (many):
//!   transition cell ──► status ──────► subscribe_status() receivers
//!   stdout pump ──┬──► chat/join/... ► subscribe_chat() ... receivers
//!                 └──► players ──────► ListenerSet forwarder (keeps line order)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits on subscribers.
//! - **Bounded capacity**: each channel keeps the most recent `capacity` items.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` items.
//! - **No persistence**: items published with no receiver attached are dropped.

use tokio::sync::broadcast;

use super::player::{PlayerEvent, PlayerEventKind};
use super::status::ServerStatusInformation;

/// Broadcast channel for one payload type.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Debug)]
pub struct Channel<T> {
    tx: broadcast::Sender<T>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Clone> Channel<T> {
    /// Creates a new channel with the given capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<T>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an item to all current receivers.
    ///
    /// If there are no receivers, the item is dropped.
    pub fn publish(&self, item: T) {
        let _ = self.tx.send(item);
    }

    /// Creates a new receiver that observes items sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One channel per published stream.
#[derive(Clone, Debug)]
pub struct Channels {
    /// Externally visible status transitions.
    pub status: Channel<ServerStatusInformation>,
    /// Chat messages.
    pub chat: Channel<PlayerEvent>,
    /// Players joining.
    pub join: Channel<PlayerEvent>,
    /// Players leaving.
    pub leave: Channel<PlayerEvent>,
    /// Advancements and achievements.
    pub achievement: Channel<PlayerEvent>,
    /// Deaths.
    pub death: Channel<PlayerEvent>,
    /// Every player event in console order, for consumers that need ordering across kinds.
    pub players: Channel<PlayerEvent>,
}

impl Channels {
    /// Creates all channels with the same capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            status: Channel::new(capacity),
            chat: Channel::new(capacity),
            join: Channel::new(capacity),
            leave: Channel::new(capacity),
            achievement: Channel::new(capacity),
            death: Channel::new(capacity),
            players: Channel::new(capacity),
        }
    }

    /// Returns the channel dedicated to `kind`.
    pub fn player(&self, kind: PlayerEventKind) -> &Channel<PlayerEvent> {
        match kind {
            PlayerEventKind::Chat => &self.chat,
            PlayerEventKind::Join => &self.join,
            PlayerEventKind::Leave => &self.leave,
            PlayerEventKind::Achievement => &self.achievement,
            PlayerEventKind::Death => &self.death,
        }
    }

    /// Publishes a player event on its own channel and on `players`.
    pub fn publish_player(&self, event: PlayerEvent) {
        self.player(event.kind).publish(event.clone());
        self.players.publish(event);
    }
}
