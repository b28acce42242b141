//! # ListenerSet: non-blocking fan-out to listeners.
//!
//! ```text
//! Channels.status ──┐
//!                   ├──► forwarder ──► emit(Notification)
//! Channels.players ─┘                     │   (Arc-clone per listener)
//!                                         ├──► [queue L1] ─► worker L1 ─► on_status()/on_chat()/...
//!                                         ├──► [queue L2] ─► worker L2 ─► ...
//!                                         └──► [queue LN] ─► worker LN ─► ...
//! ```
//!
//! ## Rules
//! - `emit()` returns immediately (`try_send`).
//! - Per-listener FIFO; no ordering across listeners.
//! - Overflow drops the notification for that listener only (warn).
//! - A panicking listener is logged and keeps receiving later notifications.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::{select, sync::mpsc, task::JoinHandle};
use tracing::{error, warn};

use super::Listen;
use crate::events::{Channels, PlayerEvent, PlayerEventKind, ServerStatusInformation};

/// What a listener worker delivers.
#[derive(Debug, Clone)]
pub(crate) enum Notification {
    Status(ServerStatusInformation),
    Player(PlayerEvent),
}

struct ListenerChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Notification>>,
}

/// Fan-out over a fixed set of listeners, one worker each.
pub struct ListenerSet {
    channels: Vec<ListenerChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl ListenerSet {
    /// Spawns one worker per listener. Must be called within a tokio runtime.
    #[must_use]
    pub fn new(listeners: Vec<Arc<dyn Listen>>) -> Self {
        let mut channels = Vec::with_capacity(listeners.len());
        let mut workers = Vec::with_capacity(listeners.len());

        for listener in listeners {
            let name = listener.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Notification>>(listener.queue_capacity().max(1));

            let handle = tokio::spawn(async move {
                while let Some(n) = rx.recv().await {
                    let fut = deliver(listener.as_ref(), n.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let any = &*panic;
                        let info = if let Some(msg) = any.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = any.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        error!(listener = name, info = %info, "listener panicked");
                    }
                }
            });
            channels.push(ListenerChannel { name, sender: tx });
            workers.push(handle);
        }
        Self { channels, workers }
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Queues a status notification for every listener.
    pub fn emit_status(&self, info: ServerStatusInformation) {
        self.emit(Arc::new(Notification::Status(info)));
    }

    /// Queues a player event for every listener.
    pub fn emit_player(&self, event: PlayerEvent) {
        self.emit(Arc::new(Notification::Player(event)));
    }

    fn emit(&self, n: Arc<Notification>) {
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&n)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(listener = channel.name, reason = "full", "listener queue overflow");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(listener = channel.name, reason = "closed", "listener queue overflow");
                }
            }
        }
    }

    /// Spawns the forwarder from `channels` into this set.
    ///
    /// The forwarder exits once every sender of `channels` is dropped.
    pub fn attach(self: &Arc<Self>, channels: &Channels) -> JoinHandle<()> {
        let mut status = channels.status.subscribe();
        let mut players = channels.players.subscribe();
        let set = Arc::clone(self);

        tokio::spawn(async move {
            let (mut status_open, mut players_open) = (true, true);
            while status_open || players_open {
                select! {
                    res = status.recv(), if status_open => match res {
                        Ok(info) => set.emit_status(info),
                        Err(RecvError::Lagged(skipped)) => warn!(skipped, "listener forwarder lagged on status"),
                        Err(RecvError::Closed) => status_open = false,
                    },
                    res = players.recv(), if players_open => match res {
                        Ok(event) => set.emit_player(event),
                        Err(RecvError::Lagged(skipped)) => warn!(skipped, "listener forwarder lagged on player events"),
                        Err(RecvError::Closed) => players_open = false,
                    },
                }
            }
        })
    }

    /// Closes every queue and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }
}

async fn deliver(listener: &dyn Listen, n: &Notification) {
    match n {
        Notification::Status(info) => listener.on_status(info).await,
        Notification::Player(event) => match event.kind {
            PlayerEventKind::Chat => listener.on_chat(event).await,
            PlayerEventKind::Join => listener.on_join(event).await,
            PlayerEventKind::Leave => listener.on_leave(event).await,
            PlayerEventKind::Achievement => listener.on_achievement(event).await,
            PlayerEventKind::Death => listener.on_death(event).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ServerStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, s: String) {
            self.seen.lock().unwrap().push(s);
        }
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Listen for Recorder {
        async fn on_status(&self, info: &ServerStatusInformation) {
            self.push(format!("status:{}", info.status.as_label()));
        }
        async fn on_chat(&self, e: &PlayerEvent) {
            self.push(format!("chat:{}:{}", e.player, e.message));
        }
        async fn on_death(&self, e: &PlayerEvent) {
            self.push(format!("death:{}", e.player));
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicky;

    #[async_trait]
    impl Listen for Panicky {
        async fn on_chat(&self, _e: &PlayerEvent) {
            panic!("listener exploded");
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_routes_by_kind() {
        let rec = Arc::new(Recorder::default());
        let set = ListenerSet::new(vec![rec.clone() as Arc<dyn Listen>]);

        set.emit_status(ServerStatusInformation::bare(ServerStatus::BootingUp));
        set.emit_player(PlayerEvent::new(PlayerEventKind::Chat, "Alice", "hello"));
        set.emit_player(PlayerEvent::new(PlayerEventKind::Join, "Bob", "Bob joined the game"));
        set.emit_player(PlayerEvent::new(PlayerEventKind::Death, "Bob", "Bob fell"));
        set.shutdown().await;

        assert_eq!(
            rec.seen(),
            vec!["status:booting_up", "chat:Alice:hello", "death:Bob"]
        );
    }

    #[tokio::test]
    async fn panicking_listener_does_not_affect_others() {
        let rec = Arc::new(Recorder::default());
        let set = ListenerSet::new(vec![Arc::new(Panicky) as Arc<dyn Listen>, rec.clone()]);

        set.emit_player(PlayerEvent::new(PlayerEventKind::Chat, "Alice", "one"));
        set.emit_player(PlayerEvent::new(PlayerEventKind::Chat, "Alice", "two"));
        set.shutdown().await;

        assert_eq!(rec.seen(), vec!["chat:Alice:one", "chat:Alice:two"]);
    }

    #[tokio::test]
    async fn attach_forwards_published_events() {
        let channels = Channels::new(16);
        let rec = Arc::new(Recorder::default());
        let set = Arc::new(ListenerSet::new(vec![rec.clone() as Arc<dyn Listen>]));
        let forwarder = set.attach(&channels);

        channels.status.publish(ServerStatusInformation::bare(ServerStatus::Up));
        channels.publish_player(PlayerEvent::new(PlayerEventKind::Chat, "Alice", "hi"));

        drop(channels);
        forwarder.await.unwrap();
        let set = Arc::try_unwrap(set).ok().expect("forwarder released its handle");
        set.shutdown().await;

        let seen = rec.seen();
        assert!(seen.contains(&"status:up".to_string()));
        assert!(seen.contains(&"chat:Alice:hi".to_string()));
    }
}
