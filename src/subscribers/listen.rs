//! # Listener trait.
//!
//! [`Listen`] is the extension point for consumers of supervisor events (a chat
//! bridge, a status display, a webhook poster). Each listener is driven by a
//! dedicated worker fed by a bounded queue owned by the
//! [`ListenerSet`](crate::ListenerSet).
//!
//! ## Contract
//! - Every method has a no-op default; implement only what you consume.
//! - Implementations may be slow. They block neither the supervisor nor other listeners.
//! - Each listener sees status and player events in publication order.
//! - On queue overflow the event is dropped for that listener only (warn).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use mcvisor::{Listen, PlayerEvent};
//!
//! struct ChatBridge;
//!
//! #[async_trait]
//! impl Listen for ChatBridge {
//!     async fn on_chat(&self, event: &PlayerEvent) {
//!         let _line = format!("<{}> {}", event.player, event.message);
//!     }
//!     fn name(&self) -> &'static str { "chat-bridge" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{PlayerEvent, ServerStatusInformation};

/// Consumer of supervisor events.
#[async_trait]
pub trait Listen: Send + Sync + 'static {
    /// Externally visible status transition (and periodic `Up` refreshes).
    async fn on_status(&self, _info: &ServerStatusInformation) {}

    /// Chat line.
    async fn on_chat(&self, _event: &PlayerEvent) {}

    /// Player joined.
    async fn on_join(&self, _event: &PlayerEvent) {}

    /// Player left.
    async fn on_leave(&self, _event: &PlayerEvent) {}

    /// Advancement or achievement.
    async fn on_achievement(&self, _event: &PlayerEvent) {}

    /// Death message.
    async fn on_death(&self, _event: &PlayerEvent) {}

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this listener's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
