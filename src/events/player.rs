//! Player events classified from the server console.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which console pattern produced a [`PlayerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerEventKind {
    /// `<name> message`
    Chat,
    /// `name joined the game`
    Join,
    /// `name left the game`
    Leave,
    /// `name has made the advancement [Title]` and its variants.
    Achievement,
    /// Any other console line naming a player on the roster.
    Death,
}

impl PlayerEventKind {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PlayerEventKind::Chat => "chat",
            PlayerEventKind::Join => "join",
            PlayerEventKind::Leave => "leave",
            PlayerEventKind::Achievement => "achievement",
            PlayerEventKind::Death => "death",
        }
    }
}

impl fmt::Display for PlayerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Payload of the player channels.
///
/// For `Chat` the message is the chat text; for the other kinds it is the
/// console line after the log-level prefix (e.g. `Bob joined the game`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerEvent {
    /// Event classification.
    pub kind: PlayerEventKind,
    /// Player the line is attributed to.
    pub player: String,
    /// Message text.
    pub message: String,
}

impl PlayerEvent {
    /// Creates a new event.
    pub fn new(kind: PlayerEventKind, player: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            player: player.into(),
            message: message.into(),
        }
    }
}

/// Chat message relayed from an external chat platform into the game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRelayMessage {
    /// Author on the external platform.
    pub username: String,
    /// Message text.
    pub message: String,
}

impl ChatRelayMessage {
    /// Creates a relay message.
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }

    /// `tellraw @a {"text":"<username> message","color":"gold"}` with JSON escaping.
    pub fn to_tellraw(&self) -> String {
        let payload = serde_json::json!({
            "text": format!("<{}> {}", self.username, self.message),
            "color": "gold",
        });
        format!("tellraw @a {payload}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tellraw_escapes_user_text() {
        let cmd = ChatRelayMessage::new("ann", r#"say "hi" \ bye"#).to_tellraw();
        let json = cmd.strip_prefix("tellraw @a ").unwrap();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["text"], r#"<ann> say "hi" \ bye"#);
        assert_eq!(value["color"], "gold");
    }
}
