//! # LogLineParser: console line → player event.
//!
//! First match wins:
//! ```text
//! 1. contains "[Rcon]"                              ─► dropped (echo of an RCON command)
//! 2. "<name> message"                               ─► Chat
//! 3. "[Server thread/INFO]: name joined the game"   ─► Join   (roster += name)
//! 4. "[Server thread/INFO]: name left the game"     ─► Leave  (roster -= name)
//! 5. "[Server thread/INFO]: name has made the advancement [Title]"
//!    (made|reached|earned, advancement|achievement) ─► Achievement
//! 6. line mentions a rostered name, not noise       ─► Death
//! 7. anything else                                  ─► dropped
//! ```
//! Names are `[A-Za-z0-9_]+`. Noise lines are login confirmations
//! ("logged in with entity id"), "lost connection" and "moved too quickly!".

use crate::events::{PlayerEvent, PlayerEventKind};

const INFO_PREFIX: &str = "[Server thread/INFO]: ";
const NOISE: [&str; 3] = ["logged in with entity id", "lost connection", "moved too quickly!"];

/// Stateful console line classifier.
///
/// Keeps the roster of connected players (join order) to attribute
/// unlabelled lines such as death messages.
#[derive(Debug, Default, Clone)]
pub struct LogLineParser {
    roster: Vec<String>,
}

impl LogLineParser {
    /// Creates a parser with an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies one line, updating the roster for joins and leaves.
    pub fn parse_line(&mut self, line: &str) -> Option<PlayerEvent> {
        if line.contains("[Rcon]") {
            return None;
        }

        if let Some((player, message)) = chat(line) {
            return Some(PlayerEvent::new(PlayerEventKind::Chat, player, message));
        }

        if let Some(rest) = line.find(INFO_PREFIX).map(|i| &line[i + INFO_PREFIX.len()..]) {
            if let Some(name) = action(rest, " joined the game") {
                if !self.roster.iter().any(|p| p == name) {
                    self.roster.push(name.to_string());
                }
                return Some(self.event(PlayerEventKind::Join, name, line));
            }
            if let Some(name) = action(rest, " left the game") {
                if let Some(i) = self.roster.iter().position(|p| p == name) {
                    self.roster.remove(i);
                }
                return Some(self.event(PlayerEventKind::Leave, name, line));
            }
            if let Some(name) = achievement(rest) {
                return Some(self.event(PlayerEventKind::Achievement, name, line));
            }
        }

        let player = self.roster.iter().find(|p| line.contains(p.as_str()))?;
        if NOISE.iter().any(|n| line.contains(n)) {
            return None;
        }
        let message = message_after_prefix(line).filter(|m| !m.is_empty())?;
        Some(PlayerEvent::new(PlayerEventKind::Death, player.as_str(), message))
    }

    #[cfg(test)]
    fn roster(&self) -> &[String] {
        &self.roster
    }

    fn event(&self, kind: PlayerEventKind, player: &str, line: &str) -> PlayerEvent {
        PlayerEvent::new(kind, player, message_after_prefix(line).unwrap_or_default())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Leading player name of `s`, if any.
fn leading_name(s: &str) -> Option<&str> {
    let end = s.find(|c: char| !is_name_char(c)).unwrap_or(s.len());
    (end > 0).then(|| &s[..end])
}

/// `<name> message` anywhere in the line, leftmost match.
fn chat(line: &str) -> Option<(&str, &str)> {
    line.match_indices('<').find_map(|(i, _)| {
        let rest = &line[i + 1..];
        let name = leading_name(rest)?;
        let message = rest[name.len()..].strip_prefix("> ")?;
        (!message.is_empty()).then_some((name, message))
    })
}

/// `name<suffix>` at the start of `rest`.
fn action<'a>(rest: &'a str, suffix: &str) -> Option<&'a str> {
    let name = leading_name(rest)?;
    rest[name.len()..].starts_with(suffix).then_some(name)
}

fn achievement(rest: &str) -> Option<&str> {
    let name = leading_name(rest)?;
    let tail = rest[name.len()..].strip_prefix(" has ")?;
    let tail = ["made ", "reached ", "earned "]
        .iter()
        .find_map(|verb| tail.strip_prefix(verb))?;
    let tail = ["the advancement ", "the achievement "]
        .iter()
        .find_map(|noun| tail.strip_prefix(noun))?;
    let title = tail.strip_prefix('[')?;
    title
        .char_indices()
        .skip(1)
        .any(|(_, c)| c == ']')
        .then_some(name)
}

/// Text after the first `[Server thread/INFO]: ` (ASCII case-insensitive),
/// up to a second occurrence if there is one.
fn message_after_prefix(line: &str) -> Option<&str> {
    let lower = line.to_ascii_lowercase();
    let needle = INFO_PREFIX.to_ascii_lowercase();
    let start = lower.find(&needle)? + needle.len();
    let end = lower[start..]
        .find(&needle)
        .map_or(line.len(), |i| start + i);
    Some(&line[start..end])
}
