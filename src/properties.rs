//! # `server.properties` reader.
//!
//! The game server keeps its own settings in a Java-style properties file in
//! the server directory. The supervisor reads it at every boot to find out
//! whether RCON is enabled and how to reach it:
//!
//! ```text
//! enable-rcon=true
//! rcon.port=25575
//! rcon.password=hunter2
//! ```

use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Port used when `rcon.port` is absent or invalid.
pub const DEFAULT_RCON_PORT: u16 = 25575;

/// RCON endpoint taken from `server.properties`.
#[derive(Clone, PartialEq, Eq)]
pub struct RconEndpoint {
    /// `rcon.port`.
    pub port: u16,
    /// `rcon.password`.
    pub password: String,
}

impl std::fmt::Debug for RconEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconEndpoint")
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parsed properties file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerProperties {
    entries: HashMap<String, String>,
}

impl ServerProperties {
    /// File name inside the server directory.
    pub const FILE_NAME: &'static str = "server.properties";

    /// Parses properties text. Later duplicates win.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        let mut lines = text.lines();

        while let Some(line) = lines.next() {
            let mut logical = line.trim_start().to_string();
            if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
                continue;
            }
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }
            let (key, value) = split_entry(&logical);
            entries.insert(unescape(key), unescape(value));
        }
        Self { entries }
    }

    /// Reads and parses `<server_dir>/server.properties`.
    pub async fn load(server_dir: &Path) -> io::Result<Self> {
        let text = tokio::fs::read_to_string(server_dir.join(Self::FILE_NAME)).await?;
        Ok(Self::parse(&text))
    }

    /// Raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// RCON endpoint, when `enable-rcon=true` and a non-empty password is set.
    pub fn rcon(&self) -> Option<RconEndpoint> {
        if !self
            .get("enable-rcon")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
        {
            return None;
        }
        let password = self.get("rcon.password").filter(|p| !p.is_empty())?;
        let port = self
            .get("rcon.port")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_RCON_PORT);
        Some(RconEndpoint {
            port,
            password: password.to_string(),
        })
    }
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(s: &str) -> bool {
    s.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Splits at the first unescaped `=`, `:` or whitespace.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], line[i + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest
                    .strip_prefix(['=', ':'])
                    .map_or(rest, str::trim_start);
                return (&line[..i], rest);
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => out.push_str(&hex),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
