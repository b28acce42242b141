//! # Remote console (RCON).
//!
//! - [`RconPacket`] binary codec for the wire format.
//! - [`RconClient`] authenticated connection with reconnect and serialized commands.

mod client;
mod packet;

pub use client::{RconClient, RconOptions, RconSettings};
pub use packet::RconPacket;
