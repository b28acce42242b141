//! # Server console output.
//!
//! - [`LogLineParser`] classifies console lines into [`PlayerEvent`](crate::PlayerEvent)s.
//! - [`LogBuffer`] keeps the most recent console lines.

mod buffer;
mod parser;

pub use buffer::LogBuffer;
pub use parser::LogLineParser;
