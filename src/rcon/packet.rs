//! # RCON packet codec.
//!
//! All integers are little-endian:
//! ```text
//! outer frame:  i32 length | inner packet (length bytes)
//! inner packet: i32 request_id | i32 packet_type | body (UTF-8) | 0x00 0x00
//! ```
//! An authentication response with `request_id == -1` means the password was rejected.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RconError;

/// Inner header (id + type) plus the two-byte terminator.
const MIN_PACKET_LEN: usize = 4 + 4 + 2;
/// Upper bound accepted for an incoming packet.
const MAX_PACKET_LEN: usize = 1 << 20;

/// One RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    /// Correlation id chosen by the client and echoed by the server.
    pub request_id: i32,
    /// One of the `RconPacket::*` type constants.
    pub packet_type: i32,
    /// Payload text.
    pub body: String,
}

impl RconPacket {
    /// Authentication request; the body is the password.
    pub const AUTH: i32 = 3;
    /// Authentication response.
    pub const AUTH_RESPONSE: i32 = 2;
    /// Command request.
    pub const COMMAND: i32 = 2;
    /// Plain command response.
    pub const RESPONSE: i32 = 0;

    /// Creates a packet.
    pub fn new(request_id: i32, packet_type: i32, body: impl Into<String>) -> Self {
        Self {
            request_id,
            packet_type,
            body: body.into(),
        }
    }

    /// Encodes the packet including its length prefix.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.body.as_bytes();
        let len = MIN_PACKET_LEN + body.len();
        let mut buf = Vec::with_capacity(4 + len);
        buf.extend_from_slice(&(len as i32).to_le_bytes());
        buf.extend_from_slice(&self.request_id.to_le_bytes());
        buf.extend_from_slice(&self.packet_type.to_le_bytes());
        buf.extend_from_slice(body);
        buf.extend_from_slice(&[0, 0]);
        buf
    }

    /// Decodes one complete frame (length prefix included).
    pub fn decode(frame: &[u8]) -> Result<Self, RconError> {
        let (prefix, rest) = frame
            .split_first_chunk::<4>()
            .ok_or_else(|| RconError::invalid_frame("missing length prefix"))?;
        let len = checked_len(i32::from_le_bytes(*prefix))?;
        if rest.len() != len {
            return Err(RconError::invalid_frame(format!(
                "length prefix says {len} bytes, frame has {}",
                rest.len()
            )));
        }
        Self::decode_inner(rest)
    }

    /// Reads exactly one packet from `reader`.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, RconError>
    where
        R: AsyncRead + Unpin,
    {
        let len = checked_len(reader.read_i32_le().await?)?;
        let mut inner = vec![0u8; len];
        reader.read_exact(&mut inner).await?;
        Self::decode_inner(&inner)
    }

    /// Writes the encoded packet to `writer` and flushes it.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), RconError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode()).await?;
        writer.flush().await?;
        Ok(())
    }

    fn decode_inner(inner: &[u8]) -> Result<Self, RconError> {
        let (id, rest) = inner
            .split_first_chunk::<4>()
            .ok_or_else(|| RconError::invalid_frame("missing request id"))?;
        let (ty, rest) = rest
            .split_first_chunk::<4>()
            .ok_or_else(|| RconError::invalid_frame("missing packet type"))?;
        let body = rest
            .strip_suffix(&[0, 0])
            .ok_or_else(|| RconError::invalid_frame("missing terminator"))?;

        Ok(Self {
            request_id: i32::from_le_bytes(*id),
            packet_type: i32::from_le_bytes(*ty),
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

fn checked_len(raw: i32) -> Result<usize, RconError> {
    match usize::try_from(raw) {
        Ok(len) if (MIN_PACKET_LEN..=MAX_PACKET_LEN).contains(&len) => Ok(len),
        _ => Err(RconError::invalid_frame(format!("bad packet length {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_little_endian_with_double_terminator() {
        let bytes = RconPacket::new(7, RconPacket::COMMAND, "list").encode();
        assert_eq!(
            bytes,
            vec![
                14, 0, 0, 0, // length = 4 + 4 + 4 + 2
                7, 0, 0, 0, // request id
                2, 0, 0, 0, // type
                b'l', b'i', b's', b't', 0, 0,
            ]
        );
    }

    #[test]
    fn decode_restores_the_encoded_packet() {
        let packet = RconPacket::new(-1, RconPacket::AUTH_RESPONSE, "ünïcode body");
        assert_eq!(RconPacket::decode(&packet.encode()).unwrap(), packet);
    }

    #[test]
    fn rejects_truncated_and_oversized_frames() {
        let mut bytes = RconPacket::new(1, RconPacket::RESPONSE, "abc").encode();
        bytes.pop();
        assert!(matches!(
            RconPacket::decode(&bytes),
            Err(RconError::InvalidFrame { .. })
        ));

        let huge = (i32::MAX).to_le_bytes();
        assert!(RconPacket::decode(&huge).is_err());

        let short = 4i32.to_le_bytes();
        assert!(RconPacket::decode(&short).is_err());
    }

    #[tokio::test]
    async fn reads_consecutive_packets_from_a_stream() {
        let (mut client, mut server) = tokio::io::duplex(256);
        RconPacket::new(1, RconPacket::RESPONSE, "first")
            .write_to(&mut server)
            .await
            .unwrap();
        RconPacket::new(2, RconPacket::RESPONSE, "")
            .write_to(&mut server)
            .await
            .unwrap();

        let a = RconPacket::read_from(&mut client).await.unwrap();
        let b = RconPacket::read_from(&mut client).await.unwrap();
        assert_eq!((a.request_id, a.body.as_str()), (1, "first"));
        assert_eq!((b.request_id, b.body.as_str()), (2, ""));
    }

    #[tokio::test]
    async fn eof_mid_frame_is_an_io_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        server.write_all(&20i32.to_le_bytes()).await.unwrap();
        drop(server);
        assert!(matches!(
            RconPacket::read_from(&mut client).await,
            Err(RconError::Io(_))
        ));
    }
}
