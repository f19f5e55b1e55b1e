// LNP/BP Core Library implementing LNPBP specifications & standards
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! Wire framing between this subprocess and its parent (§2.7, §6): each
//! message is a 2-byte big-endian type tag, a 4-byte big-endian payload
//! length, then the `strict_encoding`-serialized payload itself.

pub mod messages;

use std::io::{self, Read, Write};

pub use messages::*;

/// Errors from reading or writing a framed message. Distinct from
/// [`crate::error::Error`], which is the engine's own domain error: this one
/// is specifically "the bytes on the wire don't parse", which `error::Error`
/// wraps via `From<WireError>`.
#[derive(Clone, PartialEq, Eq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum WireError {
    /// the peer closed the connection
    Eof,
    /// I/O error while framing a message: {0}
    Io(String),
    /// unrecognized message type tag {0:#06x}
    UnknownType(u16),
    /// failed to decode message payload: {0}
    Decode(String),
    /// failed to encode message payload: {0}
    Encode(String),
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            WireError::Eof
        } else {
            WireError::Io(err.to_string())
        }
    }
}

/// Every message type this engine may receive from, or send to, its parent
/// (§6). Values are the wire type tag.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[display(Debug)]
#[repr(u16)]
pub enum MsgType {
    OnchainInit = 0x0001,
    OnchainHtlc = 0x0002,
    OnchainInitReply = 0x0003,
    OnchainSpent = 0x0004,
    OnchainDepth = 0x0005,
    OnchainKnownPreimage = 0x0006,
    OnchainBroadcastTx = 0x0007,
    OnchainUnwatchTx = 0x0008,
}

impl MsgType {
    fn from_u16(tag: u16) -> Result<Self, WireError> {
        Ok(match tag {
            0x0001 => MsgType::OnchainInit,
            0x0002 => MsgType::OnchainHtlc,
            0x0003 => MsgType::OnchainInitReply,
            0x0004 => MsgType::OnchainSpent,
            0x0005 => MsgType::OnchainDepth,
            0x0006 => MsgType::OnchainKnownPreimage,
            0x0007 => MsgType::OnchainBroadcastTx,
            0x0008 => MsgType::OnchainUnwatchTx,
            other => return Err(WireError::UnknownType(other)),
        })
    }
}

/// A decoded frame, still tagged with its type: the driver dispatches on
/// this before deserializing the payload into the message it expects.
pub struct Frame {
    pub msg_type: MsgType,
    pub payload: Vec<u8>,
}

/// Reads one framed message from `reader`, blocking until a full frame (or
/// EOF at a frame boundary) arrives.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame, WireError> {
    let mut type_buf = [0u8; 2];
    reader.read_exact(&mut type_buf)?;
    let msg_type = MsgType::from_u16(u16::from_be_bytes(type_buf))?;

    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    Ok(Frame { msg_type, payload })
}

/// Writes one framed message to `writer`, flushing it immediately:
/// `onchaind` and its parent exchange messages one at a time and must not
/// buffer past a handshake boundary.
pub fn write_frame<W: Write>(writer: &mut W, msg_type: MsgType, payload: &[u8]) -> Result<(), WireError> {
    writer.write_all(&(msg_type as u16).to_be_bytes())?;
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

pub fn encode<T: strict_encoding::StrictEncode>(value: &T) -> Result<Vec<u8>, WireError> {
    strict_encoding::strict_serialize(value).map_err(|e| WireError::Encode(e.to_string()))
}

pub fn decode<T: strict_encoding::StrictDecode>(data: &[u8]) -> Result<T, WireError> {
    strict_encoding::strict_deserialize(data).map_err(|e| WireError::Decode(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::hashes::Hash;
    use std::io::Cursor;

    #[test]
    fn frame_round_trips_through_a_byte_buffer() {
        let mut buf = Vec::new();
        write_frame(&mut buf, MsgType::OnchainDepth, &[1, 2, 3, 4]).unwrap();

        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).unwrap();
        assert_eq!(frame.msg_type, MsgType::OnchainDepth);
        assert_eq!(frame.payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0xFFFFu16.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap_err(), WireError::UnknownType(0xFFFF));
    }

    #[test]
    fn onchain_depth_message_round_trips_through_strict_encoding() {
        let msg = OnchainDepth {
            txid: bitcoin::Txid::from_inner([0x09u8; 32]),
            depth: 42,
        };
        let payload = encode(&msg).unwrap();
        let decoded: OnchainDepth = decode(&payload).unwrap();
        assert_eq!(decoded.txid, msg.txid);
        assert_eq!(decoded.depth, msg.depth);
    }
}
