//! Framed messages.
//!
//! Every message is a fixed header — `type` as a `u32` and the payload
//! length as a `u64`, both native endian — followed by the payload bytes.
//! The transport is a local stream socket between two builds of the same
//! binary, so no cross-machine portability is attempted.
//!
//! Two replies deliberately bypass the framing and are written raw on the
//! wire: the version handshake reply (a bare `u32`) and the admin text
//! replies (a bare `u64` length followed by the text). The attach sequence
//! likewise interleaves raw `u32` counts between framed messages.

use std::io::{ErrorKind, Read, Write};

use crate::error::ProtocolError;

/// Protocol version exchanged in the handshake.
pub const PROTOCOL_VERSION: u32 = 2;

/// Bytes in a frame header.
pub const HEADER_SIZE: usize = 12;

/// Upper bound on a frame payload; anything larger is a protocol
/// violation, not a real message.
pub const MAX_PAYLOAD: u64 = 64 * 1024 * 1024;

/// Message kinds. The numeric values are fixed wire constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MsgType {
    Version = 12,
    Command = 200,
    Detach = 201,
    ListSessions = 202,
    DetachKill = 203,
    Exited = 205,
    Resize = 209,
    GridSave = 308,
}

impl MsgType {
    pub fn from_wire(value: u32) -> Option<MsgType> {
        match value {
            12 => Some(MsgType::Version),
            200 => Some(MsgType::Command),
            201 => Some(MsgType::Detach),
            202 => Some(MsgType::ListSessions),
            203 => Some(MsgType::DetachKill),
            205 => Some(MsgType::Exited),
            209 => Some(MsgType::Resize),
            308 => Some(MsgType::GridSave),
            _ => None,
        }
    }
}

/// One message as read off the wire. The kind is kept raw so unknown kinds
/// can be logged and ignored rather than killing the connection.
#[derive(Debug)]
pub struct Frame {
    pub kind: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn msg_type(&self) -> Option<MsgType> {
        MsgType::from_wire(self.kind)
    }
}

/// Writes one framed message, looping until fully flushed.
pub fn write_message<W: Write>(
    w: &mut W,
    kind: MsgType,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(&(kind as u32).to_ne_bytes());
    header[4..].copy_from_slice(&(payload.len() as u64).to_ne_bytes());
    w.write_all(&header)?;
    w.write_all(payload)?;
    Ok(())
}

/// Reads one framed message.
///
/// Returns `Ok(None)` on end-of-file at a frame boundary (normal
/// disconnect). End-of-file inside a frame is a protocol error, as is a
/// length no real message could have. Spurious interruption is retried.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<Frame>, ProtocolError> {
    let mut header = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        match r.read(&mut header[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    Ok(None)
                } else {
                    Err(ProtocolError::TruncatedFrame)
                };
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }

    let kind = u32::from_ne_bytes(header[..4].try_into().expect("4 bytes"));
    let len = u64::from_ne_bytes(header[4..].try_into().expect("8 bytes"));
    if len > MAX_PAYLOAD {
        return Err(ProtocolError::ImpossibleLength(len));
    }

    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            ProtocolError::TruncatedFrame
        } else {
            ProtocolError::Io(e)
        }
    })?;
    Ok(Some(Frame { kind, payload }))
}

/// Writes a bare native-endian `u32` with no framing.
pub fn write_raw_u32<W: Write>(w: &mut W, value: u32) -> Result<(), ProtocolError> {
    w.write_all(&value.to_ne_bytes())?;
    Ok(())
}

/// Reads a bare native-endian `u32`; `None` on immediate end-of-file.
pub fn read_raw_u32<R: Read>(r: &mut R) -> Result<Option<u32>, ProtocolError> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    Ok(None)
                } else {
                    Err(ProtocolError::TruncatedFrame)
                };
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }
    Ok(Some(u32::from_ne_bytes(buf)))
}

/// Writes an admin text reply: a bare `u64` byte count, then the text with
/// a trailing NUL.
pub fn write_text_reply<W: Write>(w: &mut W, text: &str) -> Result<(), ProtocolError> {
    let len = (text.len() + 1) as u64;
    w.write_all(&len.to_ne_bytes())?;
    w.write_all(text.as_bytes())?;
    w.write_all(&[0])?;
    Ok(())
}

/// Reads an admin text reply, dropping the trailing NUL.
pub fn read_text_reply<R: Read>(r: &mut R) -> Result<String, ProtocolError> {
    let mut len_buf = [0u8; 8];
    r.read_exact(&mut len_buf)?;
    let len = u64::from_ne_bytes(len_buf);
    if len > MAX_PAYLOAD {
        return Err(ProtocolError::ImpossibleLength(len));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    if buf.last() == Some(&0) {
        buf.pop();
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Window size as carried by `Resize` payloads: rows, cols, and the two
/// pixel fields, each a native-endian `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
}

impl WindowSize {
    pub const ENCODED_SIZE: usize = 8;

    pub fn encode(&self) -> [u8; Self::ENCODED_SIZE] {
        let mut buf = [0u8; Self::ENCODED_SIZE];
        buf[..2].copy_from_slice(&self.rows.to_ne_bytes());
        buf[2..4].copy_from_slice(&self.cols.to_ne_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Option<WindowSize> {
        if buf.len() < Self::ENCODED_SIZE {
            return None;
        }
        Some(WindowSize {
            rows: u16::from_ne_bytes(buf[..2].try_into().ok()?),
            cols: u16::from_ne_bytes(buf[2..4].try_into().ok()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_round_trip() {
        let mut wire = Vec::new();
        write_message(&mut wire, MsgType::Command, b"new-session\0").unwrap();

        let frame = read_frame(&mut Cursor::new(&wire)).unwrap().unwrap();
        assert_eq!(frame.msg_type(), Some(MsgType::Command));
        assert_eq!(frame.payload, b"new-session\0");
    }

    #[test]
    fn eof_at_boundary_is_clean() {
        let empty: &[u8] = &[];
        assert!(read_frame(&mut Cursor::new(empty)).unwrap().is_none());
    }

    #[test]
    fn eof_mid_header_is_protocol_error() {
        let short = [0u8; 5];
        let err = read_frame(&mut Cursor::new(&short)).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedFrame));
    }

    #[test]
    fn eof_mid_payload_is_protocol_error() {
        let mut wire = Vec::new();
        write_message(&mut wire, MsgType::GridSave, &[1, 2, 3, 4]).unwrap();
        wire.pop();
        let err = read_frame(&mut Cursor::new(&wire)).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedFrame));
    }

    #[test]
    fn impossible_length_is_rejected() {
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&(MsgType::Command as u32).to_ne_bytes());
        header[4..].copy_from_slice(&u64::MAX.to_ne_bytes());
        let err = read_frame(&mut Cursor::new(&header)).unwrap_err();
        assert!(matches!(err, ProtocolError::ImpossibleLength(_)));
    }

    #[test]
    fn unknown_kind_survives_reading() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&999u32.to_ne_bytes());
        wire.extend_from_slice(&0u64.to_ne_bytes());
        let frame = read_frame(&mut Cursor::new(&wire)).unwrap().unwrap();
        assert_eq!(frame.kind, 999);
        assert_eq!(frame.msg_type(), None);
    }

    #[test]
    fn text_reply_round_trip() {
        let mut wire = Vec::new();
        write_text_reply(&mut wire, "(no sessions)\n").unwrap();
        let text = read_text_reply(&mut Cursor::new(&wire)).unwrap();
        assert_eq!(text, "(no sessions)\n");
    }

    #[test]
    fn window_size_round_trip() {
        let ws = WindowSize { rows: 23, cols: 80 };
        assert_eq!(WindowSize::decode(&ws.encode()), Some(ws));
    }

    #[test]
    fn wire_constants_are_stable() {
        assert_eq!(MsgType::Version as u32, 12);
        assert_eq!(MsgType::Command as u32, 200);
        assert_eq!(MsgType::Detach as u32, 201);
        assert_eq!(MsgType::ListSessions as u32, 202);
        assert_eq!(MsgType::DetachKill as u32, 203);
        assert_eq!(MsgType::Exited as u32, 205);
        assert_eq!(MsgType::Resize as u32, 209);
        assert_eq!(MsgType::GridSave as u32, 308);
    }
}
