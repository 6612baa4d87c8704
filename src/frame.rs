// ABOUTME: The 12-byte mux frame header: wire types, flag bitmask, and encode/decode
// ABOUTME: Validation here enforces I5 (known version/type/flags) before a frame reaches the router

use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::CodecError;

/// Size in bytes of an encoded frame header. DATA frames carry `length`
/// additional payload bytes after the header; all other types do not.
pub const HEADER_LEN: usize = 12;

/// Protocol version this core speaks. Frames with any other version are rejected.
pub const PROTO_VERSION: u8 = 0;

/// The four frame types this protocol defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Data = 0,
    WindowUpdate = 1,
    Ping = 2,
    GoAway = 3,
}

impl FrameType {
    fn from_u8(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0 => Ok(FrameType::Data),
            1 => Ok(FrameType::WindowUpdate),
            2 => Ok(FrameType::Ping),
            3 => Ok(FrameType::GoAway),
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

/// Reason code carried in the `length` field of a GO_AWAY frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GoAwayReason {
    Normal = 0,
    ProtoErr = 1,
    InternalErr = 2,
}

impl GoAwayReason {
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0 => Some(GoAwayReason::Normal),
            1 => Some(GoAwayReason::ProtoErr),
            2 => Some(GoAwayReason::InternalErr),
            _ => None,
        }
    }
}

/// Bitmask flags carried on every frame. Implemented as manual bit constants
/// rather than a `bitflags`-derived type, in keeping with the rest of this
/// codebase's preference for small hand-rolled bit checks (see
/// `CommandId::is_response`) over pulling in a dependency used nowhere else.
pub mod flags {
    pub const ZERO: u16 = 0x0;
    pub const SYN: u16 = 0x1;
    pub const ACK: u16 = 0x2;
    pub const FIN: u16 = 0x4;
    pub const RST: u16 = 0x8;

    /// All flag bits that are individually valid. Frames may combine them
    /// (e.g. `SYN | ACK` is not observed on the wire today but is not
    /// rejected either); only bits outside this mask are invalid.
    const VALID_BITS: u16 = SYN | ACK | FIN | RST;

    pub fn is_valid(raw: u16) -> bool {
        raw & !VALID_BITS == 0
    }

    pub fn has(raw: u16, flag: u16) -> bool {
        raw & flag == flag
    }
}

/// A decoded frame header. For `FrameType::Data` the payload (exactly
/// `length` bytes) follows immediately in the transport stream and is not
/// part of this struct; the router reads it separately once the header has
/// been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub flags: u16,
    pub stream_id: u32,
    /// DATA: payload length in bytes. WINDOW_UPDATE: window delta.
    /// PING: opaque echo token. GO_AWAY: reason code.
    pub length: u32,
}

impl FrameHeader {
    /// Checks whether `buf` holds a complete header without consuming it,
    /// mirroring the check-then-parse split used for SMPP PDUs: a cheap
    /// pass to decide whether more bytes are needed before the allocating
    /// decode runs.
    pub fn check(buf: &mut Cursor<&[u8]>) -> Result<(), CodecError> {
        if buf.remaining() < HEADER_LEN {
            return Err(CodecError::Incomplete);
        }
        buf.advance(HEADER_LEN);
        Ok(())
    }

    /// Decode a header from the front of `buf`, advancing the cursor past it.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < HEADER_LEN {
            return Err(CodecError::Incomplete);
        }

        let version = buf.get_u8();
        if version != PROTO_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let frame_type = FrameType::from_u8(buf.get_u8())?;

        let raw_flags = buf.get_u16();
        if !flags::is_valid(raw_flags) {
            return Err(CodecError::InvalidFlags(raw_flags));
        }

        let stream_id = buf.get_u32();
        let length = buf.get_u32();

        Ok(FrameHeader {
            frame_type,
            flags: raw_flags,
            stream_id,
            length,
        })
    }

    /// Encode this header (without any DATA payload) into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(PROTO_VERSION);
        buf.put_u8(self.frame_type as u8);
        buf.put_u16(self.flags);
        buf.put_u32(self.stream_id);
        buf.put_u32(self.length);
    }

    /// Convenience constructor used by the router and stream I/O pump when
    /// emitting frames; keeps call sites from repeating the field list.
    pub fn new(frame_type: FrameType, flags: u16, stream_id: u32, length: u32) -> Self {
        FrameHeader {
            frame_type,
            flags,
            stream_id,
            length,
        }
    }
}

/// Encode and write a header-only frame (WINDOW_UPDATE, PING, GO_AWAY, or a
/// DATA frame whose payload the caller writes separately) to `transport`.
pub async fn write_frame_header<W: AsyncWrite + Unpin>(
    transport: &mut W,
    header: FrameHeader,
) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    header.encode(&mut buf);
    transport.write_all(&buf).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(header: FrameHeader) {
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);

        let mut cursor = Cursor::new(&buf[..]);
        let decoded = FrameHeader::decode(&mut cursor).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn round_trips_all_frame_types() {
        roundtrip(FrameHeader::new(FrameType::Data, flags::SYN, 3, 5));
        roundtrip(FrameHeader::new(FrameType::WindowUpdate, flags::ZERO, 3, 128));
        roundtrip(FrameHeader::new(FrameType::Ping, flags::SYN, 0, 0x1234_5678));
        roundtrip(FrameHeader::new(FrameType::GoAway, flags::ZERO, 0, 1));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut buf = BytesMut::new();
        buf.put_u8(7);
        buf.put_u8(0);
        buf.put_u16(0);
        buf.put_u32(1);
        buf.put_u32(0);
        let mut cursor = Cursor::new(&buf[..]);
        assert_eq!(
            FrameHeader::decode(&mut cursor),
            Err(CodecError::UnsupportedVersion(7))
        );
    }

    #[test]
    fn rejects_unknown_type() {
        let mut buf = BytesMut::new();
        buf.put_u8(PROTO_VERSION);
        buf.put_u8(99);
        buf.put_u16(0);
        buf.put_u32(1);
        buf.put_u32(0);
        let mut cursor = Cursor::new(&buf[..]);
        assert_eq!(
            FrameHeader::decode(&mut cursor),
            Err(CodecError::UnknownType(99))
        );
    }

    #[test]
    fn rejects_invalid_flags() {
        let mut buf = BytesMut::new();
        buf.put_u8(PROTO_VERSION);
        buf.put_u8(0);
        buf.put_u16(0xFF00);
        buf.put_u32(1);
        buf.put_u32(0);
        let mut cursor = Cursor::new(&buf[..]);
        assert_eq!(
            FrameHeader::decode(&mut cursor),
            Err(CodecError::InvalidFlags(0xFF00))
        );
    }

    #[test]
    fn incomplete_header_reports_incomplete() {
        let buf = [0u8; 6];
        let mut cursor = Cursor::new(&buf[..]);
        assert_eq!(FrameHeader::decode(&mut cursor), Err(CodecError::Incomplete));
    }

    #[test]
    fn scenario_s1_syn_header_matches_literal_bytes() {
        // SYN/ACK handshake literal bytes: DATA|SYN, stream 3, len 0.
        let header = FrameHeader::new(FrameType::Data, flags::SYN, 3, 0);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(
            &buf[..],
            &[0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn scenario_s4_ping_echo_matches_literal_bytes() {
        let header = FrameHeader::new(FrameType::Ping, flags::ACK, 0, 0x1234_5678);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(
            &buf[..],
            &[0x00, 0x02, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x12, 0x34, 0x56, 0x78]
        );
    }

    #[test]
    fn scenario_s5_go_away_proto_err_matches_literal_bytes() {
        let header = FrameHeader::new(FrameType::GoAway, flags::ZERO, 0, GoAwayReason::ProtoErr as u32);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(
            &buf[..],
            &[0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]
        );
    }
}
