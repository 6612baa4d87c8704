// ABOUTME: Structured error types for the tcp mux core, covering codec, protocol and I/O failures
// ABOUTME: Provides the GO_AWAY reason-code classification used to tear down a session

use std::io;
use thiserror::Error;

use crate::frame::GoAwayReason;

/// Errors produced while decoding a frame header from the wire.
///
/// Kept separate from [`MuxError`] because it is hit during normal operation
/// whenever a frame has only partially arrived: callers match on
/// [`CodecError::Incomplete`] to decide whether to wait for more bytes rather
/// than treating it as a hard failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Not enough bytes buffered yet to decode a full header (and payload, for DATA).
    #[error("incomplete frame")]
    Incomplete,

    /// `version` field was not the protocol version this core speaks.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// `type` field did not match any of DATA/WINDOW_UPDATE/PING/GO_AWAY.
    #[error("unknown frame type {0}")]
    UnknownType(u8),

    /// `flags` field set bits outside {ZERO, SYN, ACK, FIN, RST}.
    #[error("invalid flags {0:#06x}")]
    InvalidFlags(u16),
}

/// Errors surfaced by the multiplexer core to its embedding application.
///
/// Every variant maps onto one of the handling strategies from the error
/// handling design: protocol and internal errors drive a GO_AWAY and
/// connection teardown, `StreamClosed` and `Backpressure` are ordinary
/// short-write outcomes at the `write_stream`/`mux_write` boundary, and
/// `RemoteGoAway` is informational.
#[derive(Debug, Error)]
pub enum MuxError {
    /// Malformed header, unknown stream id on a DATA frame, window exceeded,
    /// or a flag transition the state machine does not allow.
    #[error("protocol error on stream {stream_id}: {reason}")]
    Protocol { stream_id: u32, reason: String },

    /// An invariant internal to this implementation was violated (ring
    /// buffer overrun, registry corruption). Should never happen; if it
    /// does, the connection is torn down rather than continuing in an
    /// inconsistent state.
    #[error("internal error: {0}")]
    Internal(String),

    /// A write was attempted against a stream that has already reached a
    /// terminal state. The write is simply dropped; this is not fatal to
    /// the connection.
    #[error("stream {0} is closed")]
    StreamClosed(u32),

    /// The stream's send window or tx ring has no room for more data right
    /// now. Carries the number of bytes that were actually accepted so the
    /// caller can retry the remainder later.
    #[error("stream {stream_id} backpressured, accepted {accepted} of {requested} bytes")]
    Backpressure {
        stream_id: u32,
        accepted: usize,
        requested: usize,
    },

    /// The remote end sent GO_AWAY; no further streams should be opened.
    #[error("remote sent GO_AWAY: {0:?}")]
    RemoteGoAway(GoAwayReason),

    /// Transport I/O failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl From<CodecError> for MuxError {
    fn from(err: CodecError) -> Self {
        MuxError::Protocol {
            stream_id: 0,
            reason: err.to_string(),
        }
    }
}

impl MuxError {
    /// The GO_AWAY reason code this error should be reported to the peer with,
    /// if any. `StreamClosed`, `Backpressure` and `RemoteGoAway` are not
    /// connection-fatal and have no associated reason.
    pub fn go_away_reason(&self) -> Option<GoAwayReason> {
        match self {
            MuxError::Protocol { .. } => Some(GoAwayReason::ProtoErr),
            MuxError::Internal(_) => Some(GoAwayReason::InternalErr),
            MuxError::Io(_) => Some(GoAwayReason::InternalErr),
            MuxError::StreamClosed(_) | MuxError::Backpressure { .. } | MuxError::RemoteGoAway(_) => None,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MuxError>;
