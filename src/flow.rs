// ABOUTME: Credit-based flow control: receive-window accounting, window-update emission policy, and send-window gating
// ABOUTME: Grounded in the original send_window_update/incr_send_window pair, with an observability struct in the style of this codebase's congestion statistics

use crate::config::MuxConfig;
use crate::error::MuxError;
use crate::frame::flags;
use crate::stream::{derive_send_flags, Action, Stream, StreamId};

/// A WINDOW_UPDATE the caller must emit on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdate {
    pub flags: u16,
    pub stream_id: StreamId,
    pub delta: u32,
}

/// Account for `length` bytes of inbound DATA against the stream's receive
/// window. Returns an error if the peer exceeded the window we advertised (I3).
pub fn accept_incoming_data(stream: &mut Stream, length: u32) -> Result<(), MuxError> {
    if length > stream.recv_window {
        return Err(MuxError::Protocol {
            stream_id: stream.id,
            reason: format!(
                "receive window exceeded (remaining {}, received {})",
                stream.recv_window, length
            ),
        });
    }
    stream.recv_window -= length;
    Ok(())
}

/// After delivering `delivered_len` bytes to the peer socket, decide whether
/// a WINDOW_UPDATE is owed back to the sender, mirroring `send_window_update`.
///
/// As a side effect this also advances the stream through its SYN/ACK
/// handshake via [`derive_send_flags`], since in the original protocol the
/// handshake flags ride on whatever frame is next emitted for the stream,
/// including a window update with no credit to report yet.
pub fn maybe_emit_window_update(
    stream: &mut Stream,
    delivered_len: u32,
    config: &MuxConfig,
) -> Option<WindowUpdate> {
    let max = config.max_stream_window_size;
    let delta = max
        .saturating_sub(delivered_len)
        .saturating_sub(stream.recv_window);

    let (next_state, send_flags) = derive_send_flags(stream.state);
    stream.state = next_state;

    if delta < config.window_update_threshold() && send_flags == flags::ZERO {
        return None;
    }

    stream.recv_window = stream.recv_window.saturating_add(delta);
    Some(WindowUpdate {
        flags: send_flags,
        stream_id: stream.id,
        delta,
    })
}

/// Apply an inbound WINDOW_UPDATE's delta to the send side, mirroring
/// `incr_send_window`. Returns the actions the caller must perform, namely
/// re-enabling the peer socket's read side if it had been gated to zero.
pub fn apply_window_update(stream: &mut Stream, delta: u32) -> Vec<Action> {
    let mut actions = Vec::new();
    if stream.send_window == 0 && delta > 0 {
        actions.push(Action::EnableRead(true));
    }
    stream.send_window = stream.send_window.saturating_add(delta);
    actions
}

/// Running totals for observability, in the vein of this codebase's
/// adaptive-rate-limiting statistics struct but tracking window credit
/// instead of congestion state.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowStats {
    pub window_updates_sent: u64,
    pub bytes_delivered: u64,
    pub bytes_sent: u64,
}

impl FlowStats {
    pub fn record_delivery(&mut self, len: u32) {
        self.bytes_delivered += u64::from(len);
    }

    pub fn record_send(&mut self, len: u32) {
        self.bytes_sent += u64::from(len);
    }

    pub fn record_window_update(&mut self) {
        self.window_updates_sent += 1;
    }
}
