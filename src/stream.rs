// ABOUTME: Per-stream lifecycle state machine plus the stream record itself (windows + rings)
// ABOUTME: Transition logic is a pure function so it can be unit tested without a transport

use crate::config::MuxConfig;
use crate::error::MuxError;
use crate::frame::flags;
use crate::ring_buffer::RingBuffer;

pub type StreamId = u32;

/// Lifecycle state of a single multiplexed stream.
///
/// `Closed` and `Reset` are terminal: reaching either removes the stream
/// from the registry and tears down any attached peer socket (I1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Init,
    SynSend,
    SynReceived,
    Established,
    LocalClose,
    RemoteClose,
    Closed,
    Reset,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Closed | StreamState::Reset)
    }
}

/// Side effects the caller must perform after a transition. Kept as data
/// rather than performed inline so the transition function stays pure and
/// testable without a transport or registry in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The stream reached a terminal state: remove it from the registry and
    /// release any attached peer socket.
    Teardown,
    /// The peer granted or revoked send credit; the local peer socket's
    /// read side should be toggled accordingly.
    EnableRead(bool),
}

/// Apply an inbound frame's flags to `state`, mirroring `process_flags` in
/// the original C implementation. Returns the new state and any actions the
/// caller must perform. An unexpected FIN on an already-terminal stream is
/// reported as a protocol error rather than asserting.
pub fn apply_received_flags(
    state: StreamState,
    raw_flags: u16,
    stream_id: StreamId,
) -> Result<(StreamState, Vec<Action>), MuxError> {
    if flags::has(raw_flags, flags::RST) {
        return Ok((StreamState::Reset, vec![Action::Teardown]));
    }

    if flags::has(raw_flags, flags::FIN) {
        return match state {
            StreamState::SynSend | StreamState::SynReceived | StreamState::Established => {
                Ok((StreamState::RemoteClose, vec![]))
            }
            StreamState::LocalClose => Ok((StreamState::Closed, vec![Action::Teardown])),
            StreamState::Init | StreamState::RemoteClose | StreamState::Closed | StreamState::Reset => {
                Err(MuxError::Protocol {
                    stream_id,
                    reason: format!("unexpected FIN flag in state {state:?}"),
                })
            }
        };
    }

    if flags::has(raw_flags, flags::ACK) {
        let next = if state == StreamState::SynSend {
            StreamState::Established
        } else {
            state
        };
        return Ok((next, vec![]));
    }

    if flags::has(raw_flags, flags::SYN) && state == StreamState::Init {
        return Ok((StreamState::SynReceived, vec![]));
    }

    Ok((state, vec![]))
}

/// Compute the flags an outbound frame on this stream must carry given its
/// current state, and the resulting state, mirroring `get_send_flags`.
pub fn derive_send_flags(state: StreamState) -> (StreamState, u16) {
    match state {
        StreamState::Init => (StreamState::SynSend, flags::SYN),
        StreamState::SynReceived => (StreamState::Established, flags::ACK),
        other => (other, flags::ZERO),
    }
}

/// Apply the effect of locally emitting a FIN: ESTABLISHED moves to
/// LOCAL_CLOSE, REMOTE_CLOSE (already half-closed by the peer) moves to
/// CLOSED and tears down.
pub fn apply_sent_fin(state: StreamState) -> (StreamState, Vec<Action>) {
    match state {
        StreamState::Established => (StreamState::LocalClose, vec![]),
        StreamState::RemoteClose => (StreamState::Closed, vec![Action::Teardown]),
        other => (other, vec![]),
    }
}

/// A single multiplexed stream's full record: lifecycle state, flow-control
/// windows, and the tx/rx staging rings.
#[derive(Debug)]
pub struct Stream {
    pub id: StreamId,
    pub state: StreamState,
    pub recv_window: u32,
    pub send_window: u32,
    pub tx_ring: RingBuffer,
    pub rx_ring: RingBuffer,
}

impl Stream {
    /// Create a new stream record with full initial windows in both
    /// directions, per `init_tmux_stream`.
    ///
    /// The rx ring is sized to `max_stream_window_size` rather than
    /// `rbuf_size`: a single DATA frame may legitimately carry up to a full
    /// window's worth of payload (see the up-front length check in
    /// `router::handle_data`), and a ring buffer smaller than that would
    /// silently truncate a protocol-valid frame, violating I2. The tx ring
    /// stages only locally-produced bytes gated by backpressure and keeps
    /// `rbuf_size`.
    pub fn new(id: StreamId, state: StreamState, config: &MuxConfig) -> Self {
        Stream {
            id,
            state,
            recv_window: config.max_stream_window_size,
            send_window: config.max_stream_window_size,
            tx_ring: RingBuffer::new(config.rbuf_size as usize),
            rx_ring: RingBuffer::new(config.max_stream_window_size as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syn_ack_handshake_reaches_established() {
        let (state, _) = apply_received_flags(StreamState::Init, flags::SYN, 3).unwrap();
        assert_eq!(state, StreamState::SynReceived);

        let (state, send_flags) = derive_send_flags(state);
        assert_eq!(state, StreamState::Established);
        assert_eq!(send_flags, flags::ACK);
    }

    #[test]
    fn locally_initiated_stream_reaches_established_on_ack() {
        let (state, send_flags) = derive_send_flags(StreamState::Init);
        assert_eq!(state, StreamState::SynSend);
        assert_eq!(send_flags, flags::SYN);

        let (state, _) = apply_received_flags(state, flags::ACK, 3).unwrap();
        assert_eq!(state, StreamState::Established);
    }

    #[test]
    fn fin_fin_close_sequence() {
        let (state, actions) = apply_sent_fin(StreamState::Established);
        assert_eq!(state, StreamState::LocalClose);
        assert!(actions.is_empty());

        let (state, actions) = apply_received_flags(state, flags::FIN, 3).unwrap();
        assert_eq!(state, StreamState::Closed);
        assert_eq!(actions, vec![Action::Teardown]);
    }

    #[test]
    fn rst_resets_from_any_state() {
        for state in [
            StreamState::Init,
            StreamState::SynSend,
            StreamState::Established,
            StreamState::LocalClose,
        ] {
            let (next, actions) = apply_received_flags(state, flags::RST, 3).unwrap();
            assert_eq!(next, StreamState::Reset);
            assert_eq!(actions, vec![Action::Teardown]);
        }
    }

    #[test]
    fn unexpected_fin_on_terminal_state_is_protocol_error() {
        assert!(apply_received_flags(StreamState::Closed, flags::FIN, 3).is_err());
        assert!(apply_received_flags(StreamState::RemoteClose, flags::FIN, 3).is_err());
    }
}
