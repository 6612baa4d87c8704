// ABOUTME: Dispatches decoded frames to the stream state machine, flow controller and GO_AWAY bookkeeping
// ABOUTME: Grounded in handle_tcp_mux_stream / handle_tcp_mux_ping / handle_tcp_mux_go_away, replacing their assert-on-unknown-stream path with GO_AWAY + teardown

use tokio::io::AsyncWrite;
use tracing::{debug, error, warn};

use crate::config::MuxConfig;
use crate::error::{MuxError, Result};
use crate::flow::{self, FlowStats, WindowUpdate};
use crate::frame::{flags, write_frame_header, FrameHeader, FrameType, GoAwayReason};
use crate::registry::StreamRegistry;
use crate::stream::{apply_received_flags, Action, Stream, StreamId, StreamState};

/// Outcome of routing a single frame, reported back to the connection loop
/// so it can forward delivered bytes to the right peer socket or otherwise
/// react.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// `len` bytes were appended to `stream_id`'s rx ring; the connection
    /// loop should drain them to the attached peer socket via
    /// `Connection::deliver_to_peer` (or, for the control stream, to the
    /// outer protocol handler).
    DataDelivered { stream_id: StreamId, len: u32 },
    /// The peer granted additional send credit; apply `actions` to the
    /// attached peer socket (typically re-enabling its read side).
    WindowGranted {
        stream_id: StreamId,
        actions: Vec<Action>,
    },
    /// A stream reached a terminal state and was removed from the registry;
    /// the connection loop should release its peer socket via
    /// `Connection::release_peer`.
    StreamTornDown { stream_id: StreamId },
    /// We echoed a PING back to the peer.
    PingEchoed,
    /// The peer ACKed a PING we sent; out of scope here beyond reporting it
    /// (RTT bookkeeping belongs to the control-plane collaborator).
    PingAcked { token: u32 },
    /// The peer signaled GO_AWAY; no new streams should be opened locally.
    RemoteGoAway(GoAwayReason),
}

/// Routes decoded frames for one connection. Owns the go-away flags and
/// flow-control statistics; the stream registry and transport are borrowed
/// per call so this can be driven from a single-threaded connection loop
/// without any internal locking.
#[derive(Debug, Default)]
pub struct FrameRouter {
    pub local_go_away: bool,
    pub remote_go_away: bool,
    pub stats: FlowStats,
}

impl FrameRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch one decoded frame. `payload` must be exactly `header.length`
    /// bytes when `header.frame_type` is `Data`, and empty otherwise; the
    /// caller is responsible for having read it off the transport already.
    pub async fn route<W: AsyncWrite + Unpin>(
        &mut self,
        transport: &mut W,
        registry: &mut StreamRegistry,
        config: &MuxConfig,
        header: FrameHeader,
        payload: &[u8],
    ) -> Result<RouterEvent> {
        match header.frame_type {
            FrameType::Data => self.handle_data(transport, registry, config, header, payload).await,
            FrameType::WindowUpdate => self.handle_window_update(registry, header).await,
            FrameType::Ping => self.handle_ping(transport, header).await,
            FrameType::GoAway => self.handle_go_away(header),
        }
    }

    async fn handle_data<W: AsyncWrite + Unpin>(
        &mut self,
        transport: &mut W,
        registry: &mut StreamRegistry,
        config: &MuxConfig,
        header: FrameHeader,
        payload: &[u8],
    ) -> Result<RouterEvent> {
        let stream_id = header.stream_id;

        if header.length > config.max_stream_window_size {
            error!(
                stream_id,
                length = header.length,
                max = config.max_stream_window_size,
                "DATA frame exceeds maximum stream window size"
            );
            return Err(MuxError::Protocol {
                stream_id,
                reason: format!(
                    "DATA length {} exceeds max stream window size {}",
                    header.length, config.max_stream_window_size
                ),
            });
        }

        if flags::has(header.flags, flags::SYN) {
            if self.local_go_away {
                warn!(stream_id, "rejecting new stream after local GO_AWAY");
                write_frame_header(
                    transport,
                    FrameHeader::new(FrameType::WindowUpdate, flags::RST, stream_id, 0),
                )
                .await?;
                return Ok(RouterEvent::StreamTornDown { stream_id });
            }
            if !registry.contains(stream_id) {
                registry.insert(Stream::new(stream_id, StreamState::Init, config));
            }
        }

        if !registry.contains(stream_id) {
            error!(stream_id, "DATA frame for unknown stream");
            return Err(MuxError::Protocol {
                stream_id,
                reason: "DATA frame references unknown stream id".into(),
            });
        }

        let (teardown, delivered_len, update) = {
            let stream = registry
                .get_mut(stream_id)
                .expect("presence checked above");

            let (next_state, actions) = apply_received_flags(stream.state, header.flags, stream_id)?;
            stream.state = next_state;

            flow::accept_incoming_data(stream, header.length)?;
            let appended = stream.rx_ring.append(payload);
            if appended < payload.len() {
                return Err(MuxError::Internal(format!(
                    "rx ring for stream {} overflowed while buffering {} delivered bytes",
                    stream.id,
                    payload.len()
                )));
            }

            let update = flow::maybe_emit_window_update(stream, header.length, config);
            self.stats.record_delivery(header.length);

            (actions.contains(&Action::Teardown), header.length, update)
        };

        if let Some(WindowUpdate { flags: f, stream_id: sid, delta }) = update {
            write_frame_header(transport, FrameHeader::new(FrameType::WindowUpdate, f, sid, delta)).await?;
            self.stats.record_window_update();
        }

        if teardown {
            registry.remove(stream_id);
            return Ok(RouterEvent::StreamTornDown { stream_id });
        }

        Ok(RouterEvent::DataDelivered {
            stream_id,
            len: delivered_len,
        })
    }

    async fn handle_window_update(
        &mut self,
        registry: &mut StreamRegistry,
        header: FrameHeader,
    ) -> Result<RouterEvent> {
        let stream_id = header.stream_id;
        if !registry.contains(stream_id) {
            return Err(MuxError::Protocol {
                stream_id,
                reason: "WINDOW_UPDATE for unknown stream id".into(),
            });
        }

        let (teardown, actions) = {
            let stream = registry
                .get_mut(stream_id)
                .expect("presence checked above");
            let (next_state, mut state_actions) = apply_received_flags(stream.state, header.flags, stream_id)?;
            stream.state = next_state;

            if !state_actions.contains(&Action::Teardown) {
                state_actions.extend(flow::apply_window_update(stream, header.length));
            }

            let teardown = state_actions.contains(&Action::Teardown);
            (teardown, state_actions)
        };

        if teardown {
            registry.remove(stream_id);
            return Ok(RouterEvent::StreamTornDown { stream_id });
        }

        Ok(RouterEvent::WindowGranted { stream_id, actions })
    }

    async fn handle_ping<W: AsyncWrite + Unpin>(
        &mut self,
        transport: &mut W,
        header: FrameHeader,
    ) -> Result<RouterEvent> {
        if flags::has(header.flags, flags::SYN) {
            write_frame_header(
                transport,
                FrameHeader::new(FrameType::Ping, flags::ACK, 0, header.length),
            )
            .await?;
            debug!(token = header.length, "echoed PING");
            return Ok(RouterEvent::PingEchoed);
        }

        Ok(RouterEvent::PingAcked { token: header.length })
    }

    fn handle_go_away(&mut self, header: FrameHeader) -> Result<RouterEvent> {
        let reason = GoAwayReason::from_u32(header.length).ok_or_else(|| MuxError::Protocol {
            stream_id: 0,
            reason: format!("unexpected GO_AWAY code {}", header.length),
        })?;

        match reason {
            GoAwayReason::Normal => {
                self.remote_go_away = true;
                debug!("peer sent GO_AWAY(NORMAL)");
            }
            GoAwayReason::ProtoErr => error!("peer sent GO_AWAY(PROTO_ERR)"),
            GoAwayReason::InternalErr => error!("peer sent GO_AWAY(INTERNAL_ERR)"),
        }

        Ok(RouterEvent::RemoteGoAway(reason))
    }
}
