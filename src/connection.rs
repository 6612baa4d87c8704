// ABOUTME: Owns the per-session registry, go-away/session-id state, and the buffered read loop over one transport
// ABOUTME: Transformed from the original buffered TcpStream reader/writer to decode-dispatch-loop one mux frame at a time

use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{instrument, trace};

use crate::config::MuxConfig;
use crate::error::{CodecError, MuxError, Result};
use crate::frame::{flags, write_frame_header, FrameHeader, FrameType, GoAwayReason, HEADER_LEN};
use crate::registry::StreamRegistry;
use crate::router::{FrameRouter, RouterEvent};
use crate::stream::{Stream, StreamId, StreamState};
use crate::transport::{PeerRegistry, PeerSocket};

/// Default size of the connection's read buffer. Frames rarely exceed this,
/// but DATA payloads up to a full window will cause it to grow; see
/// `read_frame`.
const INITIAL_READ_BUFFER: usize = 4 * 1024;

/// Owns one multiplexed session over a single underlying transport.
///
/// All mutation happens through `&mut self` methods called from a single
/// task, so there is no internal locking, matching the single-threaded
/// cooperative concurrency model this core assumes.
#[derive(Debug)]
pub struct Connection<T> {
    transport: BufWriter<T>,
    buffer: BytesMut,
    registry: StreamRegistry,
    router: FrameRouter,
    config: MuxConfig,
    next_session_id: u32,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Wrap `transport` in a new connection, with the control stream (id 1)
    /// already registered.
    pub fn new(transport: T, config: MuxConfig) -> Self {
        let mut registry = StreamRegistry::new();
        registry.register_control_stream(&config);

        Connection {
            transport: BufWriter::new(transport),
            buffer: BytesMut::with_capacity(INITIAL_READ_BUFFER),
            registry,
            router: FrameRouter::new(),
            config,
            next_session_id: 1,
        }
    }

    /// Allocate the next locally-initiated stream id: odd values starting
    /// at 1, incrementing by 2.
    pub fn next_session_id(&mut self) -> StreamId {
        let id = self.next_session_id;
        self.next_session_id += 2;
        id
    }

    /// Re-seed session id allocation to 1, called on reconnect.
    pub fn reset_session_id(&mut self) {
        self.next_session_id = 1;
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Open a new locally-initiated stream: allocates an id and registers
    /// it in `Init` state. The SYN flag is carried by the first frame
    /// `mux_write` sends for it, not by this call.
    pub fn open_stream(&mut self) -> StreamId {
        let id = self.next_session_id();
        self.registry
            .insert(Stream::new(id, StreamState::Init, &self.config));
        id
    }

    /// Send a FIN on `stream_id`, moving it towards half-close.
    pub async fn close_stream(&mut self, stream_id: StreamId) -> Result<()> {
        let Some(stream) = self.registry.get_mut(stream_id) else {
            return Err(MuxError::StreamClosed(stream_id));
        };
        let (next_state, actions) = crate::stream::apply_sent_fin(stream.state);
        stream.state = next_state;
        let teardown = actions.contains(&crate::stream::Action::Teardown);

        write_frame_header(
            &mut self.transport,
            FrameHeader::new(FrameType::Data, flags::FIN, stream_id, 0),
        )
        .await?;
        self.transport.flush().await?;

        if teardown {
            self.registry.remove(stream_id);
        }
        Ok(())
    }

    /// Send a RST on `stream_id`, tearing it down immediately.
    pub async fn reset_stream(&mut self, stream_id: StreamId) -> Result<()> {
        write_frame_header(
            &mut self.transport,
            FrameHeader::new(FrameType::Data, flags::RST, stream_id, 0),
        )
        .await?;
        self.transport.flush().await?;
        self.registry.remove(stream_id);
        Ok(())
    }

    /// Write `data` on `stream_id` via the stream I/O pump, flushing the
    /// transport once the frame (if any) has been written.
    ///
    /// When `tcp_mux_enabled` is false the core is a transparent passthrough:
    /// `data` goes straight onto the transport with no frame header, window
    /// accounting, or ring staging.
    pub async fn write_stream(&mut self, stream_id: StreamId, data: &[u8]) -> Result<usize> {
        if !self.config.tcp_mux_enabled {
            self.transport.write_all(data).await?;
            self.transport.flush().await?;
            return Ok(data.len());
        }

        let Some(stream) = self.registry.get_mut(stream_id) else {
            return Err(MuxError::StreamClosed(stream_id));
        };
        let accepted = crate::pump::mux_write(&mut self.transport, stream, data).await?;
        self.transport.flush().await?;
        Ok(accepted)
    }

    /// Drain the bytes `RouterEvent::DataDelivered { stream_id, .. }` just
    /// buffered in `stream_id`'s rx ring out to the peer socket `peers` has
    /// attached to it. Returns the number of bytes handed off.
    ///
    /// A stream with no attached peer socket (the control stream, whose
    /// bytes the outer control-plane protocol reads out of the registry
    /// directly instead) or one that was torn down between the event firing
    /// and this call is left untouched and returns `Ok(0)` without consuming
    /// any buffered bytes.
    pub async fn deliver_to_peer<P: PeerRegistry>(
        &mut self,
        peers: &mut P,
        stream_id: StreamId,
    ) -> Result<usize> {
        let Some(socket) = peers.get_mut(stream_id) else {
            return Ok(0);
        };
        let Some(stream) = self.registry.get_mut(stream_id) else {
            return Ok(0);
        };

        let pending = stream.rx_ring.len();
        if pending == 0 {
            return Ok(0);
        }

        let mut staged = vec![0u8; pending];
        stream.rx_ring.pop(&mut staged)?;
        socket.write(&staged).await?;
        Ok(pending)
    }

    /// Invalidate and drop the peer socket attached to `stream_id`, called
    /// once a stream reaches a terminal state
    /// (`RouterEvent::StreamTornDown`).
    pub fn release_peer<P: PeerRegistry>(&mut self, peers: &mut P, stream_id: StreamId) {
        peers.remove(stream_id);
    }

    /// Emit GO_AWAY with the given reason and mark the local side as having
    /// given up new streams.
    pub async fn send_go_away(&mut self, reason: GoAwayReason) -> Result<()> {
        self.router.local_go_away = true;
        write_frame_header(
            &mut self.transport,
            FrameHeader::new(FrameType::GoAway, flags::ZERO, 0, reason as u32),
        )
        .await?;
        self.transport.flush().await
    }

    /// Read and dispatch exactly one frame from the transport, blocking
    /// until one is available or the connection is closed by the peer.
    /// Returns `None` on a clean EOF with no partial frame pending.
    #[instrument(skip(self))]
    pub async fn on_frame(&mut self) -> Result<Option<RouterEvent>> {
        if !self.config.tcp_mux_enabled {
            return self.on_frame_passthrough().await;
        }

        loop {
            if let Some((header, payload_start)) = self.try_parse_header()? {
                let payload_len = if header.frame_type == FrameType::Data {
                    header.length as usize
                } else {
                    0
                };

                if self.buffer.len() < payload_start + payload_len {
                    if 0 == self.transport.read_buf(&mut self.buffer).await? {
                        return Err(MuxError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection reset while a DATA payload was in flight",
                        )));
                    }
                    continue;
                }

                let payload = self.buffer[payload_start..payload_start + payload_len].to_vec();
                self.buffer.advance(payload_start + payload_len);

                let event = self
                    .router
                    .route(&mut self.transport, &mut self.registry, &self.config, header, &payload)
                    .await;

                match event {
                    Ok(event) => return Ok(Some(event)),
                    Err(err) => {
                        if let Some(reason) = err.go_away_reason() {
                            self.registry.reset_all();
                            let _ = self.send_go_away(reason).await;
                        }
                        return Err(err);
                    }
                }
            }

            if 0 == self.transport.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(MuxError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection reset by peer mid-frame",
                    )))
                };
            }
        }
    }

    /// Passthrough read path used when `tcp_mux_enabled` is false: bytes
    /// flow unframed, so a "frame" here is just whatever the transport
    /// happens to have ready. Delivered against the control stream id,
    /// since there is no per-stream framing to address it by.
    async fn on_frame_passthrough(&mut self) -> Result<Option<RouterEvent>> {
        if self.buffer.is_empty() && 0 == self.transport.read_buf(&mut self.buffer).await? {
            return Ok(None);
        }

        let delivered = std::mem::take(&mut self.buffer);
        let len = delivered.len() as u32;
        let control = self
            .registry
            .get_mut(crate::registry::CONTROL_STREAM_ID)
            .expect("control stream always resident");
        let appended = control.rx_ring.append(&delivered);
        if (appended as u32) < len {
            return Err(MuxError::Internal(
                "control stream rx ring overflowed in passthrough mode".into(),
            ));
        }

        Ok(Some(RouterEvent::DataDelivered {
            stream_id: crate::registry::CONTROL_STREAM_ID,
            len,
        }))
    }

    /// Checks whether a full header is buffered and decodes it without
    /// consuming the (possibly still arriving) DATA payload. Returns the
    /// header and the buffer offset its payload starts at.
    fn try_parse_header(&mut self) -> Result<Option<(FrameHeader, usize)>> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&self.buffer[..]);
        match FrameHeader::decode(&mut cursor) {
            Ok(header) => {
                trace!(frame_type = ?header.frame_type, stream_id = header.stream_id, "decoded frame header");
                Ok(Some((header, HEADER_LEN)))
            }
            Err(CodecError::Incomplete) => Ok(None),
            Err(other) => Err(other.into()),
        }
    }
}
