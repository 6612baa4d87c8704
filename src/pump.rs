// ABOUTME: Bidirectional glue between a peer socket and a stream's tx/rx rings, gated by the send window
// ABOUTME: mux_write generalizes the original's three send-window branches into one budget formula; mux_read fills the rx ring

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{MuxError, Result};
use crate::frame::{FrameHeader, FrameType};
use crate::stream::{derive_send_flags, Stream, StreamState};

/// Write `data` originating from the local peer socket onto the wire for
/// `stream`, respecting its send window and tx ring, mirroring `tmux_write`.
///
/// Returns the number of bytes actually accepted (written to the transport
/// or staged in the ring). A short return relative to `data.len()` is
/// backpressure, not an error: the caller should retry the remainder once
/// the peer grants more window.
pub async fn mux_write<W: AsyncWrite + Unpin>(
    transport: &mut W,
    stream: &mut Stream,
    data: &[u8],
) -> Result<usize> {
    if matches!(
        stream.state,
        StreamState::LocalClose | StreamState::Closed | StreamState::Reset
    ) {
        return Ok(0);
    }

    if stream.send_window == 0 {
        return Ok(stream.tx_ring.append(data));
    }

    // The original computes this budget through three separate branches
    // depending on how send_window compares to the ring's occupancy; all
    // three reduce to this single formula.
    let budget = stream
        .send_window
        .min(stream.tx_ring.len() as u32 + data.len() as u32) as usize;

    let (next_state, send_flags) = derive_send_flags(stream.state);
    stream.state = next_state;

    let header = FrameHeader::new(FrameType::Data, send_flags, stream.id, budget as u32);
    let mut header_buf = BytesMut::with_capacity(crate::frame::HEADER_LEN);
    header.encode(&mut header_buf);
    tokio::io::AsyncWriteExt::write_all(transport, &header_buf).await?;

    let drained = stream.tx_ring.drain_to_transport(transport, budget).await?;
    let from_fresh = budget - drained;
    if from_fresh > 0 {
        tokio::io::AsyncWriteExt::write_all(transport, &data[..from_fresh]).await?;
    }
    let leftover = &data[from_fresh..];
    if !leftover.is_empty() {
        let appended = stream.tx_ring.append(leftover);
        if appended < leftover.len() {
            return Err(MuxError::Internal(format!(
                "tx ring for stream {} overflowed while staging leftover bytes",
                stream.id
            )));
        }
    }

    stream.send_window -= budget as u32;
    Ok(budget)
}

/// Fill `stream`'s rx ring with up to `n` bytes read from the transport,
/// mirroring `tmux_read`. Called by the reactor when the underlying
/// connection becomes readable for this stream.
pub async fn mux_read<R: AsyncRead + Unpin>(
    source: &mut R,
    stream: &mut Stream,
    n: usize,
) -> Result<usize> {
    stream.rx_ring.fill_from_transport(source, n).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MuxConfig;
    use crate::frame::flags;

    #[tokio::test]
    async fn closed_stream_discards_writes() {
        let config = MuxConfig::default();
        let mut stream = Stream::new(3, StreamState::Closed, &config);
        let mut sink = Vec::new();
        let accepted = mux_write(&mut sink, &mut stream, b"hello").await.unwrap();
        assert_eq!(accepted, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn zero_send_window_stages_into_tx_ring() {
        let config = MuxConfig::default();
        let mut stream = Stream::new(3, StreamState::Established, &config);
        stream.send_window = 0;

        let mut sink = Vec::new();
        let accepted = mux_write(&mut sink, &mut stream, b"hello").await.unwrap();
        assert_eq!(accepted, 5);
        assert!(sink.is_empty());
        assert_eq!(stream.tx_ring.len(), 5);
    }

    #[tokio::test]
    async fn open_window_emits_one_data_frame_with_syn_on_first_write() {
        let config = MuxConfig::default();
        let mut stream = Stream::new(3, StreamState::Init, &config);

        let mut sink = Vec::new();
        let accepted = mux_write(&mut sink, &mut stream, b"hello").await.unwrap();
        assert_eq!(accepted, 5);
        assert_eq!(stream.state, StreamState::SynSend);

        let header = FrameHeader::decode(&mut std::io::Cursor::new(&sink[..12])).unwrap();
        assert_eq!(header.frame_type as u8, FrameType::Data as u8);
        assert_eq!(header.flags, flags::SYN);
        assert_eq!(header.length, 5);
        assert_eq!(&sink[12..], b"hello");
        assert_eq!(stream.send_window, config.max_stream_window_size - 5);
    }

    #[tokio::test]
    async fn staged_ring_bytes_drain_before_fresh_bytes() {
        let config = MuxConfig::default();
        let mut stream = Stream::new(3, StreamState::Established, &config);
        stream.tx_ring.append(b"staged");

        let mut sink = Vec::new();
        mux_write(&mut sink, &mut stream, b"fresh").await.unwrap();
        assert_eq!(&sink[12..], b"stagedfresh");
    }

    #[tokio::test]
    async fn mux_read_fills_rx_ring_from_transport() {
        let config = MuxConfig::default();
        let mut stream = Stream::new(3, StreamState::Established, &config);
        let mut source = std::io::Cursor::new(b"payload bytes".to_vec());

        let read = mux_read(&mut source, &mut stream, 7).await.unwrap();
        assert_eq!(read, 7);
        assert_eq!(stream.rx_ring.len(), 7);
    }
}
