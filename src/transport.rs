// ABOUTME: Collaborator interfaces the mux core consumes: the local peer socket per stream and its lookup table
// ABOUTME: Uses native async-fn-in-traits, following this codebase's client trait layering rather than boxed futures

use std::future::Future;

use crate::stream::StreamId;

/// A local OS socket that one stream's bytes are proxied to/from.
///
/// This is an external collaborator: the embedding application supplies an
/// implementation (typically a `TcpStream` to a local service), the core
/// only calls through this trait. It never constructs or owns the
/// underlying socket.
pub trait PeerSocket: Send {
    /// Toggle whether the peer socket's read side is active. The core
    /// disables this when the stream's send window is exhausted and
    /// re-enables it when a WINDOW_UPDATE restores credit.
    fn enable_read(&mut self, enabled: bool);

    /// Write bytes delivered from a DATA frame to the local socket.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = std::io::Result<()>> + Send;
}

/// Looks up the peer socket attached to a given stream id, if any. Streams
/// with no attached peer socket (e.g. the control stream) deliver payload
/// by draining `rx_ring` directly instead; see `RouterEvent::DataDelivered`.
pub trait PeerRegistry: Send {
    type Socket: PeerSocket;

    fn get_mut(&mut self, stream_id: StreamId) -> Option<&mut Self::Socket>;

    /// Invalidate and drop any peer socket bound to `stream_id`, called when
    /// a stream reaches a terminal state.
    fn remove(&mut self, stream_id: StreamId);
}
