//! TCP multiplexing core for a reverse-tunnel client: a yamux-compatible
//! framing protocol that multiplexes many logical byte-streams over one
//! underlying TCP connection.
//!
//! This crate implements the hard part of that core only: the frame codec,
//! the per-stream state machine, the sliding receive/send window protocol,
//! the stream registry, and the bidirectional data pump that bridges muxed
//! streams to local sockets under flow-control pressure. The outer
//! control-plane protocol (login, heartbeat, proxy registration), the local
//! peer sockets each stream proxies to, and the event loop driving it all
//! are external collaborators this crate never constructs.
//!
//! # Example
//!
//! ```rust,no_run
//! use tcpmux::{Connection, MuxConfig};
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> tcpmux::Result<()> {
//!     let transport = TcpStream::connect("tunnel.example.com:7000").await?;
//!     let mut conn = Connection::new(transport, MuxConfig::default());
//!
//!     let stream_id = conn.open_stream();
//!     conn.write_stream(stream_id, b"hello").await?;
//!
//!     while let Some(event) = conn.on_frame().await? {
//!         println!("{event:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod flow;
pub mod frame;
pub mod pump;
pub mod registry;
pub mod ring_buffer;
pub mod router;
pub mod stream;
pub mod transport;

pub use config::MuxConfig;
pub use connection::Connection;
pub use error::{CodecError, MuxError, Result};
pub use frame::{flags, FrameHeader, FrameType, GoAwayReason, HEADER_LEN, PROTO_VERSION};
pub use registry::{StreamRegistry, CONTROL_STREAM_ID};
pub use ring_buffer::RingBuffer;
pub use router::{FrameRouter, RouterEvent};
pub use stream::{Action, Stream, StreamId, StreamState};
pub use transport::{PeerRegistry, PeerSocket};
