//! Live brick streaming for the causet engine.
//!
//! The stream consumer ([`StreamSink`]) quantises each sampled snapshot
//! into bricks visible from the viewer's camera and pushes one JSON
//! [`StreamPacket`] through a [`Transport`]. The bundled Axum server
//! exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/stream`) delivering packets via
//!   [`tokio::sync::broadcast`] and accepting camera updates
//! - **Status endpoint** (`/api/status`) with stream counters
//! - **Minimal HTML page** (`GET /`)
//!
//! Packets are fire-and-forget. A lost frame is superseded by the next
//! one; the decode side drops malformed frames and carries on.

pub mod brick;
pub mod camera;
pub mod error;
pub mod handlers;
pub mod packet;
pub mod router;
pub mod server;
pub mod sink;
pub mod startup;
pub mod state;
pub mod transport;
pub mod ws;

pub use brick::{Brick, BrickQuantizer};
pub use camera::Camera;
pub use error::{StreamError, TransportError};
pub use packet::{PacketDecoder, StreamPacket};
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use sink::StreamSink;
pub use startup::spawn_stream_server;
pub use state::{AppState, StatsReading, StreamStats};
pub use transport::{BroadcastTransport, Transport};
