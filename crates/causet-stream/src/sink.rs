//! Stream consumer: quantises each snapshot for the current camera and
//! pushes one packet to the transport.

use std::sync::Arc;

use causet_pipeline::{SinkError, SnapshotDelta, SnapshotSink};
use causet_types::Snapshot;
use tracing::debug;

use crate::brick::BrickQuantizer;
use crate::packet::StreamPacket;
use crate::state::AppState;
use crate::transport::Transport;

/// [`SnapshotSink`] that streams live packets.
///
/// Frames are fire-and-forget: nothing is buffered or retried, the next
/// snapshot supersedes a lost one.
pub struct StreamSink {
    quantizer: BrickQuantizer,
    state: Arc<AppState>,
    transport: Arc<dyn Transport>,
}

impl StreamSink {
    /// Stream through the state's broadcast transport.
    pub fn new(quantizer: BrickQuantizer, state: Arc<AppState>) -> Self {
        let transport: Arc<dyn Transport> = state.transport.clone();
        Self {
            quantizer,
            state,
            transport,
        }
    }

    /// Stream through another transport, still reading the camera and
    /// recording stats in `state`.
    pub fn with_transport(
        quantizer: BrickQuantizer,
        state: Arc<AppState>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            quantizer,
            state,
            transport,
        }
    }

    fn stream(&self, snapshot: &Snapshot, delta: &SnapshotDelta) -> Result<(), SinkError> {
        let camera = self.state.camera();
        let packet = StreamPacket::assemble(snapshot, &camera, &self.quantizer)
            .map_err(|e| SinkError::new("quantize", e))?;
        let frame = packet.to_json().map_err(|e| SinkError::new("serialize", e))?;
        let viewers = self
            .transport
            .send(&frame)
            .map_err(|e| SinkError::new("transport", e))?;
        self.state
            .stats
            .record_packet(packet.tick, packet.bricks.len(), viewers);
        debug!(
            tick = packet.tick,
            bricks = packet.bricks.len(),
            bytes = frame.len(),
            viewers,
            changed = delta.added.len() + delta.removed.len(),
            "stream packet sent"
        );
        Ok(())
    }
}

impl SnapshotSink for StreamSink {
    fn name(&self) -> &str {
        "stream"
    }

    fn consume(&mut self, snapshot: &Snapshot, delta: &SnapshotDelta) -> Result<(), SinkError> {
        self.stream(snapshot, delta).inspect_err(|_| {
            self.state.stats.record_failure();
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use causet_types::{EntityRecord, Momentum, Position, Scalar, Vector};

    use super::*;
    use crate::camera::Camera;
    use crate::error::TransportError;
    use crate::packet::PacketDecoder;

    struct Refusing;

    impl Transport for Refusing {
        fn send(&self, _frame: &str) -> Result<usize, TransportError> {
            Err(TransportError::Closed)
        }
    }

    fn snapshot(tick: u32) -> Snapshot {
        let record = EntityRecord {
            position: Position::from(vec![20, 0, 0]),
            energy: Scalar::from(8_u32),
            generation: Scalar::from(2_u32),
            momentum: Momentum {
                cost: Scalar::ZERO,
                vector: Vector::from(vec![1, 0, 0]),
            },
            birth_tick: Scalar::ZERO,
        };
        Snapshot::new(Scalar::from(tick), 3, vec![record])
    }

    fn sink(state: &Arc<AppState>) -> StreamSink {
        StreamSink::new(BrickQuantizer::new(4, 8.0, 16.0).unwrap(), Arc::clone(state))
    }

    #[test]
    fn streams_to_subscribed_viewers() {
        let state = Arc::new(AppState::default());
        let mut rx = state.transport.subscribe();
        let mut sink = sink(&state);

        state.set_camera(Camera {
            cam_pos: [22.0, 2.0, 2.0],
            cam_dir: [0.0, 0.0, 1.0],
        });
        let snap = snapshot(4);
        sink.consume(&snap, &SnapshotDelta::between(None, &snap)).unwrap();

        let frame = rx.try_recv().unwrap();
        let packet = PacketDecoder::new().feed(&frame).unwrap();
        assert_eq!(packet.tick, 4);
        assert_eq!(packet.cam_pos, [22.0, 2.0, 2.0]);
        assert_eq!(packet.bricks.len(), 1);
        assert_eq!(packet.bricks[0].origin, [20, 0, 0]);

        let stats = state.stats.read();
        assert_eq!(stats.packets_sent, 1);
        assert_eq!(stats.last_viewers, 1);
        assert_eq!(stats.last_tick, Some(4));
    }

    #[test]
    fn camera_far_away_sends_empty_packet() {
        let state = Arc::new(AppState::default());
        let mut rx = state.transport.subscribe();
        let mut sink = sink(&state);
        let snap = snapshot(1);
        sink.consume(&snap, &SnapshotDelta::between(None, &snap)).unwrap();
        let packet = StreamPacket::decode(&rx.try_recv().unwrap()).unwrap();
        assert!(packet.bricks.is_empty());
    }

    #[test]
    fn no_viewers_is_not_a_failure() {
        let state = Arc::new(AppState::default());
        let mut sink = sink(&state);
        let snap = snapshot(2);
        sink.consume(&snap, &SnapshotDelta::between(None, &snap)).unwrap();
        assert_eq!(state.stats.read().last_viewers, 0);
        assert_eq!(state.stats.read().failures, 0);
    }

    #[test]
    fn transport_failure_is_reported_and_counted() {
        let state = Arc::new(AppState::default());
        let mut sink = StreamSink::with_transport(
            BrickQuantizer::new(4, 8.0, 16.0).unwrap(),
            Arc::clone(&state),
            Arc::new(Refusing),
        );
        let snap = snapshot(3);
        let err = sink
            .consume(&snap, &SnapshotDelta::between(None, &snap))
            .unwrap_err();
        assert_eq!(err.stage, "transport");
        assert_eq!(state.stats.read().failures, 1);
        assert_eq!(state.stats.read().packets_sent, 0);
    }
}
