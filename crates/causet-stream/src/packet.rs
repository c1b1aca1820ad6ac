//! JSON framing of live stream packets.
//!
//! A [`StreamPacket`] is one frame per streamed tick. The decode side
//! validates every brick; [`PacketDecoder`] is the viewer-side loop that
//! drops a malformed frame, logs it, and keeps going.

use causet_types::Snapshot;
use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use crate::brick::{Brick, BrickQuantizer, MAX_BRICK_SIZE};
use crate::camera::Camera;
use crate::error::StreamError;

/// One live frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct StreamPacket {
    /// Tick the bricks were quantised from.
    #[ts(type = "number")]
    pub tick: u64,
    /// Camera position used for visibility.
    pub cam_pos: [f32; 3],
    /// Camera direction.
    pub cam_dir: [f32; 3],
    /// Brick edge in cells.
    pub brick_size: u32,
    /// Visible bricks, ordered by origin.
    pub bricks: Vec<Brick>,
}

impl StreamPacket {
    /// Quantise `snapshot` as seen from `camera`.
    pub fn assemble(
        snapshot: &Snapshot,
        camera: &Camera,
        quantizer: &BrickQuantizer,
    ) -> Result<Self, StreamError> {
        let tick = snapshot.tick.to_u64().ok_or_else(|| StreamError::OutOfRange {
            field: "tick",
            value: snapshot.tick.to_string(),
        })?;
        Ok(Self {
            tick,
            cam_pos: camera.cam_pos,
            cam_dir: camera.cam_dir,
            brick_size: quantizer.brick_size(),
            bricks: quantizer.quantize(snapshot, camera.cam_pos),
        })
    }

    /// Serialise to a text frame.
    pub fn to_json(&self) -> Result<String, StreamError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a text frame.
    pub fn decode(text: &str) -> Result<Self, StreamError> {
        let packet: Self = serde_json::from_str(text)?;
        packet.validate()?;
        Ok(packet)
    }

    /// Check every brick and the packet-level fields.
    ///
    /// Every brick must be a full `brickSize` cube aligned to a multiple of
    /// `brickSize`.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.brick_size == 0 || self.brick_size > MAX_BRICK_SIZE {
            return Err(StreamError::malformed(format!(
                "brickSize {} is outside 1..={MAX_BRICK_SIZE}",
                self.brick_size
            )));
        }
        if !self.cam_pos.iter().chain(&self.cam_dir).all(|c| c.is_finite()) {
            return Err(StreamError::malformed("camera components must be finite"));
        }
        let side = i64::from(self.brick_size);
        for brick in &self.bricks {
            if brick.dims.iter().any(|&d| u32::from(d) != self.brick_size) {
                return Err(StreamError::malformed(format!(
                    "brick at {:?} has dims {:?}, brickSize is {}",
                    brick.origin, brick.dims, self.brick_size
                )));
            }
            if brick.origin.iter().any(|o| o.rem_euclid(side) != 0) {
                return Err(StreamError::malformed(format!(
                    "brick origin {:?} is not aligned to brickSize {}",
                    brick.origin, self.brick_size
                )));
            }
            brick.verify()?;
        }
        Ok(())
    }

    /// Total cells across all bricks.
    pub fn cell_count(&self) -> usize {
        self.bricks.iter().map(Brick::cells).sum()
    }
}

/// Viewer-side decoder that survives bad frames.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    accepted: u64,
    dropped: u64,
    last_tick: Option<u64>,
}

impl PacketDecoder {
    /// A fresh decoder.
    pub const fn new() -> Self {
        Self {
            accepted: 0,
            dropped: 0,
            last_tick: None,
        }
    }

    /// Decode one frame; malformed frames are logged, counted, and yield
    /// `None`.
    pub fn feed(&mut self, text: &str) -> Option<StreamPacket> {
        match StreamPacket::decode(text) {
            Ok(packet) => {
                self.accepted = self.accepted.saturating_add(1);
                self.last_tick = Some(packet.tick);
                Some(packet)
            }
            Err(e) => {
                self.dropped = self.dropped.saturating_add(1);
                warn!(error = %e, bytes = text.len(), dropped = self.dropped, "Dropping malformed stream packet");
                None
            }
        }
    }

    /// Frames decoded successfully.
    pub const fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Frames dropped as malformed.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Tick of the last good frame.
    pub const fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use causet_types::{EntityRecord, Momentum, Position, Scalar, Vector};
    use serde_json::Value;

    use super::*;

    fn snapshot() -> Snapshot {
        let record = EntityRecord {
            position: Position::from(vec![1, 2, 3]),
            energy: Scalar::from(30_u32),
            generation: Scalar::from(3_u32),
            momentum: Momentum {
                cost: Scalar::ZERO,
                vector: Vector::from(vec![0, 0, 1]),
            },
            birth_tick: Scalar::ZERO,
        };
        Snapshot::new(Scalar::from(10_u32), 3, vec![record])
    }

    fn packet() -> StreamPacket {
        let quantizer = BrickQuantizer::new(4, 50.0, 60.0).unwrap();
        StreamPacket::assemble(&snapshot(), &Camera::default(), &quantizer).unwrap()
    }

    #[test]
    fn bricks_must_match_the_packet_brick_size() {
        let mut wrong_dims = packet();
        wrong_dims.bricks[0] =
            Brick::from_grid([0, 0, 0], [2, 2, 2], &[0.0; 8], &[0.0; 24], 60.0).unwrap();
        assert!(matches!(wrong_dims.validate(), Err(StreamError::Malformed(_))));

        let mut misaligned = packet();
        misaligned.bricks[0].origin = [1, 0, 0];
        assert!(matches!(misaligned.validate(), Err(StreamError::Malformed(_))));

        let mut oversized = packet();
        oversized.brick_size = MAX_BRICK_SIZE + 1;
        oversized.bricks.clear();
        assert!(oversized.validate().is_err());

        let mut negative = packet();
        negative.bricks[0].origin = [-4, 0, 8];
        assert!(negative.validate().is_ok());
    }

    #[test]
    fn view_direction_is_echoed_not_culled() {
        let quantizer = BrickQuantizer::new(4, 50.0, 60.0).unwrap();
        let ahead = Camera::default();
        let behind = Camera {
            cam_dir: [0.0, 0.0, -1.0],
            ..ahead
        };
        let a = StreamPacket::assemble(&snapshot(), &ahead, &quantizer).unwrap();
        let b = StreamPacket::assemble(&snapshot(), &behind, &quantizer).unwrap();
        assert_eq!(a.bricks, b.bricks);
        assert_eq!(b.cam_dir, [0.0, 0.0, -1.0]);
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let json: Value = serde_json::from_str(&packet().to_json().unwrap()).unwrap();
        assert_eq!(json["tick"], 10);
        assert_eq!(json["brickSize"], 4);
        assert_eq!(json["camPos"], serde_json::json!([0.0, 0.0, 0.0]));
        assert_eq!(json["camDir"], serde_json::json!([0.0, 0.0, 1.0]));
        let brick = &json["bricks"][0];
        assert_eq!(brick["origin"], serde_json::json!([0, 0, 0]));
        assert_eq!(brick["dims"], serde_json::json!([4, 4, 4]));
        assert_eq!(brick["energyU8"].as_array().unwrap().len(), 64);
        assert_eq!(brick["parityBits"].as_array().unwrap().len(), 8);
        assert_eq!(brick["momentumQ"].as_array().unwrap().len(), 192);
    }

    #[test]
    fn decode_accepts_what_assemble_produces() {
        let original = packet();
        let decoded = StreamPacket::decode(&original.to_json().unwrap()).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.cell_count(), 64);
    }

    #[test]
    fn decode_rejects_tampered_bricks() {
        let mut bad = packet();
        bad.bricks[0].parity_bits[0] ^= 1;
        assert!(matches!(
            StreamPacket::decode(&bad.to_json().unwrap()),
            Err(StreamError::Malformed(_))
        ));

        let mut short = packet();
        short.bricks[0].momentum_q.pop();
        assert!(StreamPacket::decode(&short.to_json().unwrap()).is_err());

        let mut zero = packet();
        zero.brick_size = 0;
        assert!(StreamPacket::decode(&zero.to_json().unwrap()).is_err());
    }

    #[test]
    fn negative_tick_cannot_be_streamed() {
        let quantizer = BrickQuantizer::new(4, 50.0, 60.0).unwrap();
        let snap = Snapshot::new(Scalar::from(-3), 3, Vec::new());
        assert!(matches!(
            StreamPacket::assemble(&snap, &Camera::default(), &quantizer),
            Err(StreamError::OutOfRange { field: "tick", .. })
        ));
    }

    #[test]
    fn decoder_drops_bad_frames_and_continues() {
        let good = packet().to_json().unwrap();
        let mut decoder = PacketDecoder::new();

        assert!(decoder.feed(&good).is_some());
        assert!(decoder.feed("{\"tick\":").is_none());
        assert!(decoder.feed("{\"tick\":1}").is_none());
        assert!(decoder.feed(&good).is_some());

        assert_eq!(decoder.accepted(), 2);
        assert_eq!(decoder.dropped(), 2);
        assert_eq!(decoder.last_tick(), Some(10));
    }
}
