//! Observer camera shared between viewers and the stream consumer.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::StreamError;

/// Where the viewer is looking from.
///
/// Viewers send this shape over the socket to move the camera; the stream
/// consumer reads it to decide which bricks are visible. Visibility is a
/// sphere of radius `horizon` around `cam_pos`, so `cam_dir` does not cull
/// anything: it is echoed in every packet for the viewer to orient by.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Camera {
    /// Eye position in cell coordinates.
    pub cam_pos: [f32; 3],
    /// View direction, not necessarily normalised. Echoed, not culled on.
    pub cam_dir: [f32; 3],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            cam_pos: [0.0; 3],
            cam_dir: [0.0, 0.0, 1.0],
        }
    }
}

impl Camera {
    /// Parse a viewer camera message.
    ///
    /// Every component must be finite.
    pub fn from_viewer_message(text: &str) -> Result<Self, StreamError> {
        let camera: Self = serde_json::from_str(text)?;
        camera.validate()?;
        Ok(camera)
    }

    /// Reject non-finite components.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.cam_pos.iter().chain(&self.cam_dir).all(|c| c.is_finite()) {
            Ok(())
        } else {
            Err(StreamError::malformed("camera components must be finite"))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_message() {
        let cam =
            Camera::from_viewer_message(r#"{"camPos":[1.5,2,-3],"camDir":[0,1,0]}"#).unwrap();
        assert_eq!(cam.cam_pos, [1.5, 2.0, -3.0]);
        assert_eq!(cam.cam_dir, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(Camera::from_viewer_message("not json").is_err());
        assert!(Camera::from_viewer_message(r#"{"camPos":[1,2],"camDir":[0,0,1]}"#).is_err());
        assert!(Camera::from_viewer_message(r#"{"camPos":[1,2,3]}"#).is_err());
    }

    #[test]
    fn rejects_non_finite_components() {
        let cam = Camera {
            cam_pos: [f32::NAN, 0.0, 0.0],
            cam_dir: [0.0, 0.0, 1.0],
        };
        assert!(cam.validate().is_err());
    }
}
