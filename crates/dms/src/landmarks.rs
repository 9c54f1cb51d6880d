//! Face landmark input from the external landmark provider
//!
//! The provider reports zero or one face per frame as normalized
//! `(x, y)` positions in `[0, 1]²`, indexed like the 468-point face mesh.
//! Only the two 6-point eye subsets are consumed here.

use serde::{Deserialize, Serialize};

use crate::geometry::{average_ear, EyeContour, Point};
use crate::DmsError;

/// Face-mesh indices of the left eye contour, in canonical EAR order
pub const LEFT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// Face-mesh indices of the right eye contour, in canonical EAR order
pub const RIGHT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// One face's landmarks in normalized image coordinates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks {
    pub points: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<(f32, f32)>) -> Self {
        Self { points }
    }

    /// Resolve an index subset to a pixel-space eye contour.
    ///
    /// Pixel coordinates are truncated to whole pixels.
    pub fn eye_contour(
        &self,
        indices: &[usize; 6],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<EyeContour, DmsError> {
        let mut points = [Point::default(); 6];
        for (slot, &idx) in points.iter_mut().zip(indices.iter()) {
            let (x, y) = *self.points.get(idx).ok_or(DmsError::KeypointsMissing {
                index: idx,
                available: self.points.len(),
            })?;
            *slot = Point::new(
                (x * frame_width as f32).trunc(),
                (y * frame_height as f32).trunc(),
            );
        }
        Ok(EyeContour::new(points))
    }

    /// Both eye contours for a frame of the given size
    pub fn eyes(&self, frame_width: u32, frame_height: u32) -> Result<EyePair, DmsError> {
        Ok(EyePair {
            left: self.eye_contour(&LEFT_EYE, frame_width, frame_height)?,
            right: self.eye_contour(&RIGHT_EYE, frame_width, frame_height)?,
        })
    }
}

/// Left and right eye contours of one face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyePair {
    pub left: EyeContour,
    pub right: EyeContour,
}

impl EyePair {
    /// Averaged EAR sample for this frame
    pub fn ear(&self) -> f32 {
        average_ear(&self.left, &self.right)
    }
}

/// Landmark provider output for a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Detected face, `None` when no face is visible
    #[serde(default)]
    pub face: Option<FaceLandmarks>,
}

impl LandmarkFrame {
    /// Eye contours in pixel space, `None` when no face was detected
    pub fn eyes(&self) -> Result<Option<EyePair>, DmsError> {
        self.face
            .as_ref()
            .map(|face| face.eyes(self.width, self.height))
            .transpose()
    }
}

/// Upstream collaborator producing landmarks frame by frame
pub trait LandmarkSource {
    /// Next frame's landmarks, or `Ok(None)` once the source is exhausted
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, DmsError>;
}
