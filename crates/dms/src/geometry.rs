//! Eye geometry metrics
//!
//! Pure numeric helpers for the Eye Aspect Ratio (EAR):
//!
//! ```text
//! EAR = (|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)
//! ```

use serde::{Deserialize, Serialize};

/// EAR reported when the contour is degenerate (treated as eyes open)
pub const OPEN_EYE_FALLBACK: f32 = 0.3;

/// Horizontal spans shorter than this (pixels) are considered degenerate
pub const MIN_HORIZONTAL_SPAN: f32 = 0.01;

/// A 2D point in pixel space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Six ordered eye-contour points for one eye in one frame.
///
/// Order: outer corner, upper lid (near), upper lid (far), inner corner,
/// lower lid (far), lower lid (near).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeContour(pub [Point; 6]);

impl EyeContour {
    pub fn new(points: [Point; 6]) -> Self {
        Self(points)
    }

    /// Points in canonical order
    pub fn points(&self) -> &[Point; 6] {
        &self.0
    }

    /// Eye aspect ratio of this contour
    pub fn aspect_ratio(&self) -> f32 {
        eye_aspect_ratio(self)
    }
}

/// Euclidean distance between two points
pub fn distance(p1: Point, p2: Point) -> f32 {
    (p1.x - p2.x).hypot(p1.y - p2.y)
}

/// Compute the Eye Aspect Ratio of a contour.
///
/// Returns [`OPEN_EYE_FALLBACK`] instead of dividing when the horizontal
/// span is below [`MIN_HORIZONTAL_SPAN`] or any input is non-finite, so a
/// detection glitch is never read as a closure.
pub fn eye_aspect_ratio(contour: &EyeContour) -> f32 {
    let [p0, p1, p2, p3, p4, p5] = contour.0;

    // Vertical spans
    let a = distance(p1, p5);
    let b = distance(p2, p4);

    // Horizontal span
    let c = distance(p0, p3);

    // Negated comparison so NaN also falls back
    if !(c >= MIN_HORIZONTAL_SPAN) {
        return OPEN_EYE_FALLBACK;
    }

    let ear = (a + b) / (2.0 * c);
    if ear.is_finite() {
        ear
    } else {
        OPEN_EYE_FALLBACK
    }
}

/// Per-frame EAR sample: mean of both eyes
pub fn average_ear(left: &EyeContour, right: &EyeContour) -> f32 {
    (eye_aspect_ratio(left) + eye_aspect_ratio(right)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn open_eye() -> EyeContour {
        EyeContour::new([
            Point::new(0.0, 0.0),
            Point::new(10.0, -4.0),
            Point::new(20.0, -4.0),
            Point::new(30.0, 0.0),
            Point::new(20.0, 4.0),
            Point::new(10.0, 4.0),
        ])
    }

    fn transform(contour: &EyeContour, k: f32, dx: f32, dy: f32) -> EyeContour {
        let mut points = contour.0;
        for p in points.iter_mut() {
            p.x = p.x * k + dx;
            p.y = p.y * k + dy;
        }
        EyeContour::new(points)
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)), 5.0);
        assert_eq!(distance(Point::new(1.0, 1.0), Point::new(1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_open_eye_ratio() {
        // A = 8, B = 8, C = 30
        let ear = eye_aspect_ratio(&open_eye());
        assert!((ear - 16.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_closed_eye_ratio_is_low() {
        let closed = EyeContour::new([
            Point::new(0.0, 0.0),
            Point::new(10.0, -0.5),
            Point::new(20.0, -0.5),
            Point::new(30.0, 0.0),
            Point::new(20.0, 0.5),
            Point::new(10.0, 0.5),
        ]);
        assert!(closed.aspect_ratio() < 0.05);
    }

    #[test]
    fn test_degenerate_contour_falls_back() {
        let collapsed = EyeContour::new([Point::new(5.0, 5.0); 6]);
        assert_eq!(eye_aspect_ratio(&collapsed), OPEN_EYE_FALLBACK);

        let mut narrow = open_eye();
        narrow.0[3] = Point::new(0.005, 0.0);
        assert_eq!(eye_aspect_ratio(&narrow), OPEN_EYE_FALLBACK);
    }

    #[test]
    fn test_nan_input_falls_back() {
        let mut contour = open_eye();
        contour.0[0] = Point::new(f32::NAN, 0.0);
        assert_eq!(eye_aspect_ratio(&contour), OPEN_EYE_FALLBACK);

        let mut contour = open_eye();
        contour.0[1] = Point::new(f32::INFINITY, 0.0);
        assert_eq!(eye_aspect_ratio(&contour), OPEN_EYE_FALLBACK);
    }

    #[test]
    fn test_average_ear() {
        let left = open_eye();
        let right = EyeContour::new([Point::new(0.0, 0.0); 6]);
        let avg = average_ear(&left, &right);
        assert!((avg - (16.0 / 60.0 + OPEN_EYE_FALLBACK) / 2.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_ear_translation_invariant(dx in -500.0f32..500.0, dy in -500.0f32..500.0) {
            let base = eye_aspect_ratio(&open_eye());
            let moved = eye_aspect_ratio(&transform(&open_eye(), 1.0, dx, dy));
            prop_assert!((base - moved).abs() < 1e-3);
        }

        #[test]
        fn prop_ear_scale_invariant(k in 1.0f32..50.0) {
            let base = eye_aspect_ratio(&open_eye());
            let scaled = eye_aspect_ratio(&transform(&open_eye(), k, 0.0, 0.0));
            prop_assert!((base - scaled).abs() < 1e-4);
        }
    }
}
