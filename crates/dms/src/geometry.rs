//! Eye and mouth aspect ratios from face landmarks

use serde::{Deserialize, Serialize};

use crate::config::LandmarkIndices;

/// Horizontal spans below this are treated as degenerate geometry
const MIN_SPAN: f32 = 1e-6;

/// Normalized landmark position (x, y in 0..1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Eye aspect ratio from 6 ordered eye points.
///
/// Mean of the (1,5) and (2,4) vertical spans over the (0,3) horizontal span.
/// Returns `None` when the horizontal span collapses.
pub fn eye_aspect_ratio(points: &[Point; 6]) -> Option<f32> {
    let horizontal = points[0].distance(&points[3]);
    if !(horizontal >= MIN_SPAN) {
        return None;
    }

    let vertical = points[1].distance(&points[5]) + points[2].distance(&points[4]);
    Some(vertical / (2.0 * horizontal))
}

/// Mouth aspect ratio from 8 ordered mouth points.
///
/// Mean of the (1,7), (2,6), (3,5) vertical spans over the (0,4) horizontal span.
/// Returns `None` when the horizontal span collapses.
pub fn mouth_aspect_ratio(points: &[Point; 8]) -> Option<f32> {
    let horizontal = points[0].distance(&points[4]);
    if !(horizontal >= MIN_SPAN) {
        return None;
    }

    let vertical = points[1].distance(&points[7])
        + points[2].distance(&points[6])
        + points[3].distance(&points[5]);
    Some(vertical / (3.0 * horizontal))
}

/// Pick a landmark group by index. Callers must check the frame length first.
pub(crate) fn gather<const N: usize>(landmarks: &[Point], indices: &[usize; N]) -> [Point; N] {
    indices.map(|i| landmarks[i])
}

/// Per-frame geometric measurements.
///
/// `None` marks degenerate geometry; downstream it reads as eyes open and
/// mouth closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub left_ear: Option<f32>,
    pub right_ear: Option<f32>,
    pub average_ear: Option<f32>,
    pub mar: Option<f32>,
}

impl Metrics {
    /// Measure a frame that already passed the length check
    pub fn from_landmarks(landmarks: &[Point], indices: &LandmarkIndices) -> Self {
        let left_ear = eye_aspect_ratio(&gather(landmarks, &indices.left_eye));
        let right_ear = eye_aspect_ratio(&gather(landmarks, &indices.right_eye));
        let average_ear = match (left_ear, right_ear) {
            (Some(left), Some(right)) => Some((left + right) / 2.0),
            _ => None,
        };

        Self {
            left_ear,
            right_ear,
            average_ear,
            mar: mouth_aspect_ratio(&gather(landmarks, &indices.mouth)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eye(half_height: f32) -> [Point; 6] {
        [
            Point::new(0.0, 0.0),
            Point::new(0.03, -half_height),
            Point::new(0.07, -half_height),
            Point::new(0.1, 0.0),
            Point::new(0.07, half_height),
            Point::new(0.03, half_height),
        ]
    }

    #[test]
    fn test_ear_open_and_closed() {
        let open = eye_aspect_ratio(&eye(0.015)).unwrap();
        let closed = eye_aspect_ratio(&eye(0.005)).unwrap();

        assert!((open - 0.3).abs() < 1e-4);
        assert!((closed - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_mar() {
        let v = 0.05;
        let mouth = [
            Point::new(0.0, 0.0),
            Point::new(0.05, -v),
            Point::new(0.10, -v),
            Point::new(0.15, -v),
            Point::new(0.2, 0.0),
            Point::new(0.15, v),
            Point::new(0.10, v),
            Point::new(0.05, v),
        ];

        let mar = mouth_aspect_ratio(&mouth).unwrap();
        assert!((mar - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_span_is_none() {
        let collapsed = [Point::new(0.5, 0.5); 6];
        assert_eq!(eye_aspect_ratio(&collapsed), None);

        let mouth = [Point::new(0.2, 0.2); 8];
        assert_eq!(mouth_aspect_ratio(&mouth), None);
    }

    #[test]
    fn test_nan_input_is_degenerate() {
        let mut points = eye(0.015);
        points[3] = Point::new(f32::NAN, 0.0);
        assert_eq!(eye_aspect_ratio(&points), None);
    }

    #[test]
    fn test_average_requires_both_eyes() {
        let indices = LandmarkIndices {
            left_eye: [0, 1, 2, 3, 4, 5],
            right_eye: [6, 7, 8, 9, 10, 11],
            mouth: [12, 12, 12, 12, 13, 12, 12, 12],
            nose: 14,
        };
        let mut landmarks: Vec<Point> = eye(0.015).to_vec();
        landmarks.extend_from_slice(&[Point::new(0.5, 0.5); 6]);
        landmarks.extend_from_slice(&[Point::new(0.0, 0.0), Point::new(0.2, 0.0), Point::new(0.5, 0.5)]);

        let metrics = Metrics::from_landmarks(&landmarks, &indices);
        assert!(metrics.left_ear.is_some());
        assert_eq!(metrics.right_ear, None);
        assert_eq!(metrics.average_ear, None);
        assert_eq!(metrics.mar, Some(0.0));
    }
}
