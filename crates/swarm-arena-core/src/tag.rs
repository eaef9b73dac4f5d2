//! Marker ids, raw detector output and resolved tags.

use std::fmt;

use nalgebra::Point2;
use serde::Deserialize;

use crate::geometry::{direction_degrees, midpoint, quad_centroid};

/// Errors raised while turning raw detector output into tags.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TagError {
    #[error("marker id must be non-negative (got {0})")]
    NegativeId(i64),
    #[error("marker id {0} does not fit into 32 bits")]
    IdOutOfRange(i64),
    #[error("malformed detection for marker {id}: expected 4 corners, got {corners}")]
    MalformedDetection { id: i64, corners: usize },
    #[error("malformed detection for marker {id}: corner coordinates must be finite")]
    NonFiniteCorner { id: i64 },
}

/// Validated marker id.
///
/// Id `0` is reserved for the arena corner references; every other id names
/// a robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "i64")]
pub struct TagId(u32);

/// Id carried by the two arena corner reference markers.
pub const CORNER_TAG_ID: TagId = TagId(0);

impl TagId {
    /// Validate an id coming straight from the detector.
    pub fn new(raw: i64) -> Result<Self, TagError> {
        if raw < 0 {
            return Err(TagError::NegativeId(raw));
        }
        u32::try_from(raw)
            .map(TagId)
            .map_err(|_| TagError::IdOutOfRange(raw))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// `true` for the reserved arena corner marker.
    #[inline]
    pub fn is_corner_reference(self) -> bool {
        self == CORNER_TAG_ID
    }
}

impl From<u32> for TagId {
    fn from(value: u32) -> Self {
        TagId(value)
    }
}

impl TryFrom<i64> for TagId {
    type Error = TagError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        TagId::new(value)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One detection as reported by the external marker detector.
///
/// Corners are in pixel coordinates, wound top-left, top-right,
/// bottom-right, bottom-left relative to the marker itself.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RawDetection {
    pub id: i64,
    pub corners: Vec<[f64; 2]>,
}

impl RawDetection {
    pub fn new(id: i64, corners: [[f64; 2]; 4]) -> Self {
        Self {
            id,
            corners: corners.to_vec(),
        }
    }
}

/// A marker resolved for the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub id: TagId,
    /// TL, TR, BR, BL in pixels.
    pub corners: [Point2<f64>; 4],
    pub centre: Point2<f64>,
    /// Midpoint of the top edge.
    pub front: Point2<f64>,
    /// Angle of `centre -> front` against the image x-axis, degrees.
    pub heading_deg: f64,
}

impl Tag {
    /// Build a tag from already validated corners.
    pub fn from_corners(id: TagId, corners: [Point2<f64>; 4]) -> Self {
        let centre = quad_centroid(&corners);
        let front = midpoint(&corners[0], &corners[1]);
        let heading_deg = direction_degrees(&(front - centre));
        Self {
            id,
            corners,
            centre,
            front,
            heading_deg,
        }
    }

    /// Resolve one raw detection.
    pub fn resolve(det: &RawDetection) -> Result<Self, TagError> {
        let id = TagId::new(det.id)?;
        let corners: &[[f64; 2]; 4] = det.corners.as_slice().try_into().map_err(|_| {
            TagError::MalformedDetection {
                id: det.id,
                corners: det.corners.len(),
            }
        })?;
        if corners.iter().flatten().any(|v| !v.is_finite()) {
            return Err(TagError::NonFiniteCorner { id: det.id });
        }
        Ok(Self::from_corners(
            id,
            (*corners).map(|[x, y]| Point2::new(x, y)),
        ))
    }

    #[inline]
    pub fn is_corner_reference(&self) -> bool {
        self.id.is_corner_reference()
    }
}

/// Resolve every detection of a frame, keeping failures separate so one bad
/// detection never drops the rest of the frame.
pub fn resolve_frame(detections: &[RawDetection]) -> (Vec<Tag>, Vec<TagError>) {
    let mut tags = Vec::with_capacity(detections.len());
    let mut rejected = Vec::new();
    for det in detections {
        match Tag::resolve(det) {
            Ok(tag) => tags.push(tag),
            Err(err) => rejected.push(err),
        }
    }
    (tags, rejected)
}
