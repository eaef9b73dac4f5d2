//! Planar geometry helpers shared by the tag resolver and the world builder.
//!
//! All angles are in degrees, measured from the positive x-axis of the frame
//! the points live in (image pixels or arena metres). Image space has y
//! pointing down, so a positive angle turns clockwise on screen.

use nalgebra::{Point2, Vector2};

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// Angle of a direction vector, in degrees within `(-180, 180]`.
#[inline]
pub fn direction_degrees(v: &Vector2<f64>) -> f64 {
    v.y.atan2(v.x).to_degrees()
}

/// Absolute bearing from `from` towards `to`, in degrees.
///
/// The bearing does not depend on the heading of either endpoint.
#[inline]
pub fn bearing_degrees(from: &Point2<f64>, to: &Point2<f64>) -> f64 {
    direction_degrees(&(to - from))
}

/// Midpoint of a segment.
#[inline]
pub fn midpoint(a: &Point2<f64>, b: &Point2<f64>) -> Point2<f64> {
    nalgebra::center(a, b)
}

/// Arithmetic mean of a quad's corners.
pub fn quad_centroid(quad: &[Point2<f64>; 4]) -> Point2<f64> {
    let sum = quad
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + p.coords);
    Point2::from(sum / 4.0)
}
