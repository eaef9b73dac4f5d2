#![allow(dead_code)]

use swarm_arena_core::RawDetection;

/// Axis-aligned marker of half-size `half` centred on `(cx, cy)`, facing up
/// in the image.
pub fn marker(id: i64, cx: f64, cy: f64, half: f64) -> RawDetection {
    let (l, r, t, b) = (cx - half, cx + half, cy - half, cy + half);
    RawDetection::new(id, [[l, t], [r, t], [r, b], [l, b]])
}

/// Robot marker at a position given in metres, for a 500 px/m arena.
pub fn robot_at_m(id: i64, x_m: f64, y_m: f64) -> RawDetection {
    marker(id, x_m * 500.0, y_m * 500.0, 10.0)
}

/// Corner markers 1030 px apart, i.e. 500 px/m with the default 2.06 m.
pub fn corner_frame() -> Vec<RawDetection> {
    vec![marker(0, 0.0, 0.0, 10.0), marker(0, 1030.0, 0.0, 10.0)]
}
