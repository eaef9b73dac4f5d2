//! Pixel-to-metre calibration from the two arena corner markers.
//!
//! The calibrator is a one-way state machine: it folds corner marker
//! centres into a pixel bounding box until it has seen two sightings that
//! are far enough apart, then fixes the scale for the rest of the process.

use log::{debug, info};
use nalgebra::Point2;

use crate::geometry::distance;
use crate::tag::Tag;

/// Calibration progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CalibrationStatus {
    #[default]
    Uncalibrated,
    /// Terminal; scale and bounds never change afterwards.
    Calibrated,
}

/// Axis-aligned pixel box spanned by the corner marker centres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl PixelBounds {
    pub fn from_point(p: &Point2<f64>) -> Self {
        Self {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        }
    }

    /// Grow the box so it contains `p`.
    pub fn include(&mut self, p: &Point2<f64>) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    #[inline]
    pub fn min_corner(&self) -> Point2<f64> {
        Point2::new(self.min_x, self.min_y)
    }

    #[inline]
    pub fn max_corner(&self) -> Point2<f64> {
        Point2::new(self.max_x, self.max_y)
    }

    /// Pixel distance between the min and max corners.
    pub fn diagonal(&self) -> f64 {
        distance(&self.min_corner(), &self.max_corner())
    }
}

/// Fixed physical inputs of the calibration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationParams {
    /// Real distance between the two corner markers, metres.
    pub reference_distance_m: f64,
    /// Second sightings closer than this to the first one are treated as the
    /// same marker seen again.
    pub min_corner_separation_px: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            reference_distance_m: 2.06,
            min_corner_separation_px: 1.0,
        }
    }
}

/// Calibration snapshot, shared with every published world model.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CalibrationState {
    pub status: CalibrationStatus,
    /// Corner marker sightings folded into `bounds` so far.
    pub corners_seen: u32,
    pub bounds: Option<PixelBounds>,
    pub scale_px_per_m: Option<f64>,
}

impl CalibrationState {
    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.status == CalibrationStatus::Calibrated
    }

    /// Convert a pixel position to arena metres, once calibrated.
    pub fn to_metres(&self, pixel: &Point2<f64>) -> Option<Point2<f64>> {
        let scale = self.scale_px_per_m.filter(|_| self.is_calibrated())?;
        Some(Point2::from(pixel.coords / scale))
    }
}

/// Corner-marker calibration state machine.
#[derive(Clone, Debug)]
pub struct Calibrator {
    params: CalibrationParams,
    state: CalibrationState,
}

impl Calibrator {
    pub fn new(params: CalibrationParams) -> Self {
        Self {
            params,
            state: CalibrationState::default(),
        }
    }

    #[inline]
    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.state.is_calibrated()
    }

    /// Feed the tags of one frame; non-corner tags are ignored.
    ///
    /// Returns `true` only for the frame that completes calibration.
    pub fn observe_tags(&mut self, tags: &[Tag]) -> bool {
        self.observe_corner_centres(
            tags.iter()
                .filter(|t| t.is_corner_reference())
                .map(|t| t.centre),
        )
    }

    /// Feed the corner marker centres seen in one frame.
    pub fn observe_corner_centres(
        &mut self,
        centres: impl IntoIterator<Item = Point2<f64>>,
    ) -> bool {
        if self.state.is_calibrated() {
            return false;
        }

        let mut sighted = false;
        for centre in centres {
            match self.state.bounds.as_mut() {
                Some(bounds) => bounds.include(&centre),
                None => self.state.bounds = Some(PixelBounds::from_point(&centre)),
            }
            self.state.corners_seen += 1;
            sighted = true;
        }

        if !sighted || self.state.corners_seen < 2 {
            return false;
        }
        let Some(bounds) = self.state.bounds else {
            return false;
        };

        let span_px = bounds.diagonal();
        if span_px < self.params.min_corner_separation_px {
            debug!("corner marker re-sighted at the same spot ({span_px:.2} px), still waiting");
            self.state.corners_seen = 1;
            return false;
        }

        let scale = span_px / self.params.reference_distance_m;
        self.state.scale_px_per_m = Some(scale);
        self.state.status = CalibrationStatus::Calibrated;
        info!(
            "arena calibrated: {span_px:.1} px between corners, {scale:.3} px/m, bounds ({:.0},{:.0})-({:.0},{:.0})",
            bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn calibrator() -> Calibrator {
        Calibrator::new(CalibrationParams::default())
    }

    #[test]
    fn first_corner_only_seeds_bounds() {
        let mut cal = calibrator();
        assert!(!cal.observe_corner_centres([Point2::new(10.0, 20.0)]));
        let state = cal.state();
        assert_eq!(state.status, CalibrationStatus::Uncalibrated);
        assert_eq!(state.corners_seen, 1);
        assert_eq!(
            state.bounds,
            Some(PixelBounds::from_point(&Point2::new(10.0, 20.0)))
        );
        assert!(state.to_metres(&Point2::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn second_corner_in_later_frame_completes_calibration() {
        let mut cal = calibrator();
        cal.observe_corner_centres([Point2::new(0.0, 0.0)]);
        assert!(!cal.observe_corner_centres(std::iter::empty()));
        assert!(cal.observe_corner_centres([Point2::new(1030.0, 0.0)]));

        let state = cal.state();
        assert!(state.is_calibrated());
        assert_relative_eq!(state.scale_px_per_m.unwrap(), 500.0, epsilon = 1e-9);
        let m = state.to_metres(&Point2::new(500.0, 0.0)).unwrap();
        assert_relative_eq!(m.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.y, 0.0);
    }

    #[test]
    fn scale_is_distance_between_sightings() {
        let p1 = Point2::new(120.0, 640.0);
        let p2 = Point2::new(900.0, 80.0);
        let mut cal = calibrator();
        cal.observe_corner_centres([p2]);
        cal.observe_corner_centres([p1]);
        let expected = distance(&p1, &p2) / 2.06;
        assert_relative_eq!(cal.state().scale_px_per_m.unwrap(), expected);
    }

    #[test]
    fn calibrated_state_is_frozen() {
        let mut cal = calibrator();
        cal.observe_corner_centres([Point2::new(0.0, 0.0), Point2::new(1030.0, 0.0)]);
        let frozen = *cal.state();
        assert!(!cal.observe_corner_centres([Point2::new(5000.0, 5000.0)]));
        assert_eq!(*cal.state(), frozen);
    }

    #[test]
    fn extra_corners_in_one_frame_widen_the_box() {
        let mut cal = calibrator();
        assert!(cal.observe_corner_centres([
            Point2::new(100.0, 100.0),
            Point2::new(50.0, 300.0),
            Point2::new(400.0, 40.0),
        ]));
        let bounds = cal.state().bounds.unwrap();
        assert_eq!(
            bounds,
            PixelBounds {
                min_x: 50.0,
                min_y: 40.0,
                max_x: 400.0,
                max_y: 300.0,
            }
        );
        assert_eq!(cal.state().corners_seen, 3);
    }

    #[test]
    fn resighting_the_same_marker_does_not_calibrate() {
        let mut cal = calibrator();
        cal.observe_corner_centres([Point2::new(200.0, 200.0)]);
        assert!(!cal.observe_corner_centres([Point2::new(200.2, 200.0)]));
        assert!(!cal.is_calibrated());
        assert_eq!(cal.state().corners_seen, 1);

        assert!(cal.observe_corner_centres([Point2::new(200.0, 700.0)]));
    }
}
