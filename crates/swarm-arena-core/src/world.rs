//! Per-frame world model: robot poses in metres and the neighbour relation.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use nalgebra::Point2;

use crate::calibration::{CalibrationParams, CalibrationState, Calibrator};
use crate::geometry::{bearing_degrees, distance};
use crate::tag::{resolve_frame, RawDetection, Tag, TagError, TagId};

/// Default sensing radius of a robot, metres.
pub const DEFAULT_SENSOR_RANGE_M: f64 = 0.3;

/// One directed observation of a neighbouring robot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    /// Distance to the sensed robot, metres.
    pub range_m: f64,
    /// Absolute angle from the sensing robot to the sensed robot, degrees.
    pub bearing_deg: f64,
    /// Heading of the sensed robot itself, degrees.
    pub orientation_deg: f64,
}

/// A tracked robot, valid for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Robot {
    pub id: TagId,
    pub position_m: Point2<f64>,
    pub orientation_deg: f64,
    pub sensor_range_m: f64,
    /// Never contains `id` itself.
    pub neighbours: BTreeMap<TagId, SensorReading>,
}

impl Robot {
    /// Place a robot from its tag; `None` before calibration.
    pub fn from_tag(
        tag: &Tag,
        calibration: &CalibrationState,
        sensor_range_m: f64,
    ) -> Option<Self> {
        let position_m = calibration.to_metres(&tag.centre)?;
        Some(Self {
            id: tag.id,
            position_m,
            orientation_deg: tag.heading_deg,
            sensor_range_m,
            neighbours: BTreeMap::new(),
        })
    }
}

/// Immutable snapshot of everything known after one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldModel {
    /// Frame counter of the builder; `0` is the empty start-up snapshot.
    pub cycle: u64,
    pub calibration: CalibrationState,
    pub robots: BTreeMap<TagId, Robot>,
}

impl WorldModel {
    #[inline]
    pub fn robot(&self, id: TagId) -> Option<&Robot> {
        self.robots.get(&id)
    }

    pub fn robot_ids(&self) -> impl Iterator<Item = TagId> + '_ {
        self.robots.keys().copied()
    }
}

/// Sensor ranges, with optional per-robot overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct SensingParams {
    pub default_range_m: f64,
    pub overrides: HashMap<TagId, f64>,
}

impl Default for SensingParams {
    fn default() -> Self {
        Self {
            default_range_m: DEFAULT_SENSOR_RANGE_M,
            overrides: HashMap::new(),
        }
    }
}

impl SensingParams {
    #[inline]
    pub fn range_for(&self, id: TagId) -> f64 {
        self.overrides
            .get(&id)
            .copied()
            .unwrap_or(self.default_range_m)
    }
}

/// Fill every robot's `neighbours` from scratch.
///
/// Each ordered pair is tested against the *sensing* robot's own range, so
/// the relation is only symmetric while all ranges agree. O(n²).
pub fn sense_neighbours(robots: &mut BTreeMap<TagId, Robot>) {
    let poses: Vec<(TagId, Point2<f64>, f64)> = robots
        .values()
        .map(|r| (r.id, r.position_m, r.orientation_deg))
        .collect();

    for robot in robots.values_mut() {
        robot.neighbours = poses
            .iter()
            .filter(|(other, _, _)| *other != robot.id)
            .filter_map(|&(other, position, orientation_deg)| {
                let range_m = distance(&robot.position_m, &position);
                (range_m < robot.sensor_range_m).then(|| {
                    (
                        other,
                        SensorReading {
                            range_m,
                            bearing_deg: bearing_degrees(&robot.position_m, &position),
                            orientation_deg,
                        },
                    )
                })
            })
            .collect();
    }
}

/// Output of one builder cycle.
#[derive(Clone, Debug)]
pub struct FrameResult {
    pub world: WorldModel,
    /// Detections dropped by the tag resolver this frame.
    pub rejected: Vec<TagError>,
    /// `true` on the frame that completed calibration.
    pub calibrated_now: bool,
}

/// Turns detector frames into world snapshots.
///
/// Holds the only state that survives between frames: the calibration and
/// the frame counter. Robots are rebuilt from scratch every frame.
#[derive(Clone, Debug)]
pub struct WorldBuilder {
    calibrator: Calibrator,
    sensing: SensingParams,
    cycle: u64,
}

impl WorldBuilder {
    pub fn new(calibration: CalibrationParams, sensing: SensingParams) -> Self {
        Self {
            calibrator: Calibrator::new(calibration),
            sensing,
            cycle: 0,
        }
    }

    #[inline]
    pub fn calibration(&self) -> &CalibrationState {
        self.calibrator.state()
    }

    #[inline]
    pub fn sensing(&self) -> &SensingParams {
        &self.sensing
    }

    /// Override one robot's sensor range from the next frame on.
    pub fn set_sensor_range(&mut self, id: TagId, range_m: f64) {
        self.sensing.overrides.insert(id, range_m);
    }

    /// Drop a per-robot override, falling back to the default range.
    pub fn clear_sensor_range(&mut self, id: TagId) {
        self.sensing.overrides.remove(&id);
    }

    /// Empty snapshot describing the current calibration, with no robots.
    pub fn empty_world(&self) -> WorldModel {
        WorldModel {
            cycle: self.cycle,
            calibration: *self.calibrator.state(),
            robots: BTreeMap::new(),
        }
    }

    /// Run one detection cycle.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(detections = detections.len()))
    )]
    pub fn process_frame(&mut self, detections: &[RawDetection]) -> FrameResult {
        self.cycle += 1;

        let (tags, rejected) = resolve_frame(detections);
        for err in &rejected {
            warn!("cycle {}: dropping detection: {err}", self.cycle);
        }

        let calibrated_now = self.calibrator.observe_tags(&tags);
        let calibration = *self.calibrator.state();

        let mut robots = BTreeMap::new();
        if calibration.is_calibrated() {
            for tag in tags.iter().filter(|t| !t.is_corner_reference()) {
                let range = self.sensing.range_for(tag.id);
                let Some(robot) = Robot::from_tag(tag, &calibration, range) else {
                    continue;
                };
                if robots.insert(tag.id, robot).is_some() {
                    warn!(
                        "cycle {}: marker {} detected more than once, keeping the last one",
                        self.cycle, tag.id
                    );
                }
            }
            sense_neighbours(&mut robots);
        }

        debug!(
            "cycle {}: {} tags, {} robots, {} rejected",
            self.cycle,
            tags.len(),
            robots.len(),
            rejected.len()
        );

        FrameResult {
            world: WorldModel {
                cycle: self.cycle,
                calibration,
                robots,
            },
            rejected,
            calibrated_now,
        }
    }
}

impl Default for WorldBuilder {
    fn default() -> Self {
        Self::new(CalibrationParams::default(), SensingParams::default())
    }
}
