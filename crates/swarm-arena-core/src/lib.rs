//! Core of the swarm arena tracker.
//!
//! Turns per-frame fiducial marker detections (from an external detector)
//! into a calibrated world model of robots and their sensed neighbours,
//! and publishes each frame's model as an immutable snapshot.
//!
//! Pipeline, one frame at a time:
//! 1. [`Tag::resolve`] turns raw detections into tags (centre, front, heading).
//! 2. [`Calibrator`] fixes the pixel-to-metre scale from the two corner
//!    markers (id `0`), once.
//! 3. [`WorldBuilder::process_frame`] places robots in metres and computes
//!    the directed neighbour relation.
//! 4. [`WorldPublisher::publish`] swaps the snapshot readers see through
//!    [`WorldStore::current`].
//!
//! [`spawn_tracker`] runs steps 1-4 on a dedicated thread, pulling frames
//! from a [`DetectionSource`].
//!
//! ```
//! use swarm_arena_core::{RawDetection, TagId, WorldBuilder};
//!
//! fn marker(id: i64, cx: f64, cy: f64) -> RawDetection {
//!     let (l, r, t, b) = (cx - 5.0, cx + 5.0, cy - 5.0, cy + 5.0);
//!     RawDetection::new(id, [[l, t], [r, t], [r, b], [l, b]])
//! }
//!
//! let mut builder = WorldBuilder::default();
//! builder.process_frame(&[marker(0, 0.0, 0.0)]);
//! let world = builder
//!     .process_frame(&[marker(0, 1030.0, 0.0), marker(4, 500.0, 0.0)])
//!     .world;
//! assert!(world.calibration.is_calibrated());
//! let robot = &world.robots[&TagId::from(4)];
//! assert!((robot.position_m.x - 1.0).abs() < 1e-9);
//! ```

mod calibration;
mod config;
pub mod geometry;
mod logger;
mod source;
mod store;
mod tag;
mod worker;
mod world;

pub use calibration::{
    CalibrationParams, CalibrationState, CalibrationStatus, Calibrator, PixelBounds,
};
pub use config::{ConfigError, ServerConfig, TrackerConfig, DEFAULT_PORT};
pub use source::{ChannelSource, DetectionSource, Frame, ReplaySource, SourceError};
pub use store::{world_store, WorldPublisher, WorldStore};
pub use tag::{resolve_frame, RawDetection, Tag, TagError, TagId, CORNER_TAG_ID};
pub use worker::{spawn_tracker, TrackerHandle, WorkerError};
pub use world::{
    sense_neighbours, FrameResult, Robot, SensingParams, SensorReading, WorldBuilder, WorldModel,
    DEFAULT_SENSOR_RANGE_M,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
