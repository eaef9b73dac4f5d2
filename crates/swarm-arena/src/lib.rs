//! Overhead-camera arena tracker for swarm robots.
//!
//! This crate provides:
//! - re-exports of the world model core ([`core`]) and the query server
//!   ([`server`])
//! - [`run`], which wires a detection source, the tracker thread and the
//!   WebSocket query server together until a shutdown signal
//!
//! ## Quickstart
//!
//! ```no_run
//! use swarm_arena::core::{ReplaySource, TrackerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrackerConfig::default();
//! let source = ReplaySource::load_json("frames.json")?.looping(true);
//! let listener = std::net::TcpListener::bind(config.server.socket_addr()?)?;
//! let frames = swarm_arena::run(&config, source, listener, std::future::pending())?;
//! println!("processed {frames} frames");
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `swarm_arena::core`: tags, calibration, world model, store, sources.
//! - `swarm_arena::server`: JSON protocol and WebSocket transport.

use std::future::Future;

use log::info;

pub use swarm_arena_core as core;
pub use swarm_arena_server as server;

pub use swarm_arena_core::{
    DetectionSource, Robot, TagId, TrackerConfig, WorldModel, WorldStore,
};

use swarm_arena_core::{spawn_tracker, world_store, WorkerError, WorldBuilder};
use swarm_arena_server::{serve, ServerError};

#[derive(thiserror::Error, Debug)]
pub enum ArenaError {
    #[error("failed to start the server runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Run the tracker and the query server until `shutdown` resolves.
///
/// The tracker runs on its own thread and the server on a multi-threaded
/// tokio runtime. When the source runs dry the server keeps answering from
/// the last snapshot. Returns the number of frames the tracker processed.
pub fn run<S, F>(
    config: &TrackerConfig,
    source: S,
    listener: std::net::TcpListener,
    shutdown: F,
) -> Result<u64, ArenaError>
where
    S: DetectionSource + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let builder = WorldBuilder::new(config.calibration_params(), config.sensing_params());
    let (publisher, store) = world_store(builder.empty_world());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("query-server")
        .build()
        .map_err(ArenaError::Runtime)?;
    listener
        .set_nonblocking(true)
        .map_err(|err| ArenaError::Server(err.into()))?;

    let tracker = spawn_tracker(source, builder, publisher)?;
    // `from_std` needs the runtime context, so it happens inside `block_on`.
    let served = runtime.block_on(async move {
        match tokio::net::TcpListener::from_std(listener) {
            Ok(listener) => serve(listener, store, shutdown).await,
            Err(err) => Err(ServerError::Io(err)),
        }
    });

    let frames = tracker.stop();
    served?;
    let frames = frames?;
    info!("tracker stopped after {frames} frames");
    Ok(frames)
}
