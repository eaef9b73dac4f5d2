//! The detection/build loop on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};

use crate::source::{DetectionSource, SourceError};
use crate::store::WorldPublisher;
use crate::world::WorldBuilder;

#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("failed to spawn tracker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("detection source failed after {frames} frames: {source}")]
    Source {
        frames: u64,
        #[source]
        source: SourceError,
    },
    #[error("tracker thread panicked")]
    Panicked,
}

/// Running tracker loop.
///
/// Dropping the handle detaches the thread; call [`TrackerHandle::stop`] or
/// [`TrackerHandle::join`] to shut it down cleanly.
#[derive(Debug)]
pub struct TrackerHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Result<u64, WorkerError>>,
}

/// Spawn the tracker loop: pull a frame, build a snapshot, publish it.
///
/// The loop ends when the source is exhausted, the source fails, or a stop is
/// requested. A stop request is noticed between frames, so a source blocked
/// waiting for input delays shutdown until it yields.
pub fn spawn_tracker<S>(
    source: S,
    builder: WorldBuilder,
    publisher: WorldPublisher,
) -> Result<TrackerHandle, WorkerError>
where
    S: DetectionSource + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let thread = thread::Builder::new()
        .name("tracker".to_owned())
        .spawn(move || run_loop(source, builder, publisher, &flag))
        .map_err(WorkerError::Spawn)?;
    Ok(TrackerHandle { stop, thread })
}

fn run_loop<S: DetectionSource>(
    mut source: S,
    mut builder: WorldBuilder,
    publisher: WorldPublisher,
    stop: &AtomicBool,
) -> Result<u64, WorkerError> {
    let mut frames = 0u64;
    publisher.publish(builder.empty_world());

    while !stop.load(Ordering::Acquire) {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("detection source exhausted after {frames} frames");
                break;
            }
            Err(err) => {
                warn!("detection source failed: {err}");
                return Err(WorkerError::Source {
                    frames,
                    source: err,
                });
            }
        };

        let result = builder.process_frame(&frame);
        publisher.publish(result.world);
        frames += 1;
    }

    Ok(frames)
}

impl TrackerHandle {
    /// Ask the loop to stop after the current frame.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Request a stop and wait for the loop to exit.
    ///
    /// Returns the number of frames processed.
    pub fn stop(self) -> Result<u64, WorkerError> {
        self.request_stop();
        self.join()
    }

    /// Wait for the loop to exit on its own.
    pub fn join(self) -> Result<u64, WorkerError> {
        self.thread.join().map_err(|_| WorkerError::Panicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ChannelSource, Frame, ReplaySource};
    use crate::store::world_store;
    use crate::tag::RawDetection;
    use crate::world::WorldModel;

    struct FailingSource;

    impl DetectionSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            Err(SourceError::Io(std::io::Error::other("camera unplugged")))
        }
    }

    #[test]
    fn exhausted_source_ends_loop_with_frame_count() {
        let (publisher, store) = world_store(WorldModel::default());
        let source = ReplaySource::new(vec![Vec::new(), Vec::new(), Vec::new()]);
        let handle = spawn_tracker(source, WorldBuilder::default(), publisher).expect("spawn");
        assert_eq!(handle.join().expect("join"), 3);
        assert_eq!(store.current().cycle, 3);
    }

    #[test]
    fn stop_interrupts_endless_source() {
        let (publisher, store) = world_store(WorldModel::default());
        let source = ReplaySource::new(vec![Vec::new()]).looping(true);
        let handle = spawn_tracker(source, WorldBuilder::default(), publisher).expect("spawn");
        while store.current().cycle < 10 {
            std::thread::yield_now();
        }
        assert!(!handle.is_finished());
        let frames = handle.stop().expect("stop");
        assert!(frames >= 10);
    }

    #[test]
    fn source_failure_is_reported() {
        let (publisher, _store) = world_store(WorldModel::default());
        let handle =
            spawn_tracker(FailingSource, WorldBuilder::default(), publisher).expect("spawn");
        assert!(matches!(
            handle.join(),
            Err(WorkerError::Source { frames: 0, .. })
        ));
    }

    #[test]
    fn channel_frames_are_published_in_order() {
        let (publisher, store) = world_store(WorldModel::default());
        let (tx, source) = ChannelSource::new();
        let handle = spawn_tracker(source, WorldBuilder::default(), publisher).expect("spawn");
        for id in 1..=4 {
            tx.send(vec![RawDetection::new(
                id,
                [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            )])
            .expect("send");
        }
        drop(tx);
        assert_eq!(handle.join().expect("join"), 4);
        assert_eq!(store.current().cycle, 4);
    }
}
