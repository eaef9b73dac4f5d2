//! Frame sources standing in for the camera + marker detector.

use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::tag::RawDetection;

/// All detections reported for one camera frame.
pub type Frame = Vec<RawDetection>;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Something that yields detector frames.
///
/// `next_frame` may block until a frame is available. `Ok(None)` means the
/// source is exhausted and the tracker should stop.
pub trait DetectionSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

impl<S: DetectionSource + ?Sized> DetectionSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        (**self).next_frame()
    }
}

/// Plays back a recorded list of frames.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    frames: Vec<Frame>,
    cursor: usize,
    looping: bool,
    interval: Option<Duration>,
    last_emit: Option<Instant>,
}

impl ReplaySource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            cursor: 0,
            looping: false,
            interval: None,
            last_emit: None,
        }
    }

    /// Load frames from a JSON file: an array of frames, each an array of
    /// `{"id": .., "corners": [[x, y]; 4]}` objects.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let raw = fs::read_to_string(path)?;
        let frames: Vec<Frame> = serde_json::from_str(&raw)?;
        debug!("loaded {} replay frames", frames.len());
        Ok(Self::new(frames))
    }

    /// Restart from the first frame after the last one.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Emit at most one frame per `interval`, imitating a camera frame rate.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last_emit) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl DetectionSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.cursor >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return Ok(None);
            }
            self.cursor = 0;
        }
        self.pace();
        let frame = self.frames[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(frame))
    }
}

/// Frames pushed in from another thread.
///
/// Blocks until a frame arrives; exhausted once every sender is dropped.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Frame>,
}

impl ChannelSource {
    pub fn new() -> (mpsc::Sender<Frame>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }
}

impl DetectionSource for ChannelSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(self.rx.recv().ok())
    }
}
