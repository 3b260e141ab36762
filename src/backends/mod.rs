// SPDX-License-Identifier: GPL-3.0-only

//! Sensor and body tracker abstraction
//!
//! The viewer never talks to hardware directly. A [`DepthSensor`] hands out
//! depth captures through a blocking pull call, and an optional
//! [`BodyTracker`] turns submitted captures into skeleton results.
//!
//! ```text
//! ┌─────────────┐ next_capture ┌────────────────┐ publish ┌───────────┐
//! │ DepthSensor │ ───────────▶ │ CaptureSession │ ──────▶ │ FrameSlot │
//! └─────────────┘              └────────────────┘         └───────────┘
//!                                 │          ▲
//!                         enqueue │          │ pop_result
//!                                 ▼          │
//!                              ┌────────────────┐
//!                              │  BodyTracker   │
//!                              └────────────────┘
//! ```
//!
//! Captures own their depth buffer. Dropping a capture hands the buffer back
//! to the sensor that produced it, exactly once.

pub mod capture;
pub mod frame_loop;
pub mod synthetic;

pub use capture::CaptureSession;
pub use frame_loop::{CaptureLoopController, LoopAction};
pub use synthetic::{SyntheticSensor, SyntheticTracker};

use std::fmt;
use std::time::Duration;

use crate::body::BodyFrame;
use crate::depth::Calibration;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for sensor and tracker operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No capture arrived within the allowed time
    Timeout,
    /// The device stopped streaming or disappeared
    DeviceLost(String),
    /// The tracker rejected a capture or failed internally
    Tracker(String),
    /// Depth data did not match the declared resolution
    InvalidFrame(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Timeout => write!(f, "Timed out waiting for capture"),
            BackendError::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            BackendError::Tracker(msg) => write!(f, "Tracker error: {}", msg),
            BackendError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// A 16-bit depth image in sensor units (millimetres)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthImage {
    width: u32,
    height: u32,
    data: Vec<u16>,
}

impl DepthImage {
    /// Wrap a row-major depth buffer
    pub fn new(width: u32, height: u32, data: Vec<u16>) -> BackendResult<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(BackendError::InvalidFrame(format!(
                "{}x{} depth image needs {} samples, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Depth image with every pixel set to `value`
    pub fn filled(width: u32, height: u32, value: u16) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major samples
    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u16] {
        &mut self.data
    }

    /// Sample at `(row, col)`, or `None` outside the image
    pub fn get(&self, row: u32, col: u32) -> Option<u16> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data
            .get(row as usize * self.width as usize + col as usize)
            .copied()
    }

    /// Number of pixels carrying a depth measurement
    pub fn valid_pixel_count(&self) -> usize {
        self.data.iter().filter(|&&d| d > 0).count()
    }
}

/// Callback that returns a capture's depth buffer to its sensor
pub type ReleaseFn = Box<dyn FnOnce(Vec<u16>) + Send>;

/// One depth capture owned by whoever holds it
///
/// The release callback runs when the capture is dropped, so a capture can be
/// released at most once and never after its owner has moved it on.
pub struct Capture {
    depth: DepthImage,
    sequence: u64,
    timestamp: Duration,
    release: Option<ReleaseFn>,
}

impl Capture {
    /// Capture without a release callback
    pub fn new(depth: DepthImage, sequence: u64, timestamp: Duration) -> Self {
        Self {
            depth,
            sequence,
            timestamp,
            release: None,
        }
    }

    /// Capture that hands its buffer to `release` when dropped
    pub fn with_release(
        depth: DepthImage,
        sequence: u64,
        timestamp: Duration,
        release: ReleaseFn,
    ) -> Self {
        Self {
            depth,
            sequence,
            timestamp,
            release: Some(release),
        }
    }

    pub fn depth(&self) -> &DepthImage {
        &self.depth
    }

    /// Monotonic frame counter assigned by the sensor
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Device timestamp relative to stream start
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capture")
            .field("sequence", &self.sequence)
            .field("timestamp", &self.timestamp)
            .field("dimensions", &self.depth.dimensions())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(std::mem::take(&mut self.depth.data));
        }
    }
}

/// How long `pop_result` may wait for the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerWait {
    /// Return immediately with whatever is ready
    Immediate,
    /// Block up to the given duration
    Timeout(Duration),
}

/// Depth sensor / session collaborator
pub trait DepthSensor: Send {
    /// Calibration for the depth stream, queried once at startup
    fn calibration(&self) -> Calibration;

    /// Block until the next depth capture arrives or `timeout` elapses
    fn next_capture(&mut self, timeout: Duration) -> BackendResult<Capture>;
}

/// Body tracking collaborator
pub trait BodyTracker: Send {
    /// Submit a capture for tracking
    fn enqueue(&mut self, capture: &Capture) -> BackendResult<()>;

    /// Fetch the oldest finished tracking result, if any
    fn pop_result(&mut self, wait: TrackerWait) -> BackendResult<Option<BodyFrame>>;
}
