// SPDX-License-Identifier: GPL-3.0-only

//! Producer side of the frame handoff
//!
//! One step pulls a capture from the sensor, feeds it to the tracker and
//! publishes whatever capture the tracker has finished with, paired with
//! its own result. Captures wait in flight until their result arrives, so a
//! skeleton is never drawn over the depth of a different capture. Without a
//! tracker every capture is published as soon as it arrives.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::{BackendError, BodyTracker, Capture, DepthSensor, TrackerWait};
use crate::constants::timing::CAPTURE_TIMEOUT;
use crate::constants::tracking::MAX_IN_FLIGHT_CAPTURES;
use crate::handoff::{Frame, FrameSlot, PublishOutcome};

pub struct CaptureSession {
    sensor: Box<dyn DepthSensor>,
    tracker: Option<Box<dyn BodyTracker>>,
    /// Enqueued captures without a result yet, oldest first
    in_flight: VecDeque<Capture>,
    slot: Arc<FrameSlot>,
    timeout: Duration,
}

impl CaptureSession {
    pub fn new(
        sensor: Box<dyn DepthSensor>,
        tracker: Option<Box<dyn BodyTracker>>,
        slot: Arc<FrameSlot>,
    ) -> Self {
        Self {
            sensor,
            tracker,
            in_flight: VecDeque::new(),
            slot,
            timeout: CAPTURE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Captures waiting for their tracking result
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Capture, track and publish one frame
    pub fn step(&mut self) -> LoopAction {
        let capture = match self.sensor.next_capture(self.timeout) {
            Ok(capture) => capture,
            Err(BackendError::Timeout) => {
                trace!("Capture timed out");
                return LoopAction::Continue;
            }
            Err(BackendError::DeviceLost(reason)) => {
                error!(%reason, "Depth sensor lost, stopping capture");
                return LoopAction::Stop;
            }
            Err(e) => {
                warn!(error = %e, "Dropping capture");
                return LoopAction::Continue;
            }
        };

        let Some(tracker) = self.tracker.as_mut() else {
            publish(&self.slot, Frame::new(capture, None));
            return LoopAction::Continue;
        };

        match tracker.enqueue(&capture) {
            Ok(()) => {
                self.in_flight.push_back(capture);
                if self.in_flight.len() > MAX_IN_FLIGHT_CAPTURES
                    && let Some(stale) = self.in_flight.pop_front()
                {
                    debug!(sequence = stale.sequence(), "Tracker fell behind, dropping capture");
                }
            }
            Err(e) => {
                warn!(error = %e, "Tracker rejected capture");
                // Publishing it now would overtake captures still in flight
                if self.in_flight.is_empty() {
                    publish(&self.slot, Frame::new(capture, None));
                }
            }
        }

        let mut newest = None;
        loop {
            match tracker.pop_result(TrackerWait::Immediate) {
                Ok(Some(result)) => match claim(&mut self.in_flight, result.timestamp) {
                    Some(capture) => newest = Some(Frame::new(capture, Some(result))),
                    None => debug!(
                        timestamp = ?result.timestamp,
                        "Tracking result for a capture no longer in flight"
                    ),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Tracker result unavailable");
                    break;
                }
            }
        }

        match newest {
            Some(frame) => publish(&self.slot, frame),
            None => trace!(in_flight = self.in_flight.len(), "No tracking result ready"),
        }
        LoopAction::Continue
    }

    /// Run [`step`](Self::step) on a dedicated thread
    pub fn spawn(mut self) -> CaptureLoopController {
        CaptureLoopController::start("depth-capture", move || self.step())
    }
}

/// Remove and return the in-flight capture taken at `timestamp`. Older
/// captures are dropped with it; their results can only be stale now.
fn claim(in_flight: &mut VecDeque<Capture>, timestamp: Duration) -> Option<Capture> {
    let position = in_flight
        .iter()
        .position(|capture| capture.timestamp() == timestamp)?;
    if position > 0 {
        debug!(skipped = position, "Dropping captures overtaken by a newer result");
    }
    in_flight.drain(..position);
    in_flight.pop_front()
}

fn publish(slot: &FrameSlot, frame: Frame) {
    let sequence = frame.capture.sequence();
    if slot.publish(frame) == PublishOutcome::Replaced {
        debug!(sequence, "Published over unclaimed frame");
    }
}
