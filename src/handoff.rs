// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot frame handoff between the capture and render threads
//!
//! The producer publishes, the consumer takes, and neither waits for the
//! other. A frame published over one that was never taken replaces it and
//! the old frame is released. Ownership moves through the slot, so every
//! frame is released exactly once: by the consumer after its tick, by a
//! later publish, or by [`FrameSlot::clear`] at shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::backends::Capture;
use crate::body::BodyFrame;

/// A depth capture paired with the tracking result for it, if any
#[derive(Debug)]
pub struct Frame {
    pub capture: Capture,
    pub bodies: Option<BodyFrame>,
}

impl Frame {
    pub fn new(capture: Capture, bodies: Option<BodyFrame>) -> Self {
        Self { capture, bodies }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.as_ref().map_or(0, |b| b.bodies.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The slot was empty
    Stored,
    /// An unclaimed frame was released to make room
    Replaced,
}

#[derive(Debug, Default)]
pub struct FrameSlot {
    slot: Mutex<Option<Frame>>,
    published: AtomicU64,
    replaced: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Frame>> {
        // A panic elsewhere cannot leave Option<Frame> half-written
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `frame`, releasing any frame that was not taken yet
    pub fn publish(&self, frame: Frame) -> PublishOutcome {
        let previous = self.lock().replace(frame);
        self.published.fetch_add(1, Ordering::Relaxed);

        match previous {
            Some(stale) => {
                self.replaced.fetch_add(1, Ordering::Relaxed);
                debug!(
                    sequence = stale.capture.sequence(),
                    "Releasing unclaimed frame"
                );
                // Released here, after the lock is gone
                drop(stale);
                PublishOutcome::Replaced
            }
            None => PublishOutcome::Stored,
        }
    }

    /// Claim the newest frame, leaving the slot empty
    pub fn take(&self) -> Option<Frame> {
        self.lock().take()
    }

    /// Release whatever is pending
    pub fn clear(&self) {
        let pending = self.lock().take();
        if let Some(frame) = pending {
            debug!(sequence = frame.capture.sequence(), "Releasing pending frame");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    /// Frames published so far
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames released without ever being taken
    pub fn dropped_count(&self) -> u64 {
        self.replaced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DepthImage;
    use std::sync::Arc;
    use std::time::Duration;

    fn tracked_frame(sequence: u64, releases: &Arc<AtomicU64>) -> Frame {
        let counter = Arc::clone(releases);
        let capture = Capture::with_release(
            DepthImage::filled(2, 2, 1000),
            sequence,
            Duration::from_millis(sequence * 33),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        Frame::new(capture, None)
    }

    #[test]
    fn test_take_twice() {
        let slot = FrameSlot::new();
        let releases = Arc::new(AtomicU64::new(0));
        slot.publish(tracked_frame(1, &releases));

        assert!(slot.take().is_some());
        assert!(slot.take().is_none());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_over_unclaimed_releases_once() {
        let slot = FrameSlot::new();
        let first = Arc::new(AtomicU64::new(0));
        let second = Arc::new(AtomicU64::new(0));

        assert_eq!(slot.publish(tracked_frame(1, &first)), PublishOutcome::Stored);
        assert_eq!(slot.publish(tracked_frame(2, &second)), PublishOutcome::Replaced);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        let frame = slot.take().unwrap();
        assert_eq!(frame.capture.sequence(), 2);
        assert!(slot.take().is_none());

        drop(frame);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(slot.dropped_count(), 1);
        assert_eq!(slot.published_count(), 2);
    }

    #[test]
    fn test_clear_releases_pending() {
        let slot = FrameSlot::new();
        let releases = Arc::new(AtomicU64::new(0));
        slot.publish(tracked_frame(7, &releases));

        slot.clear();
        assert!(slot.is_empty());
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        slot.clear();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_publish_and_take() {
        let slot = Arc::new(FrameSlot::new());
        let releases = Arc::new(AtomicU64::new(0));

        let producer = {
            let slot = Arc::clone(&slot);
            let releases = Arc::clone(&releases);
            std::thread::spawn(move || {
                for sequence in 0..200 {
                    slot.publish(tracked_frame(sequence, &releases));
                }
            })
        };

        let mut taken = 0;
        while !producer.is_finished() {
            if slot.take().is_some() {
                taken += 1;
            }
        }
        producer.join().unwrap();
        if slot.take().is_some() {
            taken += 1;
        }

        assert_eq!(releases.load(Ordering::SeqCst), 200);
        assert_eq!(taken + slot.dropped_count(), 200);
    }
}
