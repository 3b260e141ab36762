// SPDX-License-Identifier: GPL-3.0-only

//! Producer thread lifecycle
//!
//! The capture side of the viewer runs on its own thread so that blocking
//! sensor and tracker calls never stall rendering. [`CaptureLoopController`]
//! owns that thread: it runs one step at a time, checks a shared stop flag
//! between steps and joins on stop or drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

/// What the loop should do after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Stop,
}

/// Handle to a running producer thread
pub struct CaptureLoopController {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Run `step` repeatedly on a new thread until it returns
    /// [`LoopAction::Stop`] or a stop is requested.
    pub fn start<F>(name: &str, mut step: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, || Ok(()), move |_: &mut ()| step())
    }

    /// Like [`start`](Self::start), but build the loop state on the new
    /// thread first. Nothing runs if `init` fails.
    pub fn start_with_init<S, I, F>(name: &str, init: I, mut step: F) -> Self
    where
        S: Send + 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_name = name.to_string();

        info!(name = %name, "Starting producer loop");

        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = match init() {
                    Ok(state) => state,
                    Err(error) => {
                        warn!(name = %thread_name, %error, "Producer loop init failed");
                        return;
                    }
                };

                let mut steps: u64 = 0;
                while !thread_stop.load(Ordering::SeqCst) {
                    steps += 1;
                    if step(&mut state) == LoopAction::Stop {
                        debug!(name = %thread_name, "Step requested stop");
                        break;
                    }
                }

                info!(name = %thread_name, steps, "Producer loop exiting");
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(error) => {
                warn!(name = %name, %error, "Failed to spawn producer thread");
                None
            }
        };

        Self {
            handle,
            stop,
            name: name.to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Shared stop flag, for callers that want to signal from elsewhere
    /// (a Ctrl+C handler, for example).
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Ask the loop to stop after the current step without waiting.
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Stop requested");
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Request a stop and wait for the thread.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish on its own.
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!(name = %self.name, "Producer thread panicked");
        } else {
            debug!(name = %self.name, "Producer thread joined");
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}
