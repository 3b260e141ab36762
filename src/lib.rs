// SPDX-License-Identifier: MPL-2.0

//! depthcloud - real-time depth camera point cloud and skeleton viewer
//!
//! Depth images are turned into point clouds through a per-pixel
//! unprojection table and drawn together with tracked skeletons (a sphere
//! per joint, a cylinder per bone) by a small primitive renderer.
//!
//! # Architecture
//!
//! - [`backends`]: sensor and tracker traits, synthetic implementations and
//!   the capture thread
//! - [`handoff`]: single-slot, newest-wins frame exchange between threads
//! - [`depth`]: calibration and point cloud reconstruction
//! - [`body`]: joint enumeration and skeleton topology
//! - [`render`]: vertex buffers, drawables, the shading pipeline, primitives
//! - [`orchestrator`]: per-tick frame rendering
//! - [`viewer`]: window, surface and input
//! - [`config`]: user configuration handling
//!
//! # Example
//!
//! ```ignore
//! // Opens a window; typically run via:
//! // depthcloud --bodies 3
//! ```

pub mod backends;
pub mod body;
pub mod config;
pub mod constants;
pub mod depth;
pub mod errors;
pub mod gpu;
pub mod handoff;
pub mod orchestrator;
pub mod render;
pub mod shaders;
pub mod viewer;

// Re-export commonly used types
pub use config::Config;
pub use depth::{Calibration, PointCloudEngine};
pub use errors::{AppError, AppResult};
pub use handoff::{Frame, FrameSlot};
pub use orchestrator::{FrameOrchestrator, TickOutcome};
