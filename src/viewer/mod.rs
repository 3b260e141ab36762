// SPDX-License-Identifier: GPL-3.0-only

//! Window, surface and render loop
//!
//! The capture thread is started before the event loop and stopped after it
//! returns. Everything GPU related is created in `resumed` and only touched
//! from the event loop thread.

mod camera;

pub use camera::ViewCamera;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Fullscreen, Window, WindowId};

use crate::backends::{BodyTracker, CaptureSession, DepthSensor, SyntheticSensor, SyntheticTracker};
use crate::config::Config;
use crate::depth::PointCloudEngine;
use crate::errors::{AppError, AppResult, RenderError};
use crate::gpu::{self, wgpu};
use crate::handoff::FrameSlot;
use crate::orchestrator::{AcquiredFrame, FrameOrchestrator, RenderTarget, TickOutcome};

/// What a key press asks the viewer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    ToggleFullscreen,
    Exit,
}

pub fn action_for_key(key: &Key) -> Option<ViewerAction> {
    match key.as_ref() {
        Key::Named(NamedKey::Escape) | Key::Character("q" | "Q") => Some(ViewerAction::Exit),
        Key::Named(NamedKey::F11) | Key::Character("f" | "F") => {
            Some(ViewerAction::ToggleFullscreen)
        }
        _ => None,
    }
}

/// Window surface as a render target
struct SurfaceTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: Arc<wgpu::Device>,
}

impl SurfaceTarget {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }
}

impl RenderTarget for SurfaceTarget {
    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn acquire(&mut self) -> Option<AcquiredFrame> {
        match self.surface.get_current_texture() {
            Ok(texture) => Some(AcquiredFrame::surface(texture)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("Surface outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                None
            }
            Err(wgpu::SurfaceError::Timeout) => None,
            Err(e) => {
                warn!(error = %e, "Failed to acquire surface texture");
                None
            }
        }
    }
}

struct ViewerState {
    window: Arc<Window>,
    queue: Arc<wgpu::Queue>,
    device: Arc<wgpu::Device>,
    surface: SurfaceTarget,
    orchestrator: FrameOrchestrator,
    camera: ViewCamera,
}

struct ViewerApp {
    config: Config,
    /// Handed to the orchestrator once the GPU is up
    engine: Option<PointCloudEngine>,
    slot: Arc<FrameSlot>,
    shutdown: Arc<AtomicBool>,
    state: Option<ViewerState>,
    error: Option<AppError>,
}

impl ViewerApp {
    fn create_window(&self, event_loop: &ActiveEventLoop) -> AppResult<Arc<Window>> {
        let window = &self.config.window;
        let mut attributes = Window::default_attributes()
            .with_title(window.title.as_str())
            .with_inner_size(LogicalSize::new(window.width, window.height));
        if window.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        event_loop
            .create_window(attributes)
            .map(Arc::new)
            .map_err(|e| AppError::Window(e.to_string()))
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> AppResult<ViewerState> {
        let size = window.inner_size();
        let instance = gpu::create_instance();
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(|e| RenderError::Surface(e.to_string()))?;

        let (adapter, device, queue, info) =
            pollster::block_on(gpu::create_device(&instance, Some(&surface), "viewer"))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| {
                RenderError::Surface(format!("{} cannot present to this window", info.adapter_name))
            })?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        info!(?format, width = size.width, height = size.height, "Surface configured");

        let engine = self
            .engine
            .take()
            .ok_or_else(|| AppError::Other("render state initialized twice".into()))?;
        let orchestrator = FrameOrchestrator::new(
            &device,
            format,
            engine,
            Arc::clone(&self.slot),
            &self.config.render,
        )?;

        Ok(ViewerState {
            window,
            surface: SurfaceTarget {
                surface,
                config: surface_config,
                device: Arc::clone(&device),
            },
            device,
            queue,
            orchestrator,
            camera: ViewCamera::new(self.config.render.fov_degrees, size.width, size.height),
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: AppError) {
        error!(%error, "Viewer stopped");
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let result = self
            .create_window(event_loop)
            .and_then(|window| self.init_gpu(window));
        match result {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => {
                state.surface.resize(size.width, size.height);
                state.camera.set_viewport(size.width, size.height);
            }

            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match action_for_key(&event.logical_key) {
                    Some(ViewerAction::Exit) => {
                        info!("Exit requested");
                        event_loop.exit();
                    }
                    Some(ViewerAction::ToggleFullscreen) => {
                        let fullscreen = match state.window.fullscreen() {
                            Some(_) => None,
                            None => Some(Fullscreen::Borderless(None)),
                        };
                        debug!(enabled = fullscreen.is_some(), "Toggling fullscreen");
                        state.window.set_fullscreen(fullscreen);
                    }
                    None => {}
                }
            }

            WindowEvent::RedrawRequested => {
                let camera = state.camera.matrices();
                let outcome = state.orchestrator.tick(
                    &state.device,
                    &state.queue,
                    &mut state.surface,
                    &camera,
                );
                match outcome {
                    Ok(TickOutcome::Rendered(stats)) => {
                        debug!(sequence = stats.sequence, points = stats.points, "Frame rendered");
                    }
                    Ok(_) => {}
                    Err(e) => self.fail(event_loop, e.into()),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.shutdown.load(Ordering::SeqCst) {
            info!("Shutdown signal received");
            event_loop.exit();
            return;
        }
        if let Some(state) = self.state.as_ref() {
            state.window.request_redraw();
        }
    }
}

/// Open the viewer and block until it is closed
pub fn run(config: Config, shutdown: Arc<AtomicBool>) -> AppResult<()> {
    let sensor = SyntheticSensor::new(config.sensor.calibration(), config.sensor.fps);
    // Cache is complete before the first capture can be published
    let engine = PointCloudEngine::with_projection(&sensor.calibration());

    let tracker: Option<Box<dyn BodyTracker>> = if config.tracking.enabled {
        Some(Box::new(SyntheticTracker::new(config.tracking.max_bodies)))
    } else {
        None
    };

    let slot = Arc::new(FrameSlot::new());
    let mut capture = CaptureSession::new(Box::new(sensor), tracker, Arc::clone(&slot)).spawn();

    let event_loop = EventLoop::new().map_err(|e| AppError::Window(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp {
        config,
        engine: Some(engine),
        slot: Arc::clone(&slot),
        shutdown,
        state: None,
        error: None,
    };
    let result = event_loop.run_app(&mut app);

    // GPU state goes first, then the producer, then whatever it left behind
    app.state = None;
    capture.stop();
    slot.clear();
    info!(
        published = slot.published_count(),
        dropped = slot.dropped_count(),
        "Viewer closed"
    );

    result.map_err(|e| AppError::Window(e.to_string()))?;
    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_keys() {
        assert_eq!(
            action_for_key(&Key::Named(NamedKey::Escape)),
            Some(ViewerAction::Exit)
        );
        assert_eq!(
            action_for_key(&Key::Character("q".into())),
            Some(ViewerAction::Exit)
        );
    }

    #[test]
    fn test_fullscreen_keys() {
        assert_eq!(
            action_for_key(&Key::Named(NamedKey::F11)),
            Some(ViewerAction::ToggleFullscreen)
        );
        assert_eq!(
            action_for_key(&Key::Character("F".into())),
            Some(ViewerAction::ToggleFullscreen)
        );
    }

    #[test]
    fn test_other_keys_ignored() {
        assert_eq!(action_for_key(&Key::Character("x".into())), None);
        assert_eq!(action_for_key(&Key::Named(NamedKey::Space)), None);
    }
}
