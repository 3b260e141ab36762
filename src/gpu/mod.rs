// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization utilities
//!
//! The viewer creates its device against the window surface; tests and the
//! `info` command create a headless one. Both go through [`create_device`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::RenderError;

pub use wgpu;

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor::default())
}

/// Pick an adapter and create a device and queue on it.
///
/// `compatible_surface` is the window surface when rendering on screen,
/// `None` for headless use.
pub async fn create_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'_>>,
    label: &str,
) -> Result<
    (
        wgpu::Adapter,
        Arc<wgpu::Device>,
        Arc<wgpu::Queue>,
        GpuDeviceInfo,
    ),
    RenderError,
> {
    info!(label, "Creating GPU device");

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| RenderError::NoAdapter(e.to_string()))?;

    let adapter_info = adapter.get_info();
    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        device_type = ?adapter_info.device_type,
        "GPU adapter selected"
    );

    let limits = wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits());
    debug!(
        max_texture_dimension_2d = limits.max_texture_dimension_2d,
        "Requesting device limits"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| RenderError::DeviceRequest(e.to_string()))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
        device_type: adapter_info.device_type,
    };

    Ok((adapter, Arc::new(device), Arc::new(queue), info))
}

/// Cached resource dimensions, used to skip reallocation when a size is
/// unchanged.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn needs_update(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }

    pub fn update(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_headless_device() {
        let instance = create_instance();
        match pollster::block_on(create_device(&instance, None, "test_device")) {
            Ok((_adapter, device, queue, info)) => {
                println!("Created device: {:?}", info);
                assert!(device.limits().max_texture_dimension_2d > 0);
                drop(queue);
                drop(device);
            }
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }

    #[test]
    fn test_cached_dimensions() {
        let mut dims = CachedDimensions::default();
        assert!(dims.needs_update(640, 480));

        dims.update(640, 480);
        assert!(!dims.needs_update(640, 480));
        assert!(dims.needs_update(1280, 720));
        assert_eq!(dims, CachedDimensions::new(640, 480));
    }
}
