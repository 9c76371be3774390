//! wgpu backend for clipvox-storage: resource creation, compaction and
//! downsample kernels, and the sampling parameter upload.

pub mod device;
pub mod draw;
pub mod kernels;
pub mod sampling;
pub mod shaders;

pub use device::WgpuVoxelDevice;
pub use draw::WgpuDrawContext;
pub use kernels::KernelCache;
pub use sampling::SamplingBuffers;

use clipvox_core::error::ClipvoxError;

/// Acquire a device without a surface, for offline runs and benchmarks.
pub async fn request_headless_device() -> Result<(wgpu::Device, wgpu::Queue), ClipvoxError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| ClipvoxError::AdapterNotFound("no adapter on the primary backends".into()))?;

    log::info!("clipvox adapter: {}", adapter.get_info().name);

    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("clipvox-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await
        .map_err(|e| ClipvoxError::DeviceRequestFailed(e.to_string()))
}
