use clipvox_storage::params::{LevelParams, SamplingParameters};

/// Header of the sampling parameter block. Must match `ClipmapHeader` in the lighting shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SamplingHeader {
    pub cascade_resolution: [u32; 3],
    pub cascade_count: u32,
    pub mip_count: u32,
    pub level_count: u32,
    pub _pad: [u32; 2],
}

impl SamplingHeader {
    pub fn from_parameters(params: &SamplingParameters) -> Self {
        Self {
            cascade_resolution: params.cascade_resolution.to_array(),
            cascade_count: params.cascade_count,
            mip_count: params.mip_count,
            level_count: params.levels.len() as u32,
            _pad: [0; 2],
        }
    }
}

/// GPU copy of [`SamplingParameters`] for the lighting system: a uniform header and
/// a storage buffer with one [`LevelParams`] per level.
pub struct SamplingBuffers {
    pub header: wgpu::Buffer,
    pub levels: wgpu::Buffer,
    level_capacity: usize,
}

impl SamplingBuffers {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, params: &SamplingParameters) -> Self {
        let header = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clipmap-sampling-header"),
            size: std::mem::size_of::<SamplingHeader>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let level_capacity = params.levels.len().max(1);
        let mut buffers = Self {
            header,
            levels: create_level_buffer(device, level_capacity),
            level_capacity,
        };
        buffers.update(device, queue, params);
        buffers
    }

    /// Upload this frame's parameters, growing the level buffer when the plan gained levels.
    pub fn update(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, params: &SamplingParameters) {
        queue.write_buffer(
            &self.header,
            0,
            bytemuck::bytes_of(&SamplingHeader::from_parameters(params)),
        );
        if params.levels.len() > self.level_capacity {
            log::debug!(
                "SamplingBuffers: growing level buffer {} -> {}",
                self.level_capacity,
                params.levels.len()
            );
            self.levels.destroy();
            self.level_capacity = params.levels.len();
            self.levels = create_level_buffer(device, self.level_capacity);
        }
        if !params.levels.is_empty() {
            queue.write_buffer(&self.levels, 0, params.level_bytes());
        }
    }
}

fn create_level_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("clipmap-sampling-levels"),
        size: (capacity * std::mem::size_of::<LevelParams>()) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
