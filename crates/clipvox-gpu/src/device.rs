use clipvox_core::constants::WORD_BYTES;
use clipvox_storage::device::{TextureDesc, VoxelDevice};

/// [`VoxelDevice`] backed by a wgpu device.
///
/// Buffers and textures are destroyed eagerly so a resize never holds two
/// fragment buffers at once.
pub struct WgpuVoxelDevice<'a> {
    device: &'a wgpu::Device,
}

impl<'a> WgpuVoxelDevice<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &wgpu::Device {
        self.device
    }
}

impl VoxelDevice for WgpuVoxelDevice<'_> {
    type Buffer = wgpu::Buffer;
    type Texture = wgpu::Texture;
    type Format = wgpu::TextureFormat;

    fn create_fragment_buffer(&mut self, word_count: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clipmap-fragment-buffer"),
            size: word_count * WORD_BYTES,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    fn destroy_buffer(&mut self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }

    fn create_texture(&mut self, desc: &TextureDesc<wgpu::TextureFormat>) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.size.x,
                height: desc.size.y,
                depth_or_array_layers: desc.size.z,
            },
            mip_level_count: desc.mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: desc.format,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn destroy_texture(&mut self, texture: wgpu::Texture) {
        texture.destroy();
    }
}
