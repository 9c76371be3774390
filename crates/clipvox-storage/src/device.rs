//! Seams to the GPU layer. The storage engine decides *what* to allocate and
//! dispatch; implementors of these traits decide *how* (see clipvox-gpu for wgpu).

use std::ops::Range;

use glam::UVec3;

use crate::textures::CascadeTextures;

/// Resource creation half of the GPU device.
pub trait VoxelDevice {
    type Buffer;
    type Texture;
    type Format: Copy + PartialEq + std::fmt::Debug;

    /// Create a storage buffer of `word_count` 32-bit words.
    fn create_fragment_buffer(&mut self, word_count: u64) -> Self::Buffer;

    /// Release a buffer immediately. Called before its replacement is created.
    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    fn create_texture(&mut self, desc: &TextureDesc<Self::Format>) -> Self::Texture;

    fn destroy_texture(&mut self, texture: Self::Texture);
}

/// Description of one 3D texture owned by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc<F> {
    pub label: &'static str,
    pub size: UVec3,
    pub mip_level_count: u32,
    pub format: F,
}

/// Which compaction kernel a dispatch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelVariant {
    /// One thread per voxel; every attribute is computable in isolation.
    PerVoxel,
    /// One thread per voxel column, sweeping the column's height internally.
    PerColumn,
}

/// Uniform block of the compaction kernel. Must match `CompactParams` in the WGSL template.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompactionUniforms {
    pub cascade_resolution: [u32; 3],
    /// 32-bit words per voxel in the fragment buffer.
    pub storage_units: u32,
    pub first_cascade: u32,
    pub cascade_count: u32,
    pub layout_size: u32,
    pub _pad: u32,
}

/// Buffer → cascade texture compaction over a contiguous range of cascades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionDispatch<'a> {
    pub variant: KernelVariant,
    /// Total threads per axis; implementors round up to their workgroup size.
    pub thread_counts: UVec3,
    /// Generated text reading every attribute from the fragment buffer.
    pub read_samples: &'a str,
    /// Generated text reusing samples already resident in the column.
    pub resident_samples: &'a str,
    pub uniforms: CompactionUniforms,
}

/// Where a downsample reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownsampleSource {
    /// The slab of this cascade inside the cascade texture.
    Cascade(u32),
    /// The previous mip level of the mip chain.
    MipLevel(u32),
}

/// One 2x box-filter step into the mip chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownsampleDispatch {
    pub source: DownsampleSource,
    /// First source texel read; the cascade's slab origin for `Cascade` sources.
    pub source_origin: UVec3,
    /// Mip chain level written (through the scratch texture of the same index).
    pub target_level: u32,
    /// Size of the target level; one thread per texel.
    pub thread_counts: UVec3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch<'a> {
    Compact(CompactionDispatch<'a>),
    Downsample(DownsampleDispatch),
}

/// Command submission half of the GPU device. Calls are fire-and-forget.
pub trait DrawContext<B, T> {
    fn dispatch(&mut self, dispatch: &Dispatch<'_>, fragments: &B, textures: &CascadeTextures<T>);

    /// Zero the given word range of the fragment buffer.
    fn clear_buffer(&mut self, buffer: &B, words: Range<u64>);
}
