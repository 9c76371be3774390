use std::ops::Range;

use clipvox_core::constants::{
    COLUMN_WORKGROUP_XZ, COMPACT_WORKGROUP_XY, COMPACT_WORKGROUP_Z, DOWNSAMPLE_WORKGROUP,
    WORD_BYTES,
};
use clipvox_storage::device::{
    CompactionDispatch, Dispatch, DownsampleDispatch, DownsampleSource, DrawContext, KernelVariant,
};
use clipvox_storage::textures::CascadeTextures;
use glam::UVec3;
use wgpu::util::DeviceExt;

use crate::kernels::{workgroup_counts, KernelCache, KernelKind};
use crate::shaders::{
    compose_compaction_source, compose_downsample_source, storage_format_name,
    COMPACT_COLUMN_ENTRY, COMPACT_VOXEL_ENTRY, DOWNSAMPLE_ENTRY,
};

/// Uniform block of the downsample kernel. Must match `DownsampleParams` in downsample.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DownsampleUniforms {
    pub source_origin: [u32; 3],
    pub layout_size: u32,
    pub target_size: [u32; 3],
    pub _pad: u32,
}

/// [`DrawContext`] recording into one wgpu command encoder.
///
/// Call [`finish`](Self::finish) and submit the result once the frame's
/// post-process is done.
pub struct WgpuDrawContext<'a> {
    device: &'a wgpu::Device,
    kernels: &'a mut KernelCache,
    encoder: wgpu::CommandEncoder,
    /// WGSL defining the `voxel_attr_*` functions the generated text calls.
    attribute_source: &'a str,
}

impl<'a> WgpuDrawContext<'a> {
    pub fn new(device: &'a wgpu::Device, kernels: &'a mut KernelCache, attribute_source: &'a str) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("clipmap-post-process"),
        });
        Self {
            device,
            kernels,
            encoder,
            attribute_source,
        }
    }

    pub fn finish(self) -> wgpu::CommandBuffer {
        self.encoder.finish()
    }

    fn compact(
        &mut self,
        dispatch: &CompactionDispatch<'_>,
        fragments: &wgpu::Buffer,
        textures: &CascadeTextures<wgpu::Texture>,
    ) {
        let format = textures.cascades.format();
        let Some(format_name) = storage_format_name(format) else {
            log::warn!("WgpuDrawContext: {format:?} is not a writable storage format, skipping compaction");
            return;
        };
        let source = compose_compaction_source(
            format_name,
            self.attribute_source,
            dispatch.read_samples,
            dispatch.resident_samples,
        );
        let (entry, group_size) = match dispatch.variant {
            KernelVariant::PerVoxel => (
                COMPACT_VOXEL_ENTRY,
                UVec3::new(COMPACT_WORKGROUP_XY, COMPACT_WORKGROUP_XY, COMPACT_WORKGROUP_Z),
            ),
            KernelVariant::PerColumn => (
                COMPACT_COLUMN_ENTRY,
                UVec3::new(COLUMN_WORKGROUP_XZ, 1, COLUMN_WORKGROUP_XZ),
            ),
        };

        let (pipeline, layout) =
            self.kernels
                .kernel(self.device, KernelKind::Compaction, format, source, entry);

        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("clipmap-compact-params"),
            contents: bytemuck::bytes_of(&dispatch.uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let output_view = textures.cascades.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("clipmap-compact-bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: fragments.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&output_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let groups = workgroup_counts(dispatch.thread_counts, group_size);
        let mut pass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("clipmap-compact"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups.x, groups.y, groups.z);
    }

    fn downsample(&mut self, dispatch: &DownsampleDispatch, textures: &CascadeTextures<wgpu::Texture>) {
        let Some(mip_chain) = textures.mip_chain.as_ref() else {
            return;
        };
        let Some(scratch) = textures.scratch.get(dispatch.target_level as usize) else {
            log::warn!(
                "WgpuDrawContext: no scratch texture for mip level {}",
                dispatch.target_level
            );
            return;
        };
        let format = mip_chain.format();
        let Some(format_name) = storage_format_name(format) else {
            return;
        };

        let source_view = match dispatch.source {
            DownsampleSource::Cascade(_) => {
                textures.cascades.create_view(&wgpu::TextureViewDescriptor::default())
            }
            DownsampleSource::MipLevel(level) => mip_chain.create_view(&wgpu::TextureViewDescriptor {
                label: Some("clipmap-mip-source"),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            }),
        };
        let target_view = scratch.create_view(&wgpu::TextureViewDescriptor::default());

        let (pipeline, layout) = self.kernels.kernel(
            self.device,
            KernelKind::Downsample,
            format,
            compose_downsample_source(format_name),
            DOWNSAMPLE_ENTRY,
        );

        let size = dispatch.thread_counts;
        let uniforms = DownsampleUniforms {
            source_origin: dispatch.source_origin.to_array(),
            layout_size: textures.layout_size,
            target_size: size.to_array(),
            _pad: 0,
        };
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("clipmap-downsample-params"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("clipmap-downsample-bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&target_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        {
            let groups = workgroup_counts(size, UVec3::splat(DOWNSAMPLE_WORKGROUP));
            let mut pass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("clipmap-downsample"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.x, groups.y, groups.z);
        }

        // Scratch -> mip chain, so the next level can read this one.
        self.encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: scratch,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: mip_chain,
                mip_level: dispatch.target_level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: size.z,
            },
        );
    }
}

impl DrawContext<wgpu::Buffer, wgpu::Texture> for WgpuDrawContext<'_> {
    fn dispatch(
        &mut self,
        dispatch: &Dispatch<'_>,
        fragments: &wgpu::Buffer,
        textures: &CascadeTextures<wgpu::Texture>,
    ) {
        match dispatch {
            Dispatch::Compact(compaction) => self.compact(compaction, fragments, textures),
            Dispatch::Downsample(downsample) => self.downsample(downsample, textures),
        }
    }

    fn clear_buffer(&mut self, buffer: &wgpu::Buffer, words: Range<u64>) {
        let offset = words.start * WORD_BYTES;
        let size = (words.end - words.start) * WORD_BYTES;
        self.encoder.clear_buffer(buffer, offset, Some(size));
    }
}
