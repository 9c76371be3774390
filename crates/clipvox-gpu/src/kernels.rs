use std::collections::HashMap;

use glam::UVec3;

/// Which bind group shape a kernel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    /// fragments (storage rw), output (storage texture), params (uniform)
    Compaction,
    /// source (sampled texture), target (storage texture), params (uniform)
    Downsample,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    source: String,
    entry: &'static str,
}

/// Compute pipelines keyed by their composed WGSL source, kept across frames.
///
/// Sources change only when the attribute list or texture format does, so after
/// the first frame every lookup is a hit.
#[derive(Default)]
pub struct KernelCache {
    layouts: HashMap<(KernelKind, wgpu::TextureFormat), wgpu::BindGroupLayout>,
    pipelines: HashMap<PipelineKey, wgpu::ComputePipeline>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Pipeline and bind group layout for `source`, compiling on first use.
    pub fn kernel(
        &mut self,
        device: &wgpu::Device,
        kind: KernelKind,
        format: wgpu::TextureFormat,
        source: String,
        entry: &'static str,
    ) -> (&wgpu::ComputePipeline, &wgpu::BindGroupLayout) {
        let layout = self
            .layouts
            .entry((kind, format))
            .or_insert_with(|| create_bind_group_layout(device, kind, format));

        let key = PipelineKey { source, entry };
        let pipeline = self.pipelines.entry(key).or_insert_with_key(|key| {
            log::info!("KernelCache: compiling {entry} for {format:?}");
            create_pipeline(device, layout, &key.source, entry)
        });
        (pipeline, layout)
    }
}

fn create_bind_group_layout(
    device: &wgpu::Device,
    kind: KernelKind,
    format: wgpu::TextureFormat,
) -> wgpu::BindGroupLayout {
    let input = match kind {
        KernelKind::Compaction => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        KernelKind::Downsample => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D3,
            multisampled: false,
        },
    };
    let label = match kind {
        KernelKind::Compaction => "clipmap-compact-bgl",
        KernelKind::Downsample => "clipmap-downsample-bgl",
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            // binding 0: fragment buffer or source texture
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: input,
                count: None,
            },
            // binding 1: written texture
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format,
                    view_dimension: wgpu::TextureViewDimension::D3,
                },
                count: None,
            },
            // binding 2: params
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    source: &str,
    entry: &'static str,
) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("clipmap-shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("clipmap-pipeline-layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(entry),
        layout: Some(&layout),
        module: &module,
        entry_point: Some(entry),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// Workgroups needed to cover `threads` with groups of `group_size`.
pub fn workgroup_counts(threads: UVec3, group_size: UVec3) -> UVec3 {
    UVec3::new(
        threads.x.div_ceil(group_size.x.max(1)),
        threads.y.div_ceil(group_size.y.max(1)),
        threads.z.div_ceil(group_size.z.max(1)),
    )
}
