use std::ops::Range;
use std::time::Instant;

use clipvox_core::config::StorageConfig;
use clipvox_core::error::ClipvoxError;
use clipvox_core::types::{StorageContext, UpdatePolicy};
use clipvox_gpu::{KernelCache, SamplingBuffers, WgpuDrawContext, WgpuVoxelDevice};
use clipvox_storage::compactor::{CompactionOutcome, CompactionReport};
use clipvox_storage::device::{Dispatch, DrawContext, TextureDesc, VoxelDevice};
use clipvox_storage::passes::VolumeData;
use clipvox_storage::textures::CascadeTextures;
use clipvox_storage::ClipmapStorage;

use crate::scenes::{self, SceneConfig};

const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Aggregated statistics for one scene under one policy.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BenchmarkResult {
    pub scene_name: String,
    pub policy: String,
    pub frames: u32,
    pub cascade_count: u32,
    pub mip_count: u32,
    pub storage_units: u32,
    pub fragment_mb: f64,
    pub buffer_reallocations: u64,
    pub texture_sets_created: u64,
    pub voxelization_passes: u64,
    pub compaction_dispatches: u64,
    pub downsample_dispatches: u64,
    pub cleared_mwords: f64,
    pub skipped_frames: u32,
    pub mean_cpu_us: f64,
}

/// Handle type of [`CountingDevice`]; carries its size for bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedBuffer {
    pub id: u32,
    pub words: u64,
}

/// A [`VoxelDevice`] that allocates nothing and counts every call.
#[derive(Debug, Default)]
pub struct CountingDevice {
    next_id: u32,
    pub live_words: u64,
    pub peak_words: u64,
    pub buffers_created: u32,
}

impl VoxelDevice for CountingDevice {
    type Buffer = CountedBuffer;
    type Texture = u32;
    type Format = wgpu::TextureFormat;

    fn create_fragment_buffer(&mut self, word_count: u64) -> CountedBuffer {
        self.next_id += 1;
        self.buffers_created += 1;
        self.live_words += word_count;
        self.peak_words = self.peak_words.max(self.live_words);
        CountedBuffer {
            id: self.next_id,
            words: word_count,
        }
    }

    fn destroy_buffer(&mut self, buffer: CountedBuffer) {
        self.live_words -= buffer.words;
    }

    fn create_texture(&mut self, _desc: &TextureDesc<wgpu::TextureFormat>) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn destroy_texture(&mut self, _texture: u32) {}
}

/// A [`DrawContext`] that records dispatch counts instead of running anything.
#[derive(Debug, Default)]
pub struct CountingDraw {
    pub compaction_dispatches: u64,
    pub downsample_dispatches: u64,
    pub cleared_words: u64,
}

impl<B, T> DrawContext<B, T> for CountingDraw {
    fn dispatch(&mut self, dispatch: &Dispatch<'_>, _fragments: &B, _textures: &CascadeTextures<T>) {
        match dispatch {
            Dispatch::Compact(_) => self.compaction_dispatches += 1,
            Dispatch::Downsample(_) => self.downsample_dispatches += 1,
        }
    }

    fn clear_buffer(&mut self, _buffer: &B, words: Range<u64>) {
        self.cleared_words += words.end - words.start;
    }
}

fn policy_name(policy: UpdatePolicy) -> &'static str {
    match policy {
        UpdatePolicy::SingleCascade => "single",
        UpdatePolicy::AllCascadesWideDispatch => "wide",
        UpdatePolicy::AllCascadesMultiplePasses => "multi",
    }
}

/// Parse a `--policy` value.
pub fn parse_policy(name: &str) -> Option<UpdatePolicy> {
    match name {
        "single" => Some(UpdatePolicy::SingleCascade),
        "wide" => Some(UpdatePolicy::AllCascadesWideDispatch),
        "multi" => Some(UpdatePolicy::AllCascadesMultiplePasses),
        _ => None,
    }
}

/// Per-frame bookkeeping shared by the counting and GPU runs.
struct Tally {
    result: BenchmarkResult,
    elapsed_us: f64,
}

impl Tally {
    fn new(config: &SceneConfig, policy: UpdatePolicy, frames: u32) -> Self {
        let label = if policy.updates_all() {
            format!("{} (full refresh)", policy_name(policy))
        } else {
            policy_name(policy).to_string()
        };
        Self {
            result: BenchmarkResult {
                scene_name: config.name.to_string(),
                policy: label,
                frames,
                ..Default::default()
            },
            elapsed_us: 0.0,
        }
    }

    fn record(&mut self, report: &CompactionReport, passes: usize, started: Instant) {
        self.elapsed_us += started.elapsed().as_secs_f64() * 1e6;
        self.result.voxelization_passes += passes as u64;
        if matches!(report.outcome, CompactionOutcome::Skipped(_)) {
            self.result.skipped_frames += 1;
        }
    }

    fn finish<D: VoxelDevice>(mut self, storage: &ClipmapStorage<D>) -> BenchmarkResult {
        let plan = storage.plan();
        self.result.cascade_count = plan.cascade_count;
        self.result.mip_count = plan.mip_count;
        self.result.storage_units = storage.storage_units();
        self.result.fragment_mb = storage.fragment_capacity_words() as f64 * 4.0 / (1024.0 * 1024.0);
        self.result.buffer_reallocations = storage.reallocations();
        self.result.texture_sets_created = storage.texture_recreations();
        if self.result.frames > 0 {
            self.result.mean_cpu_us = self.elapsed_us / self.result.frames as f64;
        }
        self.result
    }
}

fn frame_context(config: &SceneConfig, frame: u32, frames: u32) -> StorageContext {
    StorageContext::new(
        config.resolution,
        config.extents,
        config.camera.position(frame, frames),
    )
}

/// Drive `frames` frames of a scene through the storage engine against a counting device.
pub fn run_scene(
    config: &SceneConfig,
    storage_config: &StorageConfig,
    policy: UpdatePolicy,
    frames: u32,
) -> BenchmarkResult {
    log::info!("Running scene '{}' ({})...", config.name, policy_name(policy));

    let mut storage = ClipmapStorage::<CountingDevice>::new(StorageConfig {
        update_policy: policy,
        ..storage_config.clone()
    });
    let mut device = CountingDevice::default();
    let mut draw = CountingDraw::default();
    let mut volume = VolumeData::new(scenes::bench_attributes());
    let layout = scenes::layout_size(&volume.attributes);
    let mut tally = Tally::new(config, policy, frames);

    for frame in 0..frames {
        let started = Instant::now();
        let ctx = frame_context(config, frame, frames);
        storage.update_from_context(&ctx);
        storage.request_attribute_storage(&mut volume.attributes);
        storage.update_temp_storage(&mut device, &ctx);
        storage.update_texture(&mut device, &ctx, OUTPUT_FORMAT, layout);
        volume.passes.clear();
        let passes = storage.collect_voxelization_passes(&mut volume, &ctx);
        let report = storage.post_process(&ctx, &mut draw, &volume);
        tally.record(&report, passes, started);
    }

    tally.result.compaction_dispatches = draw.compaction_dispatches;
    tally.result.downsample_dispatches = draw.downsample_dispatches;
    tally.result.cleared_mwords = draw.cleared_words as f64 / 1e6;
    log::debug!(
        "scene '{}': peak fragment storage {} words",
        config.name,
        device.peak_words
    );
    let result = tally.finish(&storage);
    storage.release(&mut device);
    result
}

/// Runs scenes on a real GPU through the wgpu backend.
pub struct GpuRunner {
    device: wgpu::Device,
    queue: wgpu::Queue,
    kernels: KernelCache,
}

impl GpuRunner {
    /// Initialize wgpu natively. Blocks on async adapter request.
    pub fn new() -> Result<Self, ClipvoxError> {
        let (device, queue) = pollster::block_on(clipvox_gpu::request_headless_device())?;
        Ok(Self {
            device,
            queue,
            kernels: KernelCache::new(),
        })
    }

    /// Same frame loop as [`run_scene`], submitting real compute work each frame.
    pub fn run_scene(
        &mut self,
        config: &SceneConfig,
        storage_config: &StorageConfig,
        policy: UpdatePolicy,
        frames: u32,
    ) -> Result<BenchmarkResult, ClipvoxError> {
        log::info!("Running scene '{}' ({}) on GPU...", config.name, policy_name(policy));

        let mut storage = ClipmapStorage::<WgpuVoxelDevice>::new(StorageConfig {
            update_policy: policy,
            ..storage_config.clone()
        });
        let mut device = WgpuVoxelDevice::new(&self.device);
        let mut volume = VolumeData::new(scenes::bench_attributes());
        let layout = scenes::layout_size(&volume.attributes);
        let mut tally = Tally::new(config, policy, frames);
        let mut sampling: Option<SamplingBuffers> = None;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        for frame in 0..frames {
            let started = Instant::now();
            let ctx = frame_context(config, frame, frames);
            storage.update_from_context(&ctx);
            storage.request_attribute_storage(&mut volume.attributes);
            storage.update_temp_storage(&mut device, &ctx);
            storage.update_texture(&mut device, &ctx, OUTPUT_FORMAT, layout);
            volume.passes.clear();
            let passes = storage.collect_voxelization_passes(&mut volume, &ctx);

            let mut draw = WgpuDrawContext::new(&self.device, &mut self.kernels, scenes::BENCH_ATTRIBUTE_WGSL);
            let report = storage.post_process(&ctx, &mut draw, &volume);
            self.queue.submit(Some(draw.finish()));
            tally.result.compaction_dispatches += report.compaction_dispatches as u64;
            tally.result.downsample_dispatches += report.downsample_dispatches as u64;
            if let Some(cleared) = &report.cleared_words {
                tally.result.cleared_mwords += (cleared.end - cleared.start) as f64 / 1e6;
            }

            let params = storage.sampling_parameters();
            match sampling.as_mut() {
                Some(buffers) => buffers.update(&self.device, &self.queue, &params),
                None => sampling = Some(SamplingBuffers::new(&self.device, &self.queue, &params)),
            }
            tally.record(&report, passes, started);
        }
        let _ = self.device.poll(wgpu::Maintain::Wait);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            storage.release(&mut device);
            return Err(ClipvoxError::ShaderCompilationFailed(error.to_string()));
        }

        let result = tally.finish(&storage);
        storage.release(&mut device);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{UVec3, Vec3};

    fn scene(name: &'static str, res: u32) -> SceneConfig {
        SceneConfig {
            name,
            resolution: UVec3::splat(res),
            extents: Vec3::splat(res as f32 / 2.0),
            camera: crate::scenes::CameraPath::Linear {
                from: Vec3::ZERO,
                to: Vec3::new(20.0, 0.0, 0.0),
            },
        }
    }

    #[test]
    fn test_round_robin_scene() {
        let result = run_scene(
            &scene("rr", 512),
            &StorageConfig::default(),
            UpdatePolicy::SingleCascade,
            9,
        );
        assert_eq!(result.cascade_count, 3);
        assert_eq!(result.storage_units, 3);
        assert_eq!(result.buffer_reallocations, 1);
        assert_eq!(result.texture_sets_created, 1);
        assert_eq!(result.compaction_dispatches, 9);
        // mips rebuilt on the 3 frames that refresh the coarsest cascade
        assert_eq!(result.downsample_dispatches, 3 * result.mip_count as u64);
        assert_eq!(result.skipped_frames, 0);
        // two output attributes plus one temp, one pass each per frame
        assert_eq!(result.voxelization_passes, 27);
    }

    #[test]
    fn test_multi_pass_scene_dispatches_per_cascade() {
        let result = run_scene(
            &scene("multi", 512),
            &StorageConfig::default(),
            UpdatePolicy::AllCascadesMultiplePasses,
            4,
        );
        assert_eq!(result.compaction_dispatches, 12);
        assert_eq!(result.voxelization_passes, 36);
        assert!(result.policy.contains("full refresh"));
    }

    #[test]
    fn test_tiny_scene_skips_every_frame() {
        let result = run_scene(
            &scene("tiny", 16),
            &StorageConfig::default(),
            UpdatePolicy::AllCascadesWideDispatch,
            5,
        );
        assert_eq!(result.skipped_frames, 5);
        assert_eq!(result.compaction_dispatches, 0);
        assert_eq!(result.cleared_mwords, 0.0);
    }

    #[test]
    fn test_counting_device_tracks_live_words() {
        let mut device = CountingDevice::default();
        let a = device.create_fragment_buffer(100);
        let b = device.create_fragment_buffer(50);
        device.destroy_buffer(a);
        assert_eq!(device.live_words, 50);
        assert_eq!(device.peak_words, 150);
        device.destroy_buffer(b);
        assert_eq!(device.live_words, 0);
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(parse_policy("single"), Some(UpdatePolicy::SingleCascade));
        assert_eq!(parse_policy("wide"), Some(UpdatePolicy::AllCascadesWideDispatch));
        assert_eq!(parse_policy("multi"), Some(UpdatePolicy::AllCascadesMultiplePasses));
        assert_eq!(parse_policy("bogus"), None);
    }
}
