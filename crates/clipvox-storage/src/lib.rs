pub mod allocator;
pub mod codegen;
pub mod compactor;
pub mod device;
pub mod offsets;
pub mod params;
pub mod passes;
pub mod planner;
pub mod scheduler;
pub mod textures;

#[cfg(test)]
mod test_harness;

use clipvox_core::config::StorageConfig;
use clipvox_core::types::{StorageContext, UpdatePolicy, VoxelAttribute};

use allocator::FragmentAllocator;
use compactor::{BufferCompactor, CompactionReport, FragmentView};
use device::{DrawContext, VoxelDevice};
use offsets::CascadeOffsets;
use params::SamplingParameters;
use passes::VolumeData;
use planner::{plan_cascades, CascadePlan};
use scheduler::{FrameSchedule, SchedulerState};
use textures::{CascadeTextures, TextureManager};

/// Primary public struct for the clipvox-storage crate.
/// Owns the cascade layout, the fragment buffer and the clipmap textures, and
/// drives them through the per-frame protocol:
///
/// 1. [`update_from_context`](Self::update_from_context)
/// 2. [`request_temp_storage`](Self::request_temp_storage) once per attribute
/// 3. [`update_temp_storage`](Self::update_temp_storage) and [`update_texture`](Self::update_texture)
/// 4. [`collect_voxelization_passes`](Self::collect_voxelization_passes), then the
///    external rasterizer runs the passes
/// 5. [`post_process`](Self::post_process)
pub struct ClipmapStorage<D: VoxelDevice> {
    config: StorageConfig,
    plan: CascadePlan,
    scheduler: SchedulerState,
    schedule: FrameSchedule,
    offsets: CascadeOffsets,
    allocator: FragmentAllocator<D::Buffer>,
    textures: TextureManager<D::Texture, D::Format>,
    compactor: BufferCompactor,
}

impl<D: VoxelDevice> ClipmapStorage<D> {
    pub fn new(config: StorageConfig) -> Self {
        let plan = CascadePlan::default();
        let scheduler = SchedulerState::default();
        let schedule = FrameSchedule::new(&plan, config.update_policy, scheduler);
        let compactor = BufferCompactor::new(config.min_compaction_resolution);
        Self {
            config,
            plan,
            scheduler,
            schedule,
            offsets: CascadeOffsets::new(),
            allocator: FragmentAllocator::new(),
            textures: TextureManager::new(),
            compactor,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Switch policy; takes effect at the next `update_from_context`.
    pub fn set_update_policy(&mut self, policy: UpdatePolicy) {
        self.config.update_policy = policy;
    }

    pub fn plan(&self) -> &CascadePlan {
        &self.plan
    }

    pub fn frame_schedule(&self) -> &FrameSchedule {
        &self.schedule
    }

    pub fn offsets(&self) -> &CascadeOffsets {
        &self.offsets
    }

    pub fn fragment_buffer(&self) -> Option<&D::Buffer> {
        self.allocator.buffer()
    }

    pub fn storage_units(&self) -> u32 {
        self.allocator.storage_units()
    }

    pub fn fragment_capacity_words(&self) -> u64 {
        self.allocator.capacity_words()
    }

    pub fn reallocations(&self) -> u64 {
        self.allocator.reallocations()
    }

    pub fn textures(&self) -> Option<&CascadeTextures<D::Texture>> {
        self.textures.textures()
    }

    /// Texture sets created so far; grows whenever the layout changes.
    pub fn texture_recreations(&self) -> u64 {
        self.textures.recreations()
    }

    fn plan_for(&self, context: &StorageContext) -> CascadePlan {
        plan_cascades(context.resolution, self.config.base_resolution)
    }

    /// Start a frame: re-plan the cascades, advance the round robin and re-center
    /// every scheduled level on the focal point.
    pub fn update_from_context(&mut self, context: &StorageContext) {
        let plan = self.plan_for(context);
        if plan != self.plan {
            log::debug!(
                "ClipmapStorage: {} cascades of {:?}, {} mips",
                plan.cascade_count,
                plan.cascade_resolution,
                plan.mip_count
            );
            self.plan = plan;
        }

        self.scheduler = self.scheduler.advance(self.plan.cascade_count);
        self.schedule = FrameSchedule::new(&self.plan, self.config.update_policy, self.scheduler);
        self.offsets.update(context, &self.plan, &self.schedule);

        log::trace!(
            "ClipmapStorage: frame refreshes cascades {:?} ({:?})",
            self.schedule.refreshed_cascades(),
            self.schedule.policy
        );
    }

    /// Reserve `bit_count` bits per voxel for one attribute this frame.
    /// Returns the attribute's word offset inside a fragment.
    pub fn request_temp_storage(&mut self, bit_count: u32) -> u32 {
        self.allocator.request(bit_count)
    }

    /// Request storage for every attribute in order, recording each `buffer_offset`.
    pub fn request_attribute_storage(&mut self, attributes: &mut [VoxelAttribute]) {
        for attribute in attributes {
            attribute.buffer_offset = Some(self.request_temp_storage(attribute.bit_count));
        }
    }

    /// Fix this frame's fragment layout and resize the fragment buffer if needed.
    pub fn update_temp_storage(&mut self, device: &mut D, context: &StorageContext) {
        let plan = self.plan_for(context);
        self.allocator.finalize(device, &plan);
    }

    /// Make sure the cascade, mip chain and scratch textures match the current layout.
    pub fn update_texture(
        &mut self,
        device: &mut D,
        context: &StorageContext,
        format: D::Format,
        layout_size: u32,
    ) -> Option<&CascadeTextures<D::Texture>> {
        let plan = self.plan_for(context);
        self.textures.update(device, &plan, format, layout_size)
    }

    /// Append the voxelization passes for this frame to `volume.passes`.
    pub fn collect_voxelization_passes(&self, volume: &mut VolumeData, context: &StorageContext) -> usize {
        passes::collect_voxelization_passes(
            volume,
            context,
            &self.plan,
            &self.offsets,
            &self.schedule,
            self.allocator.effective_storage_units(),
        )
    }

    /// Compact this frame's fragments into the textures, rebuild scheduled mips and
    /// clear the buffer region written next.
    pub fn post_process<C>(
        &mut self,
        context: &StorageContext,
        draw: &mut C,
        volume: &VolumeData,
    ) -> CompactionReport
    where
        C: DrawContext<D::Buffer, D::Texture>,
    {
        let plan = self.plan_for(context);
        let schedule = FrameSchedule::new(&plan, self.config.update_policy, self.scheduler);
        let fragments = FragmentView {
            buffer: self.allocator.buffer(),
            storage_units: self.allocator.storage_units(),
            capacity_words: self.allocator.capacity_words(),
        };
        self.compactor.run(
            &plan,
            &schedule,
            fragments,
            self.textures.textures(),
            &volume.attributes,
            draw,
        )
    }

    /// Shader-facing sampling data for the levels as they stand after this frame.
    pub fn sampling_parameters(&self) -> SamplingParameters {
        SamplingParameters::from_offsets(&self.plan, &self.offsets)
    }

    /// Destroy the fragment buffer and every texture.
    pub fn release(&mut self, device: &mut D) {
        self.allocator.release(device);
        self.textures.release(device);
    }
}
