use std::ops::Range;

use clipvox_core::constants::MIN_COMPACTION_RESOLUTION;
use clipvox_core::types::{AttributeRole, UpdatePolicy, VoxelAttribute};
use glam::UVec3;

use crate::codegen::GeneratedFragments;
use crate::device::{
    CompactionDispatch, CompactionUniforms, Dispatch, DownsampleDispatch, DownsampleSource,
    DrawContext, KernelVariant,
};
use crate::planner::CascadePlan;
use crate::scheduler::FrameSchedule;
use crate::textures::{CascadeTextures, ResourceSpec};

/// Why a frame's compaction did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ResolutionTooSmall,
    NoFragmentBuffer,
    NoTextures,
    NoAttributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    Skipped(SkipReason),
    Compacted { variant: KernelVariant },
}

/// What one `post_process` call submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionReport {
    pub outcome: CompactionOutcome,
    pub compaction_dispatches: u32,
    pub downsample_dispatches: u32,
    pub cleared_words: Option<Range<u64>>,
}

impl CompactionReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            outcome: CompactionOutcome::Skipped(reason),
            compaction_dispatches: 0,
            downsample_dispatches: 0,
            cleared_words: None,
        }
    }
}

/// Fragment buffer state the compactor reads.
#[derive(Debug)]
pub struct FragmentView<'a, B> {
    pub buffer: Option<&'a B>,
    pub storage_units: u32,
    pub capacity_words: u64,
}

/// Turns the packed fragment buffer into cascade and mip textures.
pub struct BufferCompactor {
    min_resolution: u32,
    /// Generated text is rebuilt only when the attribute list changes.
    cached: Option<(Vec<VoxelAttribute>, GeneratedFragments)>,
}

impl Default for BufferCompactor {
    fn default() -> Self {
        Self::new(MIN_COMPACTION_RESOLUTION)
    }
}

impl BufferCompactor {
    pub fn new(min_resolution: u32) -> Self {
        Self {
            min_resolution,
            cached: None,
        }
    }

    fn fragments(&mut self, attributes: &[VoxelAttribute]) -> &GeneratedFragments {
        if self
            .cached
            .as_ref()
            .is_some_and(|(cached_attrs, _)| cached_attrs.as_slice() != attributes)
        {
            self.cached = None;
        }
        let (_, fragments) = self.cached.get_or_insert_with(|| {
            log::debug!(
                "BufferCompactor: regenerating unpack text for {} attributes",
                attributes.len()
            );
            (attributes.to_vec(), GeneratedFragments::generate(attributes))
        });
        fragments
    }

    /// Compact the cascades refreshed this frame, rebuild scheduled mips, then
    /// clear the buffer region the next accumulation writes.
    ///
    /// Transient states (tiny resolution, no buffer, no textures, no attributes)
    /// are silent no-ops.
    pub fn run<B, T, C>(
        &mut self,
        plan: &CascadePlan,
        schedule: &FrameSchedule,
        fragments: FragmentView<'_, B>,
        textures: Option<&CascadeTextures<T>>,
        attributes: &[VoxelAttribute],
        draw: &mut C,
    ) -> CompactionReport
    where
        C: DrawContext<B, T>,
    {
        if plan.max_dimension() < self.min_resolution {
            return CompactionReport::skipped(SkipReason::ResolutionTooSmall);
        }
        let Some(buffer) = fragments.buffer else {
            return CompactionReport::skipped(SkipReason::NoFragmentBuffer);
        };
        let Some(textures) = textures else {
            return CompactionReport::skipped(SkipReason::NoTextures);
        };
        if attributes.is_empty() {
            return CompactionReport::skipped(SkipReason::NoAttributes);
        }

        let (indirect, temp): (Vec<&VoxelAttribute>, Vec<&VoxelAttribute>) = attributes
            .iter()
            .partition(|a| a.role == AttributeRole::Indirect);
        let column_independent = !attributes.iter().any(|a| a.requires_column_resolution);
        let variant = if column_independent {
            KernelVariant::PerVoxel
        } else {
            KernelVariant::PerColumn
        };
        log::trace!(
            "BufferCompactor: {} indirect, {} temp attributes, {:?}",
            indirect.len(),
            temp.len(),
            variant
        );

        let res = plan.cascade_resolution;
        let thread_y = if column_independent { res.y } else { 1 };
        let layout_size = textures.layout_size;
        let storage_units = fragments.storage_units;
        let generated = self.fragments(attributes);

        let mut compaction_dispatches = 0;
        for batch in schedule.cascade_batches() {
            let cascade_count = batch.end - batch.start;
            let dispatch = Dispatch::Compact(CompactionDispatch {
                variant,
                thread_counts: UVec3::new(res.x, thread_y, res.z * cascade_count),
                read_samples: &generated.read_samples,
                resident_samples: &generated.resident_samples,
                uniforms: CompactionUniforms {
                    cascade_resolution: res.to_array(),
                    storage_units,
                    first_cascade: batch.start,
                    cascade_count,
                    layout_size,
                    _pad: 0,
                },
            });
            draw.dispatch(&dispatch, buffer, textures);
            compaction_dispatches += 1;
        }

        let downsample_dispatches = Self::downsample(plan, schedule, buffer, textures, draw);

        let cleared = match schedule.policy {
            UpdatePolicy::SingleCascade => plan.cascade_region(schedule.next_cascade(), storage_units),
            UpdatePolicy::AllCascadesWideDispatch | UpdatePolicy::AllCascadesMultiplePasses => {
                0..fragments.capacity_words
            }
        };
        let cleared = cleared.start.min(fragments.capacity_words)..cleared.end.min(fragments.capacity_words);
        if !cleared.is_empty() {
            draw.clear_buffer(buffer, cleared.clone());
        }

        CompactionReport {
            outcome: CompactionOutcome::Compacted { variant },
            compaction_dispatches,
            downsample_dispatches,
            cleared_words: Some(cleared),
        }
    }

    /// Box-filter the coarsest cascade down the mip chain for every scheduled mip level.
    fn downsample<B, T, C>(
        plan: &CascadePlan,
        schedule: &FrameSchedule,
        buffer: &B,
        textures: &CascadeTextures<T>,
        draw: &mut C,
    ) -> u32
    where
        C: DrawContext<B, T>,
    {
        if textures.mip_chain.is_none() {
            return 0;
        }
        let spec = ResourceSpec::new(plan, (), textures.layout_size);
        let coarsest = plan.cascade_count - 1;
        let mut count = 0;
        for mip in 0..plan.mip_count.min(textures.scratch.len() as u32) {
            if !schedule.should_update((plan.cascade_count + mip) as usize) {
                continue;
            }
            let (source, source_origin) = if mip == 0 {
                let slab = UVec3::new(0, coarsest * plan.cascade_resolution.y, 0);
                (DownsampleSource::Cascade(coarsest), slab)
            } else {
                (DownsampleSource::MipLevel(mip - 1), UVec3::ZERO)
            };
            let dispatch = Dispatch::Downsample(DownsampleDispatch {
                source,
                source_origin,
                target_level: mip,
                thread_counts: spec.mip_level_size(mip),
            });
            draw.dispatch(&dispatch, buffer, textures);
            count += 1;
        }
        count
    }
}
