use std::ops::Range;

use clipvox_core::types::{StorageContext, UpdatePolicy, VoxelAttribute};
use glam::{Mat4, Vec3};

use crate::offsets::CascadeOffsets;
use crate::planner::CascadePlan;
use crate::scheduler::FrameSchedule;

/// One attribute voxelized into one or more cascades by the external rasterizer.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelizationPass {
    /// Tag the rasterizer branches on (wide passes iterate cascades themselves).
    pub policy: UpdatePolicy,
    /// Cascades this pass writes.
    pub cascades: Range<u32>,
    /// World → clip transform per cascade in `cascades`, in order.
    pub view_projections: Vec<Mat4>,
    /// Word range of the fragment buffer the pass writes.
    pub fragment_region: Range<u64>,
    /// Words per voxel of the fragment layout.
    pub storage_units: u32,
    pub attribute: String,
    pub local_sample_slot: u32,
    /// Word offset of the attribute inside a fragment.
    pub buffer_offset: u32,
}

/// The voxel volume as seen by the storage engine: its attributes and the pass list
/// the external rasterizer consumes.
#[derive(Debug, Clone, Default)]
pub struct VolumeData {
    pub attributes: Vec<VoxelAttribute>,
    pub passes: Vec<VoxelizationPass>,
}

impl VolumeData {
    pub fn new(attributes: Vec<VoxelAttribute>) -> Self {
        Self {
            attributes,
            passes: Vec::new(),
        }
    }
}

/// World → clip transform voxelizing into `cascade`.
///
/// Maps the cascade's snapped region onto `[-1, 1]^3`, matching the UV transform
/// in the level's offset-scale vector.
pub fn cascade_view_projection(
    context: &StorageContext,
    plan: &CascadePlan,
    offsets: &CascadeOffsets,
    cascade: u32,
) -> Option<Mat4> {
    let level = offsets.level(cascade as usize)?;
    if context.extents.min_element() <= 0.0 {
        return None;
    }
    let scale = Vec3::splat(2.0 * plan.extent_scale(cascade as usize)) / context.extents;
    Some(Mat4::from_scale(scale) * Mat4::from_translation(level.snapped_offset))
}

/// Append this frame's voxelization passes to `volume.passes`.
///
/// One pass per attribute per cascade batch; the batches come from the schedule
/// (single cascade, one wide batch, or one batch per cascade).
pub fn collect_voxelization_passes(
    volume: &mut VolumeData,
    context: &StorageContext,
    plan: &CascadePlan,
    offsets: &CascadeOffsets,
    schedule: &FrameSchedule,
    storage_units: u32,
) -> usize {
    if plan.is_degenerate() || volume.attributes.is_empty() {
        return 0;
    }

    let before = volume.passes.len();
    for batch in schedule.cascade_batches() {
        let view_projections: Option<Vec<Mat4>> = batch
            .clone()
            .map(|c| cascade_view_projection(context, plan, offsets, c))
            .collect();
        let Some(view_projections) = view_projections else {
            log::debug!("collect_voxelization_passes: no offsets for cascades {batch:?}");
            continue;
        };

        let fragment_region = plan.cascade_region(batch.start, storage_units).start
            ..plan.cascade_region(batch.end - 1, storage_units).end;

        for attribute in &volume.attributes {
            let Some(buffer_offset) = attribute.buffer_offset else {
                log::debug!(
                    "collect_voxelization_passes: attribute '{}' has no storage this frame",
                    attribute.name
                );
                continue;
            };
            volume.passes.push(VoxelizationPass {
                policy: schedule.policy,
                cascades: batch.clone(),
                view_projections: view_projections.clone(),
                fragment_region: fragment_region.clone(),
                storage_units,
                attribute: attribute.name.clone(),
                local_sample_slot: attribute.local_sample_slot,
                buffer_offset,
            });
        }
    }

    let added = volume.passes.len() - before;
    log::trace!(
        "collect_voxelization_passes: {} passes ({:?}, cascade {})",
        added,
        schedule.policy,
        schedule.current_cascade
    );
    added
}
