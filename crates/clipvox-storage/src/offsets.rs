use clipvox_core::constants::INITIAL_LEVEL_CAPACITY;
use clipvox_core::math::snap_translation;
use clipvox_core::types::StorageContext;
use glam::{IVec3, Vec3, Vec4};

use crate::planner::CascadePlan;
use crate::scheduler::FrameSchedule;

/// Placement of one clipmap level around the focal point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelOffset {
    /// Focal point snapped to this level's voxel size, in virtual voxels.
    pub translation_voxels: IVec3,
    /// World-space offset applied before sampling this level.
    pub snapped_offset: Vec3,
    /// `(uv offset, uv scale)` for sampling this level in shader space.
    pub offset_scale: Vec4,
    /// Integer shift, in this level's voxels, aligning it with the next coarser level.
    pub mip_alignment: IVec3,
}

/// Per-level offsets, kept across frames so levels that are not refreshed
/// stay consistent with the stale data they still hold.
#[derive(Debug, Clone)]
pub struct CascadeOffsets {
    levels: Vec<LevelOffset>,
}

impl Default for CascadeOffsets {
    fn default() -> Self {
        Self::new()
    }
}

impl CascadeOffsets {
    pub fn new() -> Self {
        Self {
            levels: Vec::with_capacity(INITIAL_LEVEL_CAPACITY),
        }
    }

    pub fn levels(&self) -> &[LevelOffset] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> Option<&LevelOffset> {
        self.levels.get(index)
    }

    /// Re-center every level scheduled for this frame on the context's focal point.
    pub fn update(&mut self, context: &StorageContext, plan: &CascadePlan, schedule: &FrameSchedule) {
        let level_count = plan.level_count();
        if self.levels.len() != level_count {
            log::debug!(
                "CascadeOffsets: resizing level table {} -> {}",
                self.levels.len(),
                level_count
            );
            self.levels.resize(level_count, LevelOffset::default());
        }

        if plan.is_degenerate() || context.extents.min_element() <= 0.0 {
            return;
        }

        self.snap_levels(context, schedule);
        self.align_with_stale_neighbors(schedule);
        self.update_offset_scales(context, plan, schedule);
    }

    /// Snap refreshed levels and align neighbors that refresh together.
    fn snap_levels(&mut self, context: &StorageContext, schedule: &FrameSchedule) {
        let translation = context.voxel_space_translation();
        let voxel_size = context.real_voxel_size();

        let mut voxel_scale = 1i32;
        let mut previous_scale = 1i32;
        for i in 0..self.levels.len() {
            if schedule.should_update(i) {
                let snapped = snap_translation(translation, voxel_scale);
                self.levels[i].translation_voxels = snapped;
                self.levels[i].snapped_offset = -snapped.as_vec3() * voxel_size;

                // Finer neighbor refreshed in the same frame: align it against this
                // level using the scale carried over from the previous iteration.
                if i > 0 && schedule.should_update(i - 1) {
                    let finer = self.levels[i - 1].translation_voxels;
                    self.levels[i - 1].mip_alignment = finer.saturating_sub(snapped) / previous_scale;
                }
            }
            previous_scale = voxel_scale;
            voxel_scale = voxel_scale.saturating_mul(2);
        }
    }

    /// A refreshed level whose coarser neighbor kept last frame's translation is
    /// aligned against the stored translation, divided by its own scale.
    fn align_with_stale_neighbors(&mut self, schedule: &FrameSchedule) {
        let count = self.levels.len();
        for i in 0..count.saturating_sub(1) {
            if schedule.should_update(i) && !schedule.should_update(i + 1) {
                let voxel_scale = 1i32.checked_shl(i as u32).unwrap_or(i32::MAX);
                let current = self.levels[i].translation_voxels;
                let coarser = self.levels[i + 1].translation_voxels;
                self.levels[i].mip_alignment = current.saturating_sub(coarser) / voxel_scale;
            }
        }
        if let Some(last) = self.levels.last_mut() {
            last.mip_alignment = IVec3::ZERO;
        }
    }

    fn update_offset_scales(
        &mut self,
        context: &StorageContext,
        plan: &CascadePlan,
        schedule: &FrameSchedule,
    ) {
        for (i, level) in self.levels.iter_mut().enumerate() {
            if !schedule.should_update(i) {
                continue;
            }
            let extent_scale = plan.extent_scale(i);
            let offset = level.snapped_offset * extent_scale / context.extents + 0.5;
            level.offset_scale = offset.extend(extent_scale / context.extents.x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_cascades;
    use crate::scheduler::SchedulerState;
    use clipvox_core::types::UpdatePolicy;
    use glam::UVec3;

    fn context(translation: Vec3) -> StorageContext {
        // 512 voxels over 128 world units → voxel size 0.25
        StorageContext::new(UVec3::splat(512), Vec3::splat(128.0), translation)
    }

    fn schedule_for(plan: &CascadePlan, policy: UpdatePolicy, frames: u32) -> FrameSchedule {
        let mut state = SchedulerState::default();
        for _ in 0..frames {
            state = state.advance(plan.cascade_count);
        }
        FrameSchedule::new(plan, policy, state)
    }

    #[test]
    fn test_levels_sized_to_plan() {
        let ctx = context(Vec3::ZERO);
        let plan = plan_cascades(ctx.resolution, 128);
        let schedule = schedule_for(&plan, UpdatePolicy::AllCascadesWideDispatch, 1);
        let mut offsets = CascadeOffsets::new();
        offsets.update(&ctx, &plan, &schedule);
        assert_eq!(offsets.levels().len(), 10);
        assert!(offsets.level(9).is_some());
        assert!(offsets.level(10).is_none());
    }

    #[test]
    fn test_level_table_grows_past_twenty_levels() {
        // 2^20 voxels over 2^18 world units → voxel size 0.25, 1.2e6 voxels out
        let ctx = StorageContext::new(
            UVec3::splat(1 << 20),
            Vec3::splat((1 << 18) as f32),
            Vec3::new(300_000.0, 0.0, 0.0),
        );
        let plan = plan_cascades(ctx.resolution, 128);
        assert_eq!(plan.cascade_count, 14);
        assert_eq!(plan.mip_count, 7);

        let schedule = schedule_for(&plan, UpdatePolicy::AllCascadesWideDispatch, 1);
        let mut offsets = CascadeOffsets::new();
        offsets.update(&ctx, &plan, &schedule);

        assert_eq!(offsets.levels().len(), 21);
        assert!(offsets.level(21).is_none());
        for (i, level) in offsets.levels().iter().enumerate() {
            assert_eq!(level.translation_voxels.x % (1 << i), 0, "level {i} not snapped");
        }

        let last = offsets.level(20).expect("last level");
        assert_eq!(last.translation_voxels, IVec3::new(1 << 20, 0, 0));
        assert_eq!(last.mip_alignment, IVec3::ZERO);
        // level 17 sits at 9 * 2^17, level 18 at 4 * 2^18
        assert_eq!(offsets.levels()[17].mip_alignment, IVec3::new(1, 0, 0));
        assert_eq!(offsets.levels()[0].translation_voxels.x, 1_200_000);
    }

    #[test]
    fn test_snapping_per_level() {
        // 10.3 world units → 41.2 voxels
        let ctx = context(Vec3::new(10.3, -10.3, 0.0));
        let plan = plan_cascades(ctx.resolution, 128);
        let schedule = schedule_for(&plan, UpdatePolicy::AllCascadesMultiplePasses, 1);
        let mut offsets = CascadeOffsets::new();
        offsets.update(&ctx, &plan, &schedule);

        assert_eq!(offsets.levels()[0].translation_voxels, IVec3::new(41, -42, 0));
        assert_eq!(offsets.levels()[1].translation_voxels, IVec3::new(40, -42, 0));
        assert_eq!(offsets.levels()[2].translation_voxels, IVec3::new(40, -44, 0));
        assert_eq!(offsets.levels()[3].translation_voxels, IVec3::new(40, -48, 0));

        let expected_world = -Vec3::new(41.0, -42.0, 0.0) * 0.25;
        assert!((offsets.levels()[0].snapped_offset - expected_world).length() < 1e-5);
    }

    #[test]
    fn test_sub_voxel_motion_does_not_move_levels() {
        let plan = plan_cascades(UVec3::splat(512), 128);
        let schedule = schedule_for(&plan, UpdatePolicy::AllCascadesWideDispatch, 1);
        let mut a = CascadeOffsets::new();
        let mut b = CascadeOffsets::new();
        a.update(&context(Vec3::new(1.01, 0.0, 0.0)), &plan, &schedule);
        b.update(&context(Vec3::new(1.2, 0.0, 0.0)), &plan, &schedule);
        // 4.04 and 4.8 voxels both snap to 4 at level 0
        assert_eq!(a.levels()[0].translation_voxels, b.levels()[0].translation_voxels);
        assert_eq!(a.levels()[0].offset_scale, b.levels()[0].offset_scale);
    }

    #[test]
    fn test_offset_scale_at_origin() {
        let ctx = context(Vec3::ZERO);
        let plan = plan_cascades(ctx.resolution, 128);
        let schedule = schedule_for(&plan, UpdatePolicy::AllCascadesWideDispatch, 1);
        let mut offsets = CascadeOffsets::new();
        offsets.update(&ctx, &plan, &schedule);

        let levels = offsets.levels();
        assert_eq!(levels[0].offset_scale, Vec4::new(0.5, 0.5, 0.5, 4.0 / 128.0));
        assert_eq!(levels[1].offset_scale, Vec4::new(0.5, 0.5, 0.5, 2.0 / 128.0));
        assert_eq!(levels[2].offset_scale, Vec4::new(0.5, 0.5, 0.5, 1.0 / 128.0));
        assert_eq!(levels[5].offset_scale.w, 1.0 / 128.0);
    }

    #[test]
    fn test_offset_scale_with_translation() {
        let ctx = context(Vec3::new(8.0, 0.0, 0.0));
        let plan = plan_cascades(ctx.resolution, 128);
        let schedule = schedule_for(&plan, UpdatePolicy::AllCascadesWideDispatch, 1);
        let mut offsets = CascadeOffsets::new();
        offsets.update(&ctx, &plan, &schedule);

        // level 2: snapped offset -8 world units, extent scale 1
        let level = offsets.levels()[2];
        assert!((level.offset_scale.x - (0.5 - 8.0 / 128.0)).abs() < 1e-6);
        // level 0: extent scale 4
        let level = offsets.levels()[0];
        assert!((level.offset_scale.x - (0.5 - 32.0 / 128.0)).abs() < 1e-6);
    }

    #[test]
    fn test_stale_levels_keep_previous_offsets() {
        let plan = plan_cascades(UVec3::splat(512), 128);
        let mut state = SchedulerState::default().advance(plan.cascade_count);
        let mut offsets = CascadeOffsets::new();

        // frame 1 refreshes cascade 0 at the origin
        let schedule = FrameSchedule::new(&plan, UpdatePolicy::SingleCascade, state);
        offsets.update(&context(Vec3::ZERO), &plan, &schedule);
        let before = offsets.levels()[0];

        // frame 2 refreshes cascade 1 after the focal point moved
        state = state.advance(plan.cascade_count);
        let schedule = FrameSchedule::new(&plan, UpdatePolicy::SingleCascade, state);
        offsets.update(&context(Vec3::new(20.0, 0.0, 0.0)), &plan, &schedule);

        assert_eq!(offsets.levels()[0], before);
        assert_eq!(offsets.levels()[1].translation_voxels, IVec3::new(80, 0, 0));
    }

    #[test]
    fn test_mip_alignment_when_neighbors_refresh_together() {
        // 41.2 voxels: level 0 snaps to 41, level 1 to 40, level 2 to 40
        let ctx = context(Vec3::new(10.3, 0.0, 0.0));
        let plan = plan_cascades(ctx.resolution, 128);
        let schedule = schedule_for(&plan, UpdatePolicy::AllCascadesMultiplePasses, 1);
        let mut offsets = CascadeOffsets::new();
        offsets.update(&ctx, &plan, &schedule);

        assert_eq!(offsets.levels()[0].mip_alignment, IVec3::new(1, 0, 0));
        assert_eq!(offsets.levels()[1].mip_alignment, IVec3::ZERO);
        let last = offsets.levels().len() - 1;
        assert_eq!(offsets.levels()[last].mip_alignment, IVec3::ZERO);
    }

    #[test]
    fn test_mip_alignment_against_stale_neighbor() {
        let plan = plan_cascades(UVec3::splat(512), 128);
        let mut offsets = CascadeOffsets::new();

        // frame 1: everything at the origin
        let all = schedule_for(&plan, UpdatePolicy::AllCascadesWideDispatch, 1);
        offsets.update(&context(Vec3::ZERO), &plan, &all);

        // frame 2 under round robin: only cascade 0 refreshes, 12 voxels to the right
        let single = schedule_for(&plan, UpdatePolicy::SingleCascade, 1);
        offsets.update(&context(Vec3::new(3.0, 0.0, 0.0)), &plan, &single);

        assert_eq!(offsets.levels()[0].translation_voxels, IVec3::new(12, 0, 0));
        assert_eq!(offsets.levels()[1].translation_voxels, IVec3::ZERO);
        assert_eq!(offsets.levels()[0].mip_alignment, IVec3::new(12, 0, 0));
    }

    #[test]
    fn test_degenerate_context_leaves_offsets_untouched() {
        let ctx = StorageContext::new(UVec3::ZERO, Vec3::ZERO, Vec3::splat(4.0));
        let plan = plan_cascades(ctx.resolution, 128);
        let schedule = schedule_for(&plan, UpdatePolicy::SingleCascade, 1);
        let mut offsets = CascadeOffsets::new();
        offsets.update(&ctx, &plan, &schedule);
        assert_eq!(offsets.levels(), &[LevelOffset::default()]);
    }
}
