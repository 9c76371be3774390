use glam::UVec3;

use crate::offsets::CascadeOffsets;
use crate::planner::CascadePlan;

/// Per-level sampling data as uploaded to the lighting shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LevelParams {
    /// UV offset in xyz, extent scale in w.
    pub offset_scale: [f32; 4],
    /// Texel shift of the level relative to its neighbor; w unused.
    pub mip_alignment: [i32; 4],
}

/// Everything a consumer needs to sample the clipmap this frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingParameters {
    pub cascade_count: u32,
    pub mip_count: u32,
    pub cascade_resolution: UVec3,
    pub levels: Vec<LevelParams>,
}

impl SamplingParameters {
    pub fn from_offsets(plan: &CascadePlan, offsets: &CascadeOffsets) -> Self {
        let levels = offsets
            .levels()
            .iter()
            .map(|level| LevelParams {
                offset_scale: level.offset_scale.to_array(),
                mip_alignment: level.mip_alignment.extend(0).to_array(),
            })
            .collect();
        Self {
            cascade_count: plan.cascade_count,
            mip_count: plan.mip_count,
            cascade_resolution: plan.cascade_resolution,
            levels,
        }
    }

    /// Level table as raw bytes, ready for a storage buffer upload.
    pub fn level_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_cascades;
    use crate::scheduler::{FrameSchedule, SchedulerState};
    use clipvox_core::types::{StorageContext, UpdatePolicy};
    use glam::Vec3;

    #[test]
    fn test_level_params_layout() {
        assert_eq!(std::mem::size_of::<LevelParams>(), 32);
    }

    #[test]
    fn test_parameters_cover_every_level() {
        let ctx = StorageContext::new(UVec3::splat(512), Vec3::splat(128.0), Vec3::ZERO);
        let plan = plan_cascades(ctx.resolution, 128);
        let schedule = FrameSchedule::new(
            &plan,
            UpdatePolicy::AllCascadesWideDispatch,
            SchedulerState::default().advance(plan.cascade_count),
        );
        let mut offsets = CascadeOffsets::new();
        offsets.update(&ctx, &plan, &schedule);

        let params = SamplingParameters::from_offsets(&plan, &offsets);
        assert_eq!(params.levels.len(), plan.level_count());
        assert_eq!(params.level_bytes().len(), plan.level_count() * 32);
        // origin-centered volume samples from the middle of every cascade
        assert_eq!(params.levels[0].offset_scale, [0.5, 0.5, 0.5, 4.0 / 128.0]);
    }
}
