use clipvox_core::math::{floor_log2, max_dimension, min_dimension, voxel_count};
use glam::UVec3;

/// Cascade and mip layout derived from the virtual resolution for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadePlan {
    /// Number of clipmap cascades (always at least 1).
    pub cascade_count: u32,
    /// Resolution shared by every cascade.
    pub cascade_resolution: UVec3,
    /// Number of box-filtered mip levels appended after the cascades.
    pub mip_count: u32,
}

impl Default for CascadePlan {
    fn default() -> Self {
        Self {
            cascade_count: 1,
            cascade_resolution: UVec3::ZERO,
            mip_count: 0,
        }
    }
}

impl CascadePlan {
    /// Cascades plus mip levels; the length of every per-level table.
    pub fn level_count(&self) -> usize {
        (self.cascade_count + self.mip_count) as usize
    }

    pub fn voxels_per_cascade(&self) -> u64 {
        voxel_count(self.cascade_resolution)
    }

    pub fn total_voxels(&self) -> u64 {
        self.voxels_per_cascade() * self.cascade_count as u64
    }

    /// A plan with no voxels to store.
    pub fn is_degenerate(&self) -> bool {
        self.voxels_per_cascade() == 0
    }

    /// Largest dimension of the cascade grid.
    pub fn max_dimension(&self) -> u32 {
        max_dimension(self.cascade_resolution)
    }

    /// Extent divisor of a level: `2^(cascade_count-1)` for cascade 0, halving
    /// per cascade and staying at 1 for the mip levels.
    pub fn extent_scale(&self, level: usize) -> f32 {
        let coarsest = self.cascade_count.saturating_sub(1) as usize;
        let steps = coarsest.saturating_sub(level.min(coarsest));
        2f32.powi(steps as i32)
    }

    /// Word range of one cascade inside the fragment buffer.
    pub fn cascade_region(&self, cascade: u32, storage_units: u32) -> std::ops::Range<u64> {
        let words = self.voxels_per_cascade() * storage_units as u64;
        let start = words * cascade as u64;
        start..start + words
    }
}

/// Derive cascade and mip counts from the virtual resolution.
///
/// `base_resolution` is the target side length of one cascade.
pub fn plan_cascades(resolution: UVec3, base_resolution: u32) -> CascadePlan {
    let largest = max_dimension(resolution);
    if largest == 0 || base_resolution == 0 {
        return CascadePlan::default();
    }

    // floor(log2(largest / min(largest, base))) + 1
    let ratio = largest / largest.min(base_resolution);
    let cascade_count = floor_log2(ratio) + 1;

    let cascade_resolution = resolution / (1u32 << (cascade_count - 1));
    let mip_count = floor_log2(min_dimension(cascade_resolution));

    CascadePlan {
        cascade_count,
        cascade_resolution,
        mip_count,
    }
}
