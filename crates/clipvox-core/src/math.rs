use crate::constants::WORD_BITS;
use glam::{IVec3, UVec3, Vec3};

/// Quantize a voxel-space translation down to a multiple of `voxel_scale` per axis.
///
/// Uses floor so negative translations quantize in the same direction as positive ones.
/// Translations beyond the `i32` range clamp to the furthest representable multiple.
pub fn snap_translation(translation: Vec3, voxel_scale: i32) -> IVec3 {
    let scale = voxel_scale.max(1);
    let snap_axis = |value: f32| {
        let cell = (value / scale as f32).floor() as i64;
        let cell = cell.clamp((i32::MIN / scale) as i64, (i32::MAX / scale) as i64);
        cell as i32 * scale
    };
    IVec3::new(snap_axis(translation.x), snap_axis(translation.y), snap_axis(translation.z))
}

/// `floor(log2(value))`, with `floor_log2(0) == 0`.
pub fn floor_log2(value: u32) -> u32 {
    if value == 0 {
        return 0;
    }
    31 - value.leading_zeros()
}

/// Number of 32-bit words needed to hold `bits` bits.
pub fn words_for_bits(bits: u32) -> u32 {
    bits.div_ceil(WORD_BITS)
}

/// Total voxel count of a grid, widened so large volumes cannot overflow.
pub fn voxel_count(resolution: UVec3) -> u64 {
    resolution.x as u64 * resolution.y as u64 * resolution.z as u64
}

/// Largest component of a resolution.
pub fn max_dimension(resolution: UVec3) -> u32 {
    resolution.x.max(resolution.y).max(resolution.z)
}

/// Smallest component of a resolution.
pub fn min_dimension(resolution: UVec3) -> u32 {
    resolution.x.min(resolution.y).min(resolution.z)
}
