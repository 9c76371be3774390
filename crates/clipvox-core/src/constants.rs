//! Single source of truth for shared constants.
//! Values used by both Rust and WGSL are injected into shader preambles by clipvox-gpu.

/// Width of one fragment buffer storage unit in bits.
pub const WORD_BITS: u32 = 32;

/// Bytes per fragment buffer storage unit.
pub const WORD_BYTES: u64 = 4;

/// Default side length of the finest cascade (power of two).
pub const DEFAULT_BASE_RESOLUTION: u32 = 128;

/// Below this finest-cascade dimension, compaction is skipped for the frame.
pub const MIN_COMPACTION_RESOLUTION: u32 = 32;

/// Number of cascade levels the level tables are pre-sized for.
/// Tables grow past this when a plan needs more levels.
pub const INITIAL_LEVEL_CAPACITY: usize = 20;

/// Workgroup edge for the per-voxel compaction kernel (8x8x4 = 256 threads).
pub const COMPACT_WORKGROUP_XY: u32 = 8;

/// Workgroup depth for the per-voxel compaction kernel.
pub const COMPACT_WORKGROUP_Z: u32 = 4;

/// Workgroup edge for the per-column compaction kernel (8x1x8 = 64 threads).
pub const COLUMN_WORKGROUP_XZ: u32 = 8;

/// Workgroup edge for the mip downsample kernel (4x4x4 = 64 threads).
pub const DOWNSAMPLE_WORKGROUP: u32 = 4;

/// Maximum number of local sample slots a compaction kernel can address.
pub const MAX_LOCAL_SAMPLES: u32 = 16;
