use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Per-frame view of the voxel volume handed to the storage engine.
///
/// Owned by the caller and never mutated by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageContext {
    /// Virtual resolution of the whole volume in voxels.
    pub resolution: UVec3,
    /// World-space size of the whole volume.
    pub extents: Vec3,
    /// Focal point the clipmap follows (usually the camera), in world units.
    pub translation: Vec3,
}

impl StorageContext {
    pub fn new(resolution: UVec3, extents: Vec3, translation: Vec3) -> Self {
        Self {
            resolution,
            extents,
            translation,
        }
    }

    /// World-space edge length of one virtual voxel. Zero for a degenerate resolution.
    pub fn real_voxel_size(&self) -> f32 {
        if self.resolution.x == 0 {
            return 0.0;
        }
        self.extents.x / self.resolution.x as f32
    }

    /// Focal point expressed in virtual voxel units.
    pub fn voxel_space_translation(&self) -> Vec3 {
        let voxel_size = self.real_voxel_size();
        if voxel_size <= 0.0 {
            return Vec3::ZERO;
        }
        self.translation / voxel_size
    }
}

/// How many cascades are refreshed each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UpdatePolicy {
    /// One cascade per frame, round robin.
    #[default]
    SingleCascade,
    /// Every cascade each frame, voxelized by one dispatch that iterates cascades itself.
    AllCascadesWideDispatch,
    /// Every cascade each frame, one pass set per cascade.
    AllCascadesMultiplePasses,
}

impl UpdatePolicy {
    /// Whether every cascade is refreshed each frame.
    pub fn updates_all(self) -> bool {
        !matches!(self, UpdatePolicy::SingleCascade)
    }
}

/// Whether an attribute is written to the output textures or only feeds other attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeRole {
    /// Final value, written straight to the cascade texture.
    Indirect,
    /// Intermediate value consumed by other attributes during compaction.
    Temp,
}

/// Storage contract of one voxel attribute (color, normal, opacity, ...).
///
/// The attribute's meaning is defined elsewhere; the storage engine only consumes
/// its bit width, sampling requirements and role, and assigns `buffer_offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelAttribute {
    /// Shader identifier prefix, e.g. `color` → `voxel_attr_color_read`.
    pub name: String,
    /// Packed bits this attribute needs per voxel.
    pub bit_count: u32,
    /// Word offset inside a fragment, assigned by `request_temp_storage`.
    pub buffer_offset: Option<u32>,
    /// Local sample slot the compaction kernel stores this attribute's sample in.
    pub local_sample_slot: u32,
    /// True when the value depends on neighbors in the same voxel column.
    pub requires_column_resolution: bool,
    pub role: AttributeRole,
}

impl VoxelAttribute {
    pub fn new(name: impl Into<String>, bit_count: u32, local_sample_slot: u32) -> Self {
        Self {
            name: name.into(),
            bit_count,
            buffer_offset: None,
            local_sample_slot,
            requires_column_resolution: false,
            role: AttributeRole::Indirect,
        }
    }

    pub fn with_role(mut self, role: AttributeRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_column_resolution(mut self) -> Self {
        self.requires_column_resolution = true;
        self
    }
}
