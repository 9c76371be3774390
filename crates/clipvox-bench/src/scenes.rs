use clipvox_core::types::{AttributeRole, VoxelAttribute};
use glam::{UVec3, Vec3};

/// How the focal point moves over a scene.
#[derive(Debug, Clone, Copy)]
pub enum CameraPath {
    Static(Vec3),
    /// Straight line from `from` to `to` over the whole run.
    Linear { from: Vec3, to: Vec3 },
    /// One full circle in the XZ plane.
    Orbit { center: Vec3, radius: f32 },
}

impl CameraPath {
    /// Focal point at `frame` of a run lasting `frames` frames.
    pub fn position(&self, frame: u32, frames: u32) -> Vec3 {
        let t = if frames > 1 {
            frame as f32 / (frames - 1) as f32
        } else {
            0.0
        };
        match *self {
            CameraPath::Static(p) => p,
            CameraPath::Linear { from, to } => from.lerp(to, t),
            CameraPath::Orbit { center, radius } => {
                let angle = t * std::f32::consts::TAU;
                center + Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
            }
        }
    }
}

/// Configuration for a single benchmark scene.
pub struct SceneConfig {
    pub name: &'static str,
    pub resolution: UVec3,
    /// World-space size of the volume.
    pub extents: Vec3,
    pub camera: CameraPath,
}

/// Return the standard suite of benchmark scenes, from a volume too small to
/// compact up to five cascades.
pub fn standard_scenes() -> Vec<SceneConfig> {
    vec![
        SceneConfig {
            name: "tiny-16",
            resolution: UVec3::splat(16),
            extents: Vec3::splat(16.0),
            camera: CameraPath::Static(Vec3::ZERO),
        },
        SceneConfig {
            name: "single-128",
            resolution: UVec3::splat(128),
            extents: Vec3::splat(64.0),
            camera: CameraPath::Static(Vec3::new(3.3, 1.0, -2.0)),
        },
        SceneConfig {
            name: "pan-512",
            resolution: UVec3::splat(512),
            extents: Vec3::splat(256.0),
            camera: CameraPath::Linear {
                from: Vec3::new(-64.0, 8.0, 0.0),
                to: Vec3::new(64.0, 8.0, 0.0),
            },
        },
        SceneConfig {
            name: "orbit-512x256",
            resolution: UVec3::new(512, 256, 512),
            extents: Vec3::new(256.0, 128.0, 256.0),
            camera: CameraPath::Orbit {
                center: Vec3::ZERO,
                radius: 48.0,
            },
        },
        SceneConfig {
            name: "flyover-2048",
            resolution: UVec3::splat(2048),
            extents: Vec3::splat(1024.0),
            camera: CameraPath::Linear {
                from: Vec3::new(-400.0, 32.0, -400.0),
                to: Vec3::new(400.0, 32.0, 400.0),
            },
        },
    ]
}

/// Attribute set every scene voxelizes: two output channels and one
/// intermediate value feeding them.
pub fn bench_attributes() -> Vec<VoxelAttribute> {
    vec![
        VoxelAttribute::new("albedo", 32, 0),
        VoxelAttribute::new("opacity", 8, 1).with_role(AttributeRole::Temp),
        VoxelAttribute::new("emission", 24, 2),
    ]
}

/// Output channels written side by side in the cascade texture.
pub fn layout_size(attributes: &[VoxelAttribute]) -> u32 {
    attributes
        .iter()
        .filter(|a| a.role == AttributeRole::Indirect)
        .count() as u32
}

/// WGSL for the `voxel_attr_*` functions of [`bench_attributes`].
pub const BENCH_ATTRIBUTE_WGSL: &str = r#"
fn voxel_attr_albedo_read(word: u32) -> vec4<f32> {
    return unpack4x8unorm(fragments[word]);
}
fn voxel_attr_albedo_write(coord: vec3<i32>, sample: vec4<f32>) {
    textureStore(output, channel_texel(coord, 0u), sample);
}
fn voxel_attr_opacity_read(word: u32) -> vec4<f32> {
    return vec4<f32>(f32(fragments[word] & 0xffu) / 255.0);
}
fn voxel_attr_emission_read(word: u32) -> vec4<f32> {
    let rgb = unpack4x8unorm(fragments[word]).rgb;
    return vec4<f32>(rgb * local_samples[1u].x, 1.0);
}
fn voxel_attr_emission_write(coord: vec3<i32>, sample: vec4<f32>) {
    textureStore(output, channel_texel(coord, 1u), sample);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_path_endpoints() {
        let path = CameraPath::Linear {
            from: Vec3::ZERO,
            to: Vec3::new(10.0, 0.0, 0.0),
        };
        assert_eq!(path.position(0, 11), Vec3::ZERO);
        assert_eq!(path.position(10, 11), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(path.position(5, 1), Vec3::ZERO);
    }

    #[test]
    fn test_orbit_keeps_radius() {
        let path = CameraPath::Orbit {
            center: Vec3::new(1.0, 2.0, 3.0),
            radius: 5.0,
        };
        for frame in 0..8 {
            let offset = path.position(frame, 8) - Vec3::new(1.0, 2.0, 3.0);
            assert!((offset.length() - 5.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bench_layout_counts_output_channels() {
        assert_eq!(layout_size(&bench_attributes()), 2);
    }
}
