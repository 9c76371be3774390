//! WGSL source composition. Pure string work, no device needed.

use clipvox_core::constants::{
    COLUMN_WORKGROUP_XZ, COMPACT_WORKGROUP_XY, COMPACT_WORKGROUP_Z, DOWNSAMPLE_WORKGROUP,
    MAX_LOCAL_SAMPLES,
};

const COMPACT_TEMPLATE: &str = include_str!("../../../shaders/clipmap/compact.wgsl");
const DOWNSAMPLE_TEMPLATE: &str = include_str!("../../../shaders/clipmap/downsample.wgsl");

/// Entry point of the per-voxel compaction kernel.
pub const COMPACT_VOXEL_ENTRY: &str = "compact_voxel";
/// Entry point of the per-column compaction kernel.
pub const COMPACT_COLUMN_ENTRY: &str = "compact_column";
pub const DOWNSAMPLE_ENTRY: &str = "downsample";

/// WGSL texel format name for a storage texture format, if the kernels can write it.
pub fn storage_format_name(format: wgpu::TextureFormat) -> Option<&'static str> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some("rgba8unorm"),
        wgpu::TextureFormat::Rgba8Snorm => Some("rgba8snorm"),
        wgpu::TextureFormat::Rgba16Float => Some("rgba16float"),
        wgpu::TextureFormat::Rgba32Float => Some("rgba32float"),
        wgpu::TextureFormat::R32Float => Some("r32float"),
        _ => None,
    }
}

fn constants_preamble() -> String {
    format!(
        "const MAX_LOCAL_SAMPLES: u32 = {}u;\n\
         const COMPACT_WORKGROUP_XY: u32 = {}u;\n\
         const COMPACT_WORKGROUP_Z: u32 = {}u;\n\
         const COLUMN_WORKGROUP_XZ: u32 = {}u;\n\
         const DOWNSAMPLE_WORKGROUP: u32 = {}u;\n",
        MAX_LOCAL_SAMPLES,
        COMPACT_WORKGROUP_XY,
        COMPACT_WORKGROUP_Z,
        COLUMN_WORKGROUP_XZ,
        DOWNSAMPLE_WORKGROUP,
    )
}

/// Full compaction module: preamble, attribute functions, then the template with
/// the generated fragments spliced in.
pub fn compose_compaction_source(
    format_name: &str,
    attribute_source: &str,
    read_samples: &str,
    resident_samples: &str,
) -> String {
    let preamble = constants_preamble();
    let body = COMPACT_TEMPLATE
        .replace("{{STORAGE_FORMAT}}", format_name)
        .replace("{{READ_SAMPLES}}", read_samples)
        .replace("{{RESIDENT_SAMPLES}}", resident_samples);
    format!("{preamble}\n{attribute_source}\n{body}")
}

pub fn compose_downsample_source(format_name: &str) -> String {
    let preamble = constants_preamble();
    let body = DOWNSAMPLE_TEMPLATE.replace("{{STORAGE_FORMAT}}", format_name);
    format!("{preamble}\n{body}")
}
