//! Generates the attribute-unpacking text spliced into the compaction kernel.
//!
//! The text calls per-attribute functions (`voxel_attr_<name>_read`,
//! `voxel_attr_<name>_write`) supplied by whoever defines the attributes. It is
//! handed to the shader system as an opaque parameter; nothing here parses it.
//!
//! Names the kernel template must provide: `fragment_base` (first word of the
//! voxel's fragment), `output_coord`, `local_samples` and `resident_samples`.

use std::fmt::Write;

use clipvox_core::constants::MAX_LOCAL_SAMPLES;
use clipvox_core::types::{AttributeRole, VoxelAttribute};

/// Both fragments for one attribute list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedFragments {
    /// Reads every attribute from the fragment buffer.
    pub read_samples: String,
    /// Used after the first slice of a column: Temp attributes reuse the sample
    /// resolved earlier in the column, Indirect attributes are read again.
    pub resident_samples: String,
}

impl GeneratedFragments {
    pub fn generate(attributes: &[VoxelAttribute]) -> Self {
        Self {
            read_samples: read_samples_fragment(attributes),
            resident_samples: resident_samples_fragment(attributes),
        }
    }
}

/// Attribute name reduced to a valid shader identifier.
pub fn shader_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

/// Attributes that can be emitted: storage assigned and a sample slot in range.
fn emittable(attributes: &[VoxelAttribute]) -> impl Iterator<Item = (&VoxelAttribute, u32)> {
    attributes.iter().filter_map(|attr| {
        let offset = attr.buffer_offset?;
        if attr.local_sample_slot >= MAX_LOCAL_SAMPLES {
            log::warn!(
                "codegen: attribute '{}' uses sample slot {} (max {})",
                attr.name,
                attr.local_sample_slot,
                MAX_LOCAL_SAMPLES - 1
            );
            return None;
        }
        Some((attr, offset))
    })
}

fn push_read(out: &mut String, attr: &VoxelAttribute, offset: u32) {
    let _ = writeln!(
        out,
        "    local_samples[{slot}u] = voxel_attr_{name}_read(fragment_base + {offset}u);",
        slot = attr.local_sample_slot,
        name = shader_identifier(&attr.name),
    );
}

fn push_write(out: &mut String, attr: &VoxelAttribute) {
    if attr.role == AttributeRole::Indirect {
        let _ = writeln!(
            out,
            "    voxel_attr_{name}_write(output_coord, local_samples[{slot}u]);",
            slot = attr.local_sample_slot,
            name = shader_identifier(&attr.name),
        );
    }
}

/// Text reading every attribute's packed bits into its local sample slot.
pub fn read_samples_fragment(attributes: &[VoxelAttribute]) -> String {
    let mut out = String::new();
    for (attr, offset) in emittable(attributes) {
        push_read(&mut out, attr, offset);
    }
    for (attr, _) in emittable(attributes) {
        push_write(&mut out, attr);
    }
    out
}

/// Text re-storing column-resident Temp samples without touching the buffer.
pub fn resident_samples_fragment(attributes: &[VoxelAttribute]) -> String {
    let mut out = String::new();
    for (attr, offset) in emittable(attributes) {
        match attr.role {
            AttributeRole::Temp => {
                let _ = writeln!(
                    out,
                    "    local_samples[{slot}u] = resident_samples[{slot}u];",
                    slot = attr.local_sample_slot,
                );
            }
            AttributeRole::Indirect => push_read(&mut out, attr, offset),
        }
    }
    for (attr, _) in emittable(attributes) {
        push_write(&mut out, attr);
    }
    out
}
