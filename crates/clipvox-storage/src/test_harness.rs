//! In-memory device and draw context that record every call, for unit tests.

use std::collections::HashMap;
use std::ops::Range;

use glam::UVec3;

use crate::device::{
    CompactionUniforms, Dispatch, DownsampleDispatch, DrawContext, KernelVariant, TextureDesc,
    VoxelDevice,
};
use crate::textures::CascadeTextures;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestFormat {
    Rgba8,
    Rgba16Float,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    CreateBuffer { id: u32, words: u64 },
    DestroyBuffer(u32),
    CreateTexture { id: u32, label: &'static str, size: UVec3 },
    DestroyTexture(u32),
}

/// Hands out sequential ids and logs every resource call.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    next_id: u32,
    events: Vec<DeviceEvent>,
    labels: HashMap<u32, &'static str>,
}

impl RecordingDevice {
    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    fn count(&self, pred: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn buffers_created(&self) -> usize {
        self.count(|e| matches!(e, DeviceEvent::CreateBuffer { .. }))
    }

    pub fn buffers_destroyed(&self) -> usize {
        self.count(|e| matches!(e, DeviceEvent::DestroyBuffer(_)))
    }

    pub fn textures_created(&self) -> usize {
        self.count(|e| matches!(e, DeviceEvent::CreateTexture { .. }))
    }

    pub fn textures_destroyed(&self) -> usize {
        self.count(|e| matches!(e, DeviceEvent::DestroyTexture(_)))
    }

    /// Number of complete texture sets torn down, counted by their cascade texture.
    pub fn texture_sets_destroyed(&self) -> usize {
        self.count(|e| match e {
            DeviceEvent::DestroyTexture(id) => self.labels.get(id) == Some(&"clipmap-cascades"),
            _ => false,
        })
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl VoxelDevice for RecordingDevice {
    type Buffer = u32;
    type Texture = u32;
    type Format = TestFormat;

    fn create_fragment_buffer(&mut self, word_count: u64) -> u32 {
        let id = self.next();
        self.events.push(DeviceEvent::CreateBuffer {
            id,
            words: word_count,
        });
        id
    }

    fn destroy_buffer(&mut self, buffer: u32) {
        self.events.push(DeviceEvent::DestroyBuffer(buffer));
    }

    fn create_texture(&mut self, desc: &TextureDesc<TestFormat>) -> u32 {
        let id = self.next();
        self.labels.insert(id, desc.label);
        self.events.push(DeviceEvent::CreateTexture {
            id,
            label: desc.label,
            size: desc.size,
        });
        id
    }

    fn destroy_texture(&mut self, texture: u32) {
        self.events.push(DeviceEvent::DestroyTexture(texture));
    }
}

/// A compaction dispatch with its generated text copied out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCompaction {
    pub variant: KernelVariant,
    pub thread_counts: UVec3,
    pub read_samples: String,
    pub resident_samples: String,
    pub uniforms: CompactionUniforms,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCall {
    Compact(RecordedCompaction),
    Downsample(DownsampleDispatch),
    Clear { buffer: u32, words: Range<u64> },
}

/// Spy on the submission side: nothing runs, every call is kept in order.
#[derive(Debug, Default)]
pub struct RecordingDraw {
    calls: Vec<DrawCall>,
}

impl RecordingDraw {
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn compactions(&self) -> Vec<RecordedCompaction> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DrawCall::Compact(rec) => Some(rec.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clears(&self) -> Vec<Range<u64>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DrawCall::Clear { words, .. } => Some(words.clone()),
                _ => None,
            })
            .collect()
    }
}

impl DrawContext<u32, u32> for RecordingDraw {
    fn dispatch(&mut self, dispatch: &Dispatch<'_>, _fragments: &u32, _textures: &CascadeTextures<u32>) {
        let call = match dispatch {
            Dispatch::Compact(c) => DrawCall::Compact(RecordedCompaction {
                variant: c.variant,
                thread_counts: c.thread_counts,
                read_samples: c.read_samples.to_string(),
                resident_samples: c.resident_samples.to_string(),
                uniforms: c.uniforms,
            }),
            Dispatch::Downsample(d) => DrawCall::Downsample(*d),
        };
        self.calls.push(call);
    }

    fn clear_buffer(&mut self, buffer: &u32, words: Range<u64>) {
        self.calls.push(DrawCall::Clear {
            buffer: *buffer,
            words,
        });
    }
}
