use clipvox_core::constants::WORD_BITS;
use clipvox_core::math::words_for_bits;

use crate::device::VoxelDevice;
use crate::planner::CascadePlan;

/// Per-frame bump allocator for packed voxel attributes, plus the fragment buffer
/// sized from its result.
///
/// Protocol per frame: `request` once per attribute, then `finalize` once.
/// Single-threaded; the counter is plain state owned by the storage engine.
pub struct FragmentAllocator<B> {
    /// Bits handed out so far this frame, always a multiple of 32 and never more
    /// than `u32::MAX` words.
    requested_bits: u64,
    /// Words per voxel fixed by the last `finalize`.
    storage_units: u32,
    buffer: Option<B>,
    /// Size of `buffer` in words (0 when there is none).
    capacity_words: u64,
    /// Buffer reallocations so far, for diagnostics.
    reallocations: u64,
}

impl<B> Default for FragmentAllocator<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> FragmentAllocator<B> {
    pub fn new() -> Self {
        Self {
            requested_bits: 0,
            storage_units: 0,
            buffer: None,
            capacity_words: 0,
            reallocations: 0,
        }
    }

    /// Reserve `bit_count` bits per voxel, rounded up to whole words.
    /// Returns the word offset of the reservation within a fragment.
    ///
    /// A request that would push the layout past `u32::MAX` words is dropped with a
    /// warning and leaves the counter unchanged.
    pub fn request(&mut self, bit_count: u32) -> u32 {
        let word_offset = self.requested_words();
        let reserved = words_for_bits(bit_count) as u64 * WORD_BITS as u64;
        match self
            .requested_bits
            .checked_add(reserved)
            .filter(|bits| bits / WORD_BITS as u64 <= u32::MAX as u64)
        {
            Some(bits) => self.requested_bits = bits,
            None => log::warn!(
                "FragmentAllocator: request of {} bits at word {} overflows the fragment layout, ignored",
                bit_count,
                word_offset,
            ),
        }
        word_offset
    }

    fn requested_words(&self) -> u32 {
        u32::try_from(self.requested_bits / WORD_BITS as u64).unwrap_or(u32::MAX)
    }

    /// Words per voxel the fragment layout uses this frame.
    ///
    /// Once requests have been made this frame their total wins; otherwise the
    /// layout fixed by the last `finalize` still applies.
    pub fn effective_storage_units(&self) -> u32 {
        if self.requested_bits > 0 {
            self.requested_words()
        } else {
            self.storage_units
        }
    }

    pub fn storage_units(&self) -> u32 {
        self.storage_units
    }

    pub fn buffer(&self) -> Option<&B> {
        self.buffer.as_ref()
    }

    pub fn capacity_words(&self) -> u64 {
        self.capacity_words
    }

    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Fix this frame's layout, reset the counter, and resize the buffer if needed.
    ///
    /// The buffer is recreated only when its required size changes; the old one is
    /// destroyed before the new one exists. A zero size leaves no buffer at all.
    pub fn finalize<D>(&mut self, device: &mut D, plan: &CascadePlan)
    where
        D: VoxelDevice<Buffer = B>,
    {
        self.storage_units = self.requested_words();
        self.requested_bits = 0;

        let total_fragments = plan.total_voxels();
        let required_words = self.storage_units as u64 * total_fragments;
        if required_words == self.capacity_words && (self.buffer.is_some() || required_words == 0) {
            return;
        }

        if let Some(old) = self.buffer.take() {
            device.destroy_buffer(old);
        }
        self.capacity_words = 0;

        if required_words == 0 {
            log::debug!("FragmentAllocator: nothing to store, fragment buffer released");
            return;
        }

        log::info!(
            "FragmentAllocator: {} words/voxel x {} fragments = {} MB",
            self.storage_units,
            total_fragments,
            required_words * 4 / (1024 * 1024),
        );
        self.buffer = Some(device.create_fragment_buffer(required_words));
        self.capacity_words = required_words;
        self.reallocations += 1;
    }

    /// Destroy the buffer, if any.
    pub fn release<D>(&mut self, device: &mut D)
    where
        D: VoxelDevice<Buffer = B>,
    {
        if let Some(old) = self.buffer.take() {
            device.destroy_buffer(old);
        }
        self.capacity_words = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_cascades;
    use crate::test_harness::{DeviceEvent, RecordingDevice};
    use glam::UVec3;

    #[test]
    fn test_word_aligned_offsets() {
        let mut alloc = FragmentAllocator::<u32>::new();
        assert_eq!(alloc.request(40), 0);
        // 40 bits round up to two words, so the next attribute starts at word 2
        assert_eq!(alloc.request(10), 2);
        assert_eq!(alloc.effective_storage_units(), 3);
    }

    #[test]
    fn test_huge_requests_do_not_overflow() {
        let mut alloc = FragmentAllocator::<u32>::new();
        assert_eq!(alloc.request(u32::MAX - 10), 0);
        assert_eq!(alloc.effective_storage_units(), 1 << 27);
        assert_eq!(alloc.request(1 << 31), 1 << 27);
        assert_eq!(alloc.effective_storage_units(), (1 << 27) + (1 << 26));
    }

    #[test]
    fn test_request_past_word_limit_is_ignored() {
        let mut alloc = FragmentAllocator::<u32>::new();
        alloc.request(8);
        for i in 0..63u32 {
            assert_eq!(alloc.request(1 << 31), 1 + i * (1 << 26));
        }
        let full = 1 + 63 * (1 << 26);
        assert_eq!(alloc.effective_storage_units(), full);

        // 2^26 more words would exceed u32::MAX; counter stays put
        assert_eq!(alloc.request(1 << 31), full);
        assert_eq!(alloc.effective_storage_units(), full);

        // smaller requests still fit
        assert_eq!(alloc.request(32), full);
        assert_eq!(alloc.effective_storage_units(), full + 1);
    }

    #[test]
    fn test_finalize_sets_units_and_resets_counter() {
        let mut device = RecordingDevice::default();
        let plan = plan_cascades(UVec3::splat(64), 64);
        let mut alloc = FragmentAllocator::new();
        alloc.request(40);
        alloc.request(10);
        alloc.finalize(&mut device, &plan);

        assert_eq!(alloc.storage_units(), 3);
        assert_eq!(alloc.capacity_words(), 3 * 64 * 64 * 64);
        // counter starts over for the next frame
        assert_eq!(alloc.request(8), 0);
    }

    #[test]
    fn test_sizing_is_idempotent() {
        let mut device = RecordingDevice::default();
        let plan = plan_cascades(UVec3::splat(128), 64);
        let mut alloc = FragmentAllocator::new();

        for _ in 0..2 {
            alloc.request(32);
            alloc.request(16);
            alloc.finalize(&mut device, &plan);
        }

        assert_eq!(alloc.reallocations(), 1);
        assert_eq!(device.buffers_created(), 1);
        assert_eq!(device.buffers_destroyed(), 0);
    }

    #[test]
    fn test_resize_destroys_old_buffer_first() {
        let mut device = RecordingDevice::default();
        let plan = plan_cascades(UVec3::splat(64), 64);
        let mut alloc = FragmentAllocator::new();

        alloc.request(32);
        alloc.finalize(&mut device, &plan);
        let first = *alloc.buffer().expect("buffer after first frame");

        alloc.request(32);
        alloc.request(32);
        alloc.finalize(&mut device, &plan);

        let events = device.events();
        let destroy_at = events
            .iter()
            .position(|e| *e == DeviceEvent::DestroyBuffer(first))
            .expect("old buffer destroyed");
        let create_at = events
            .iter()
            .rposition(|e| matches!(e, DeviceEvent::CreateBuffer { .. }))
            .expect("new buffer created");
        assert!(destroy_at < create_at);
        assert_eq!(alloc.capacity_words(), 2 * 64 * 64 * 64);
    }

    #[test]
    fn test_no_requests_releases_buffer() {
        let mut device = RecordingDevice::default();
        let plan = plan_cascades(UVec3::splat(64), 64);
        let mut alloc = FragmentAllocator::new();

        alloc.request(32);
        alloc.finalize(&mut device, &plan);
        assert!(alloc.buffer().is_some());

        alloc.finalize(&mut device, &plan);
        assert!(alloc.buffer().is_none());
        assert_eq!(alloc.capacity_words(), 0);
        assert_eq!(device.buffers_destroyed(), 1);
    }

    #[test]
    fn test_degenerate_plan_has_no_buffer() {
        let mut device = RecordingDevice::default();
        let plan = plan_cascades(UVec3::ZERO, 128);
        let mut alloc = FragmentAllocator::new();
        alloc.request(64);
        alloc.finalize(&mut device, &plan);
        assert!(alloc.buffer().is_none());
        assert_eq!(device.buffers_created(), 0);
    }

    #[test]
    fn test_release_destroys_buffer() {
        let mut device = RecordingDevice::default();
        let plan = plan_cascades(UVec3::splat(64), 64);
        let mut alloc = FragmentAllocator::new();
        alloc.request(32);
        alloc.finalize(&mut device, &plan);
        alloc.release(&mut device);
        assert!(alloc.buffer().is_none());
        assert_eq!(device.buffers_destroyed(), 1);
    }
}
