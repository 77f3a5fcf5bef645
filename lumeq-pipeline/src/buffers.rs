//! Reusable per-frame buffers: source plane slots and the XRGB destination.
//!
//! Both are allocated lazily on the first frame and reused for every
//! subsequent frame of the owning pipeline instance; nothing here is
//! released per frame.

use crate::frame::DEST_BYTES_PER_PIXEL;

/// Cached geometry for one source plane slot.
///
/// Slots are an allocation-avoidance cache, not a content cache: the slot
/// vector is sized once when the plane count is first known, and the bind
/// step overwrites each slot's geometry every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceSlot {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
}

/// Owned, mutable XRGB8888 destination buffer.
///
/// Sized to the first frame's primary-plane dimensions and reused for every
/// subsequent frame. The backing memory is released exactly once, when the
/// owning pool is dropped.
#[derive(Debug)]
pub struct DestinationBuffer {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl DestinationBuffer {
    fn new(width: u32, height: u32) -> Self {
        let stride = width as usize * DEST_BYTES_PER_PIXEL;
        Self {
            width,
            height,
            stride,
            data: vec![0u8; stride * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Buffer state shared by all frames of one pipeline instance.
#[derive(Debug, Default)]
pub struct BufferPool {
    slots: Vec<SourceSlot>,
    destination: Option<DestinationBuffer>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the source slot cache the first time the plane count is known.
    ///
    /// Subsequent calls return the existing slots unchanged regardless of
    /// `count`; their contents are repopulated by the bind step each frame.
    pub fn ensure_source_slots(&mut self, count: usize) -> &mut [SourceSlot] {
        if self.slots.is_empty() && count > 0 {
            tracing::debug!(count, "source slot cache allocated");
            self.slots = vec![SourceSlot::default(); count];
        }
        &mut self.slots
    }

    /// Allocate the destination buffer if none exists yet.
    ///
    /// Dimensions come from the first frame's primary plane and are never
    /// re-derived: a later frame reporting different dimensions does not
    /// resize the buffer. Output for such frames is unspecified (known
    /// limitation of the single-allocation design).
    pub fn ensure_destination(&mut self, width: u32, height: u32) -> &mut DestinationBuffer {
        self.destination.get_or_insert_with(|| {
            tracing::info!(
                width,
                height,
                bytes = width as usize * height as usize * DEST_BYTES_PER_PIXEL,
                "destination buffer allocated"
            );
            DestinationBuffer::new(width, height)
        })
    }

    pub fn destination(&self) -> Option<&DestinationBuffer> {
        self.destination.as_ref()
    }

    pub fn destination_mut(&mut self) -> Option<&mut DestinationBuffer> {
        self.destination.as_mut()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_slots_allocate_once() {
        let mut pool = BufferPool::new();
        let first_ptr = pool.ensure_source_slots(3).as_ptr();
        assert_eq!(pool.slot_count(), 3);

        // Repeat calls, even with a different count, keep the same storage.
        let second_ptr = pool.ensure_source_slots(3).as_ptr();
        assert_eq!(first_ptr, second_ptr);
        let third_ptr = pool.ensure_source_slots(2).as_ptr();
        assert_eq!(first_ptr, third_ptr);
        assert_eq!(pool.slot_count(), 3);
    }

    #[test]
    fn destination_allocates_once_and_keeps_first_dimensions() {
        let mut pool = BufferPool::new();
        let ptr = {
            let dest = pool.ensure_destination(64, 48);
            assert_eq!(dest.width(), 64);
            assert_eq!(dest.height(), 48);
            assert_eq!(dest.stride(), 64 * DEST_BYTES_PER_PIXEL);
            assert_eq!(dest.data().len(), 64 * 48 * DEST_BYTES_PER_PIXEL);
            dest.data().as_ptr()
        };

        // A differently-sized later frame must not resize the buffer.
        let dest = pool.ensure_destination(128, 96);
        assert_eq!(dest.width(), 64);
        assert_eq!(dest.height(), 48);
        assert_eq!(dest.data().as_ptr(), ptr);
    }

    #[test]
    fn destination_is_zeroed_on_allocation() {
        let mut pool = BufferPool::new();
        let dest = pool.ensure_destination(2, 2);
        assert!(dest.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_pool_reports_no_destination() {
        let pool = BufferPool::new();
        assert!(pool.destination().is_none());
        assert_eq!(pool.slot_count(), 0);
    }
}
