// Free-heap query for admission checks.
// Only a snapshot: nothing is reserved, so callers still handle failed
// allocations afterwards.

pub trait HeapStats {
    /// Bytes currently free on the heap.
    fn free(&self) -> usize;
}

impl<H: HeapStats + ?Sized> HeapStats for &H {
    fn free(&self) -> usize {
        (**self).free()
    }
}

/// The global `esp-alloc` heap (needs its `internal-heap-stats` feature).
#[cfg(feature = "esp32c3")]
#[derive(Debug, Default, Clone, Copy)]
pub struct EspHeap;

#[cfg(feature = "esp32c3")]
impl HeapStats for EspHeap {
    fn free(&self) -> usize {
        esp_alloc::HEAP.free()
    }
}
