//! Arena sources: where the directory gets raw memory from.
//!
//! An arena source hands out read-write regions and takes back trailing
//! pieces of them. It keeps no per-block bookkeeping of its own; the block
//! directory is the only authority on what is live.

use crate::error::AllocError;
use crate::platform;
use core::ptr::NonNull;

/// Supplier of raw memory for a [`Heap`](crate::Heap).
///
/// # Safety
///
/// `acquire` must return memory that is readable and writable for at least
/// `len` bytes, aligned to [`ALIGNMENT`](crate::ALIGNMENT), not aliased by any
/// other live region, and that stays valid until it is released.
pub unsafe trait ArenaSource {
    /// Obtain a fresh region of at least `len` bytes.
    fn acquire(&mut self, len: usize) -> Result<NonNull<u8>, AllocError>;

    /// Give back `[region, region + len)`.
    ///
    /// # Safety
    ///
    /// The range lies inside memory previously acquired from this source and
    /// no live record overlaps it. It ends at an acquisition end or at the
    /// start of a piece released earlier, and may start in the middle of an
    /// acquisition (the tail piece of a split block); the part before it is
    /// still owned by the caller.
    unsafe fn release(&mut self, region: NonNull<u8>, len: usize);

    /// Bytes acquired and not yet released.
    fn held_bytes(&self) -> usize;
}

// =============================================================================
// MmapArena
// =============================================================================

/// One anonymous private mapping per acquisition.
#[derive(Debug, Default)]
pub struct MmapArena {
    held: usize,
}

impl MmapArena {
    pub const fn new() -> Self {
        Self { held: 0 }
    }
}

unsafe impl ArenaSource for MmapArena {
    fn acquire(&mut self, len: usize) -> Result<NonNull<u8>, AllocError> {
        let region =
            unsafe { platform::map(len) }.map_err(|errno| AllocError::MapFailed { len, errno })?;
        self.held += len;
        Ok(region)
    }

    unsafe fn release(&mut self, region: NonNull<u8>, len: usize) {
        self.held -= len;

        // A region starting mid-page shares that page with its predecessor, so
        // only whole pages from the next boundary on are returned. Past the end
        // lies either mapping slack or a piece released earlier, so its last
        // page can go too.
        let addr = region.as_ptr() as usize;
        let start = platform::page_align_up(addr);
        let end = platform::page_align_up(addr + len);
        if end <= start {
            return;
        }
        let first_page = unsafe { NonNull::new_unchecked(region.as_ptr().add(start - addr)) };
        let result = unsafe { platform::unmap(first_page, end - start) };
        debug_assert!(result.is_ok(), "munmap failed: {result:?}");
    }

    fn held_bytes(&self) -> usize {
        self.held
    }
}

// =============================================================================
// ContiguousArena
// =============================================================================

/// A single reservation carved upward like a program break.
///
/// Acquisitions are handed out back to back, so every record in a heap built
/// on this source is contiguous with its successor. Releases must end at the
/// current top, which the directory's tail-only shrinking guarantees. The
/// whole reservation is unmapped when the arena is dropped.
#[derive(Debug)]
pub struct ContiguousArena {
    base: NonNull<u8>,
    capacity: usize,
    top: usize,
}

// The reservation is owned exclusively by this value.
unsafe impl Send for ContiguousArena {}

impl ContiguousArena {
    /// Reserve `capacity` bytes (rounded up to whole pages).
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        let page = platform::page_size();
        let capacity = capacity
            .max(1)
            .checked_add(page - 1)
            .map(|padded| padded & !(page - 1))
            .ok_or(AllocError::SizeOverflow { size: capacity })?;
        let base = unsafe { platform::map(capacity) }.map_err(|errno| AllocError::MapFailed {
            len: capacity,
            errno,
        })?;
        Ok(Self { base, capacity, top: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start of the reservation; the first acquisition is placed here.
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub fn available(&self) -> usize {
        self.capacity - self.top
    }
}

unsafe impl ArenaSource for ContiguousArena {
    fn acquire(&mut self, len: usize) -> Result<NonNull<u8>, AllocError> {
        let available = self.available();
        if len > available {
            return Err(AllocError::Exhausted {
                requested: len,
                available,
            });
        }
        let region = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(self.top)) };
        self.top += len;
        Ok(region)
    }

    unsafe fn release(&mut self, region: NonNull<u8>, len: usize) {
        let offset = region.as_ptr() as usize - self.base.as_ptr() as usize;
        debug_assert_eq!(offset + len, self.top, "release must end at the arena top");
        if offset + len == self.top {
            self.top = offset;
        }
    }

    fn held_bytes(&self) -> usize {
        self.top
    }
}

impl Drop for ContiguousArena {
    fn drop(&mut self) {
        let _ = unsafe { platform::unmap(self.base, self.capacity) };
    }
}
