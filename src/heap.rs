//! The heap: a block directory behind one lock.
//!
//! Every operation takes the lock for its whole critical section (search,
//! split, coalesce, arena growth and shrink) and drops it before returning,
//! on every path. Zero-filling and the resize copy run after the lock is
//! released, on memory no other thread can see yet.

use crate::arena::{ArenaSource, MmapArena};
use crate::block::Header;
use crate::directory::Directory;
use crate::error::{AllocError, Corruption};
use crate::sync::SpinMutex;
use core::ptr::{self, NonNull};
use std::io;

pub use crate::directory::{BlockInfo, HeapStats, Placement, Reclaim};

/// An allocator instance. The process-wide one behind
/// [`MapAlloc`](crate::MapAlloc) is a `Heap<MmapArena>`; tests and embedders
/// can build as many independent ones as they like.
pub struct Heap<A: ArenaSource = MmapArena> {
    directory: SpinMutex<Directory<A>>,
}

impl<A: ArenaSource> Heap<A> {
    pub const fn new(arena: A) -> Self {
        Self {
            directory: SpinMutex::new(Directory::new(arena)),
        }
    }

    /// Allocate at least `size` bytes, aligned to [`ALIGNMENT`](crate::ALIGNMENT).
    ///
    /// Returns `None` for `size == 0` and when the arena cannot grow.
    #[cfg_attr(not(feature = "debug"), allow(unused_variables))]
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        match self.try_allocate(size) {
            Ok(handle) => Some(handle),
            Err(err) => {
                heap_event!(debug, size, error = %err, "allocation failed");
                None
            }
        }
    }

    #[cfg_attr(not(feature = "debug"), allow(unused_variables))]
    fn try_allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let aligned = crate::align_up(size).ok_or(AllocError::SizeOverflow { size })?;
        let (header, placement) = self.directory.lock().place(aligned)?;
        heap_event!(trace, size = aligned, ?placement, "placed block");
        Ok(Header::handle(header))
    }

    /// Allocate `count * element_size` zeroed bytes.
    ///
    /// Returns `None` if either factor is zero or the product overflows.
    pub fn allocate_zeroed(&self, count: usize, element_size: usize) -> Option<NonNull<u8>> {
        if count == 0 || element_size == 0 {
            return None;
        }
        let Some(total) = count.checked_mul(element_size) else {
            heap_event!(debug, error = %AllocError::CountOverflow { count, element_size }, "zeroed allocation rejected");
            return None;
        };
        let handle = self.allocate(total)?;
        unsafe { ptr::write_bytes(handle.as_ptr(), 0, total) };
        Some(handle)
    }

    /// Grow `handle` to at least `new_size` bytes, moving it if needed.
    ///
    /// `None` behaves like [`allocate`](Self::allocate); `new_size == 0`
    /// releases and returns `None`. Blocks are never shrunk in place. If a new
    /// block cannot be obtained, returns `None` and `handle` stays valid.
    ///
    /// # Safety
    ///
    /// `handle` must be `None` or a live handle from this heap.
    pub unsafe fn resize(&self, handle: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        let Some(old) = handle else {
            return self.allocate(new_size);
        };
        if new_size == 0 {
            unsafe { self.release(Some(old)) };
            return None;
        }

        let header = unsafe { Header::from_handle(old) };
        let old_size = unsafe { self.directory.lock().payload_size(header) };
        if old_size >= new_size {
            return Some(old);
        }

        let new = self.allocate(new_size)?;
        unsafe {
            ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_size);
            self.release(Some(old));
        }
        Some(new)
    }

    /// Return a block to the heap. `None` is a no-op.
    ///
    /// # Safety
    ///
    /// `handle` must be `None` or a live handle from this heap. Anything else
    /// is undefined behaviour; headers carry no magic to check against.
    #[cfg_attr(not(feature = "debug"), allow(unused_variables))]
    pub unsafe fn release(&self, handle: Option<NonNull<u8>>) {
        let Some(handle) = handle else {
            return;
        };
        let header = unsafe { Header::from_handle(handle) };
        let reclaim = unsafe { self.directory.lock().reclaim(header) };
        heap_event!(trace, merged = reclaim.merged, unmapped = ?reclaim.unmapped, "released block");
    }

    /// Payload size of a live block.
    ///
    /// # Safety
    ///
    /// `handle` must be a live handle from this heap.
    pub unsafe fn usable_size(&self, handle: NonNull<u8>) -> usize {
        let header = unsafe { Header::from_handle(handle) };
        unsafe { self.directory.lock().payload_size(header) }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Visit every record in directory order while holding the lock.
    ///
    /// `visit` must not allocate from this heap.
    pub fn walk(&self, mut visit: impl FnMut(BlockInfo)) {
        let directory = self.directory.lock();
        for header in directory.iter() {
            visit(BlockInfo::from(unsafe { header.as_ref() }));
        }
    }

    pub fn stats(&self) -> HeapStats {
        self.directory.lock().stats()
    }

    /// Bytes the arena source currently holds for this heap.
    pub fn held_bytes(&self) -> usize {
        self.directory.lock().arena().held_bytes()
    }

    /// Consistency walk over the whole directory.
    pub fn verify(&self) -> Result<HeapStats, Corruption> {
        self.directory.lock().verify()
    }

    /// Print every record and the used/free totals.
    ///
    /// The lock is held while writing, so `out` must not allocate from this
    /// heap (stderr is fine for the global heap, a `Vec` is fine for others).
    pub fn dump(&self, out: &mut impl io::Write) -> io::Result<()> {
        let directory = self.directory.lock();
        writeln!(out, "memory list:")?;
        for header in directory.iter() {
            let info = BlockInfo::from(unsafe { header.as_ref() });
            writeln!(
                out,
                "  0x{:016x}  size {:>10}  {}",
                info.address,
                info.size,
                if info.is_free { "free" } else { "used" }
            )?;
        }
        let stats = directory.stats();
        writeln!(out, "total used: {} bytes", stats.used_bytes)?;
        writeln!(out, "total free: {} bytes", stats.free_bytes)?;
        writeln!(out, "arena held: {} bytes", stats.held_bytes)
    }
}

impl<A: ArenaSource + Default> Default for Heap<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}
