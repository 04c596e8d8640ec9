//! Process-wide allocator: a static heap behind `GlobalAlloc`.
//!
//! The heap only guarantees `ALIGNMENT` (16 bytes). Stricter layouts are
//! served by over-allocating and stashing the real handle in the word right
//! before the pointer handed out.

use crate::arena::MmapArena;
use crate::heap::Heap;
use crate::ALIGNMENT;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

static HEAP: Heap<MmapArena> = Heap::new(MmapArena::new());

/// First-fit, page-mapped allocator.
///
/// Register as the global allocator with:
/// ```ignore
/// #[global_allocator]
/// static GLOBAL: mapalloc::MapAlloc = mapalloc::MapAlloc;
/// ```
pub struct MapAlloc;

impl MapAlloc {
    /// The heap every `MapAlloc` allocates from.
    pub fn heap() -> &'static Heap<MmapArena> {
        &HEAP
    }
}

/// Null-result form of a heap handle.
#[inline]
pub fn into_raw(handle: Option<NonNull<u8>>) -> *mut u8 {
    handle.map_or(ptr::null_mut(), NonNull::as_ptr)
}

unsafe impl GlobalAlloc for MapAlloc {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let size = layout.size();
        if size == 0 {
            return layout.align() as *mut u8;
        }
        if layout.align() <= ALIGNMENT {
            return into_raw(HEAP.allocate(size));
        }
        unsafe { alloc_overaligned(layout) }
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        let handle = if layout.align() <= ALIGNMENT {
            ptr
        } else {
            unsafe { stashed_handle(ptr) }
        };
        unsafe { HEAP.release(NonNull::new(handle)) };
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let size = layout.size();
        if size == 0 {
            return layout.align() as *mut u8;
        }
        if layout.align() <= ALIGNMENT {
            return into_raw(HEAP.allocate_zeroed(1, size));
        }
        let ptr = unsafe { alloc_overaligned(layout) };
        if !ptr.is_null() {
            unsafe { ptr::write_bytes(ptr, 0, size) };
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if ptr.is_null() || layout.size() == 0 {
            let new_layout = unsafe { Layout::from_size_align_unchecked(new_size, layout.align()) };
            return unsafe { self.alloc(new_layout) };
        }

        if new_size == 0 {
            unsafe { self.dealloc(ptr, layout) };
            return layout.align() as *mut u8;
        }

        if layout.align() <= ALIGNMENT {
            return into_raw(unsafe { HEAP.resize(NonNull::new(ptr), new_size) });
        }

        // Over-aligned: the stashed offset is not preserved by the heap's
        // resize, so move by hand.
        let new_layout = unsafe { Layout::from_size_align_unchecked(new_size, layout.align()) };
        let new_ptr = unsafe { alloc_overaligned(new_layout) };
        if !new_ptr.is_null() {
            let copy_size = layout.size().min(new_size);
            unsafe { ptr::copy_nonoverlapping(ptr, new_ptr, copy_size) };
            unsafe { self.dealloc(ptr, layout) };
        }
        new_ptr
    }
}

/// Allocate `size + align` bytes and return the first `align`-aligned address
/// at least `ALIGNMENT` bytes into the payload. Handles are 16-aligned and
/// `align` is a larger power of two, so that address is at most `align`
/// bytes in and the request still fits.
#[cold]
unsafe fn alloc_overaligned(layout: Layout) -> *mut u8 {
    let align = layout.align();
    let Some(padded) = layout.size().checked_add(align) else {
        return ptr::null_mut();
    };
    let Some(handle) = HEAP.allocate(padded) else {
        return ptr::null_mut();
    };

    let addr = handle.as_ptr() as usize;
    let offset = ((addr + ALIGNMENT + align - 1) & !(align - 1)) - addr;
    unsafe {
        let aligned = handle.as_ptr().add(offset);
        aligned.cast::<*mut u8>().sub(1).write(handle.as_ptr());
        aligned
    }
}

/// Recover the heap handle behind an over-aligned pointer.
#[inline]
unsafe fn stashed_handle(ptr: *mut u8) -> *mut u8 {
    unsafe { ptr.cast::<*mut u8>().sub(1).read() }
}
