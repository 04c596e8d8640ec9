//! mapalloc: a first-fit, page-mapped memory allocator for Rust.
//!
//! Every block lives in memory obtained straight from the OS (`mmap`), with a
//! small header in front of the payload. Headers form one singly linked list
//! (the block directory) guarded by one lock:
//! - Placement: first-fit scan, split oversized free blocks, else map more
//! - Reclamation: mark free, coalesce contiguous free neighbours, unmap the
//!   tail when it ends up free
//!
//! # Usage
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: mapalloc::MapAlloc = mapalloc::MapAlloc;
//! ```
//!
//! Independent heaps can be created with [`Heap::new`] over any
//! [`ArenaSource`].

#[macro_use]
mod trace;

pub mod platform;
pub mod error;
pub mod sync;
pub mod arena;
pub mod block;
pub mod directory;
pub mod heap;
pub mod allocator;
#[cfg(feature = "ffi")]
pub mod ffi;

/// Alignment quantum. Every payload size is a multiple of this and every
/// handle is aligned to it.
pub const ALIGNMENT: usize = 16;

/// Smallest payload a split is allowed to leave behind.
pub const MIN_BLOCK_SIZE: usize = 32;

/// Bytes of header in front of every payload.
pub const METADATA_SIZE: usize = core::mem::size_of::<block::Header>();

const _: () = assert!(ALIGNMENT.is_power_of_two());
const _: () = assert!(METADATA_SIZE % ALIGNMENT == 0);
const _: () = assert!(MIN_BLOCK_SIZE % ALIGNMENT == 0);

/// Round `size` up to the next multiple of [`ALIGNMENT`].
/// Returns `None` if that overflows.
#[inline]
pub const fn align_up(size: usize) -> Option<usize> {
    match size.checked_add(ALIGNMENT - 1) {
        Some(padded) => Some(padded & !(ALIGNMENT - 1)),
        None => None,
    }
}

// Re-export the main types at crate root for convenience
pub use allocator::MapAlloc;
pub use arena::{ArenaSource, ContiguousArena, MmapArena};
pub use error::{AllocError, Corruption};
pub use heap::{BlockInfo, Heap, HeapStats};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(1), Some(16));
        assert_eq!(align_up(16), Some(16));
        assert_eq!(align_up(17), Some(32));
        assert_eq!(align_up(100), Some(112));
        assert_eq!(align_up(usize::MAX), None);
        assert_eq!(align_up(usize::MAX - 14), None);
    }

    #[test]
    fn test_metadata_size() {
        assert_eq!(METADATA_SIZE % ALIGNMENT, 0);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(METADATA_SIZE, 32);
    }
}
