//! Block records: the header that sits in front of every payload.
//!
//! ```text
//!  record                      handle
//!    |                           |
//!    v                           v
//!    +------+---------+------+---+-------------------------+
//!    | size | is_free | next |pad|  payload (size bytes)   |
//!    +------+---------+------+---+-------------------------+
//!    |<------ METADATA_SIZE ---->|
//! ```
//!
//! Header and payload always come from the same arena acquisition. All
//! functions here work on raw pointers; the directory is responsible for
//! holding the lock while calling them.

use crate::{METADATA_SIZE, MIN_BLOCK_SIZE};
use core::ptr::{self, NonNull};

/// Metadata preceding a payload.
#[repr(C, align(16))]
pub struct Header {
    /// Payload bytes, excluding this header. Always a multiple of `ALIGNMENT`.
    pub size: usize,
    pub is_free: bool,
    /// Next record in directory order. Not owned.
    pub next: *mut Header,
}

impl Header {
    /// Write a fresh, in-use record at `at`.
    ///
    /// # Safety
    ///
    /// `at` must be aligned and valid for `METADATA_SIZE + size` bytes.
    pub unsafe fn init(at: NonNull<u8>, size: usize) -> NonNull<Header> {
        let header = at.cast::<Header>();
        unsafe {
            header.as_ptr().write(Header {
                size,
                is_free: false,
                next: ptr::null_mut(),
            })
        };
        header
    }

    /// Recover the record that owns `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must have been returned by an allocation from the heap this
    /// record belongs to and not released since. This is the one place that
    /// trusts a caller-supplied pointer; nothing is validated.
    #[inline]
    pub unsafe fn from_handle(handle: NonNull<u8>) -> NonNull<Header> {
        unsafe { NonNull::new_unchecked(handle.as_ptr().sub(METADATA_SIZE)).cast() }
    }

    /// The pointer handed to the caller for `header`.
    #[inline]
    pub fn handle(header: NonNull<Header>) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(header.as_ptr().cast::<u8>().add(METADATA_SIZE)) }
    }

    /// Bytes this record spans, header included.
    #[inline]
    pub fn span(&self) -> usize {
        METADATA_SIZE + self.size
    }

    /// One past the last payload byte.
    #[inline]
    pub fn end(header: NonNull<Header>) -> *mut u8 {
        let span = unsafe { header.as_ref() }.span();
        header.as_ptr().cast::<u8>().wrapping_add(span)
    }

    /// Whether `next` starts exactly where `header`'s payload ends.
    #[inline]
    pub fn is_contiguous(header: NonNull<Header>, next: NonNull<Header>) -> bool {
        ptr::eq(Header::end(header), next.as_ptr().cast::<u8>())
    }

    /// Whether a block of `size` payload bytes can be split off `self`
    /// leaving a remainder worth keeping.
    #[inline]
    pub fn can_split(&self, size: usize) -> bool {
        size.checked_add(METADATA_SIZE + MIN_BLOCK_SIZE)
            .is_some_and(|needed| self.size >= needed)
    }

    /// Shrink `header` to `size` payload bytes and turn the leftover into a
    /// free record linked right after it. Returns the new record, or `None`
    /// if the leftover would be smaller than `MIN_BLOCK_SIZE`.
    ///
    /// # Safety
    ///
    /// `header` must be a valid record and `size` a multiple of `ALIGNMENT`.
    pub unsafe fn split(header: NonNull<Header>, size: usize) -> Option<NonNull<Header>> {
        let record = unsafe { &mut *header.as_ptr() };
        if !record.can_split(size) {
            return None;
        }
        let rest = unsafe {
            NonNull::new_unchecked(header.as_ptr().cast::<u8>().add(METADATA_SIZE + size))
                .cast::<Header>()
        };
        unsafe {
            rest.as_ptr().write(Header {
                size: record.size - size - METADATA_SIZE,
                is_free: true,
                next: record.next,
            })
        };
        record.size = size;
        record.next = rest.as_ptr();
        Some(rest)
    }

    /// Merge `header`'s successor into it. The successor's header becomes
    /// payload of `header`.
    ///
    /// # Safety
    ///
    /// `header.next` must be non-null and contiguous with `header`.
    pub unsafe fn absorb_next(header: NonNull<Header>) {
        let record = unsafe { &mut *header.as_ptr() };
        let next = unsafe { &*record.next };
        record.size += next.span();
        record.next = next.next;
    }
}
