//! Block directory: the address-space ledger.
//!
//! A singly linked list of [`Header`]s in creation order, anchored by `head`
//! and `tail`, plus the arena source the records were carved from. Every
//! record reachable from `head` lives in memory the arena handed out and has
//! not taken back. The directory is not synchronized; [`Heap`](crate::Heap)
//! wraps it in a lock.
//!
//! Placement and reclamation policies live here as well, since both are
//! nothing but list surgery.

use crate::arena::ArenaSource;
use crate::block::Header;
use crate::error::{AllocError, Corruption};
use crate::{ALIGNMENT, METADATA_SIZE};
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

/// How [`Directory::place`] satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Reused a free record; `split` is set if a free remainder was carved off.
    Reused { split: bool },
    /// Acquired `len` new bytes from the arena.
    Grown { len: usize },
}

/// What [`Directory::reclaim`] did beyond marking the record free.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reclaim {
    /// Successors absorbed by coalescing.
    pub merged: usize,
    /// Bytes handed back to the arena, if the tail was collected.
    pub unmapped: Option<usize>,
}

/// One record as seen by diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Address of the header.
    pub address: usize,
    /// Payload bytes.
    pub size: usize,
    pub is_free: bool,
}

/// Aggregate view of a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub blocks: usize,
    pub free_blocks: usize,
    /// Payload bytes of in-use records.
    pub used_bytes: usize,
    /// Payload bytes of free records.
    pub free_bytes: usize,
    /// Bytes the arena source currently has handed out.
    pub held_bytes: usize,
}

impl HeapStats {
    fn record(&mut self, header: &Header) {
        self.blocks += 1;
        if header.is_free {
            self.free_blocks += 1;
            self.free_bytes += header.size;
        } else {
            self.used_bytes += header.size;
        }
    }
}

pub struct Directory<A: ArenaSource> {
    head: *mut Header,
    tail: *mut Header,
    arena: A,
}

// Records are only reachable through the directory, which is only reachable
// through its owner.
unsafe impl<A: ArenaSource + Send> Send for Directory<A> {}

impl<A: ArenaSource> Directory<A> {
    pub const fn new(arena: A) -> Self {
        Self {
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
            arena,
        }
    }

    pub fn arena(&self) -> &A {
        &self.arena
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    pub fn head(&self) -> Option<NonNull<Header>> {
        NonNull::new(self.head)
    }

    pub fn tail(&self) -> Option<NonNull<Header>> {
        NonNull::new(self.tail)
    }

    /// Records from `head` to `tail`.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            cursor: self.head,
            _directory: PhantomData,
        }
    }

    /// Payload size of a live record.
    ///
    /// # Safety
    ///
    /// `header` must be a record of this directory.
    pub unsafe fn payload_size(&self, header: NonNull<Header>) -> usize {
        unsafe { header.as_ref() }.size
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// First-fit: the earliest free record with at least `size` payload bytes.
    pub fn find_free(&self, size: usize) -> Option<NonNull<Header>> {
        self.iter().find(|&header| {
            let record = unsafe { header.as_ref() };
            record.is_free && record.size >= size
        })
    }

    /// Hand out a record with at least `size` payload bytes, reusing a free one
    /// if possible and growing the arena otherwise.
    ///
    /// `size` must already be a multiple of `ALIGNMENT`. On error nothing has
    /// changed.
    pub fn place(&mut self, size: usize) -> Result<(NonNull<Header>, Placement), AllocError> {
        debug_assert_eq!(size % ALIGNMENT, 0);

        if let Some(header) = self.find_free(size) {
            unsafe { (*header.as_ptr()).is_free = false };
            let split = self.split(header, size);
            return Ok((header, Placement::Reused { split }));
        }

        let len = METADATA_SIZE
            .checked_add(size)
            .ok_or(AllocError::SizeOverflow { size })?;
        let region = self.arena.acquire(len)?;
        let header = unsafe { Header::init(region, size) };
        self.append(header);
        Ok((header, Placement::Grown { len }))
    }

    /// Split `header` down to `size`, keeping `tail` on the last record.
    fn split(&mut self, header: NonNull<Header>, size: usize) -> bool {
        let Some(rest) = (unsafe { Header::split(header, size) }) else {
            return false;
        };
        if self.tail == header.as_ptr() {
            self.tail = rest.as_ptr();
        }
        true
    }

    fn append(&mut self, header: NonNull<Header>) {
        match NonNull::new(self.tail) {
            Some(tail) => unsafe { (*tail.as_ptr()).next = header.as_ptr() },
            None => self.head = header.as_ptr(),
        }
        self.tail = header.as_ptr();
    }

    // =========================================================================
    // Reclamation
    // =========================================================================

    /// Mark `header` free, coalesce, and collect the tail if it ends up free.
    ///
    /// # Safety
    ///
    /// `header` must be an in-use record of this directory.
    pub unsafe fn reclaim(&mut self, header: NonNull<Header>) -> Reclaim {
        unsafe { (*header.as_ptr()).is_free = true };
        let merged = self.coalesce();
        let unmapped = self.shrink();
        Reclaim { merged, unmapped }
    }

    /// One forward pass merging every run of contiguous free records.
    ///
    /// After a merge the cursor stays put: the record it absorbed may have been
    /// followed by yet another free neighbour. Records from different arena
    /// acquisitions are only merged if they happen to touch, so merging every
    /// free neighbour in list order is only guaranteed on a
    /// [`ContiguousArena`](crate::ContiguousArena). Returns the number of
    /// records absorbed.
    pub fn coalesce(&mut self) -> usize {
        let mut merged = 0;
        let mut cursor = self.head;
        while let Some(current) = NonNull::new(cursor) {
            let Some(next) = NonNull::new(unsafe { current.as_ref() }.next) else {
                break;
            };
            let both_free = unsafe { current.as_ref().is_free && next.as_ref().is_free };
            if both_free && Header::is_contiguous(current, next) {
                unsafe { Header::absorb_next(current) };
                if self.tail == next.as_ptr() {
                    self.tail = current.as_ptr();
                }
                merged += 1;
                continue;
            }
            cursor = next.as_ptr();
        }
        merged
    }

    /// If the tail is free, unlink it and return its memory to the arena.
    /// Interior free records are never unmapped. Returns the bytes released.
    pub fn shrink(&mut self) -> Option<usize> {
        let tail = NonNull::new(self.tail)?;
        if !unsafe { tail.as_ref() }.is_free {
            return None;
        }
        self.unlink_tail();
        Some(unsafe { self.unmap(tail) })
    }

    fn unlink_tail(&mut self) -> Option<NonNull<Header>> {
        let tail = NonNull::new(self.tail)?;
        if self.head == self.tail {
            self.head = ptr::null_mut();
            self.tail = ptr::null_mut();
            return Some(tail);
        }
        let mut prev = self.head;
        unsafe {
            while (*prev).next != self.tail {
                prev = (*prev).next;
            }
            (*prev).next = ptr::null_mut();
        }
        self.tail = prev;
        Some(tail)
    }

    /// Return an unlinked record's span to the arena.
    unsafe fn unmap(&mut self, header: NonNull<Header>) -> usize {
        let len = unsafe { header.as_ref() }.span();
        unsafe { self.arena.release(header.cast(), len) };
        len
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            held_bytes: self.arena.held_bytes(),
            ..HeapStats::default()
        };
        for header in self.iter() {
            stats.record(unsafe { header.as_ref() });
        }
        stats
    }

    /// Walk the whole list checking structural invariants.
    pub fn verify(&self) -> Result<HeapStats, Corruption> {
        let held = self.arena.held_bytes();
        let mut stats = HeapStats {
            held_bytes: held,
            ..HeapStats::default()
        };
        let mut spanned = 0usize;
        let mut prev: Option<NonNull<Header>> = None;
        let mut cursor = self.head;

        while let Some(current) = NonNull::new(cursor) {
            let address = current.as_ptr() as usize;
            if address % ALIGNMENT != 0 {
                return Err(Corruption::MisalignedRecord(address));
            }
            let record = unsafe { current.as_ref() };
            if record.size % ALIGNMENT != 0 {
                return Err(Corruption::OddSize {
                    address,
                    size: record.size,
                });
            }
            // Every record accounts for at least a header's worth of held
            // bytes, which bounds the walk even if `next` loops.
            spanned = spanned.saturating_add(record.span());
            if spanned > held {
                return Err(Corruption::Overrun { held });
            }
            if let Some(p) = prev {
                let pred = unsafe { p.as_ref() };
                if pred.is_free && record.is_free && Header::is_contiguous(p, current) {
                    return Err(Corruption::Uncoalesced {
                        first: p.as_ptr() as usize,
                        second: address,
                    });
                }
            }
            stats.record(record);
            prev = Some(current);
            cursor = record.next;
        }

        let last = prev.map_or(ptr::null_mut(), NonNull::as_ptr);
        if last != self.tail {
            return Err(Corruption::StaleTail {
                tail: self.tail as usize,
                last: last as usize,
            });
        }
        Ok(stats)
    }
}

impl<A: ArenaSource> Drop for Directory<A> {
    /// Hand every record back, live or not. Handles into this directory are
    /// dangling afterwards.
    fn drop(&mut self) {
        while let Some(tail) = self.unlink_tail() {
            unsafe { self.unmap(tail) };
        }
    }
}

/// Iterator over the records of a [`Directory`].
pub struct Iter<'a> {
    cursor: *mut Header,
    _directory: PhantomData<&'a ()>,
}

impl Iterator for Iter<'_> {
    type Item = NonNull<Header>;

    fn next(&mut self) -> Option<NonNull<Header>> {
        let current = NonNull::new(self.cursor)?;
        self.cursor = unsafe { current.as_ref() }.next;
        Some(current)
    }
}

impl From<&Header> for BlockInfo {
    fn from(header: &Header) -> Self {
        Self {
            address: header as *const Header as usize,
            size: header.size,
            is_free: header.is_free,
        }
    }
}
