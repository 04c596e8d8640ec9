//! Error types.
//!
//! The public heap API reports failures as `None` (the null-result contract);
//! these types carry the reason internally and to diagnostics.

use thiserror::Error;

/// Why an allocation could not be satisfied.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    #[error("request of {size} bytes overflows usize once aligned and given a header")]
    SizeOverflow { size: usize },

    #[error("{count} elements of {element_size} bytes overflows usize")]
    CountOverflow { count: usize, element_size: usize },

    #[error("mmap of {len} bytes failed (errno {errno})")]
    MapFailed { len: usize, errno: i32 },

    #[error("arena exhausted: requested {requested} bytes, {available} bytes available")]
    Exhausted { requested: usize, available: usize },
}

/// Inconsistency found by [`Heap::verify`](crate::Heap::verify).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    #[error("record at 0x{0:x} is not {align}-byte aligned", align = crate::ALIGNMENT)]
    MisalignedRecord(usize),

    #[error("record at 0x{address:x} has payload size {size}, not a multiple of the alignment")]
    OddSize { address: usize, size: usize },

    #[error("tail points at 0x{tail:x} but the last reachable record is 0x{last:x}")]
    StaleTail { tail: usize, last: usize },

    #[error("directory walk exceeded {held} held bytes; the list has a cycle or overlapping records")]
    Overrun { held: usize },

    #[error("contiguous free records at 0x{first:x} and 0x{second:x} were not coalesced")]
    Uncoalesced { first: usize, second: usize },
}
