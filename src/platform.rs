//! OS page mapping primitives.
//!
//! Thin wrappers over `mmap`/`munmap`. Only unix targets are supported; the
//! allocator has no fallback heap to lean on.

use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicUsize, Ordering};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        /// Map `len` bytes of anonymous, private, read-write memory.
        /// Returns the raw OS error code on failure.
        pub unsafe fn map(len: usize) -> Result<NonNull<u8>, i32> {
            let addr = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if addr == libc::MAP_FAILED {
                return Err(last_errno());
            }
            NonNull::new(addr as *mut u8).ok_or(libc::ENOMEM)
        }

        /// Unmap `[addr, addr + len)`. `addr` must be page-aligned.
        pub unsafe fn unmap(addr: NonNull<u8>, len: usize) -> Result<(), i32> {
            let rc = unsafe { libc::munmap(addr.as_ptr() as *mut libc::c_void, len) };
            if rc != 0 {
                return Err(last_errno());
            }
            Ok(())
        }

        fn query_page_size() -> usize {
            let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if size <= 0 { 4096 } else { size as usize }
        }

        fn last_errno() -> i32 {
            std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
        }
    } else {
        compile_error!("mapalloc requires a unix target (mmap/munmap)");
    }
}

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// The OS page size, queried once and cached.
#[inline]
pub fn page_size() -> usize {
    let cached = PAGE_SIZE.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }
    let size = query_page_size();
    PAGE_SIZE.store(size, Ordering::Relaxed);
    size
}

/// Round `addr` up to a page boundary.
#[inline]
pub fn page_align_up(addr: usize) -> usize {
    let page = page_size();
    (addr + page - 1) & !(page - 1)
}
