//! C-ABI exports for external linking.
//!
//! Gated behind `features = ["ffi"]`. The symbols follow the classic
//! malloc/calloc/realloc/free contract and allocate from the same heap as
//! [`MapAlloc`](crate::MapAlloc). They are prefixed so linking them never
//! shadows the C runtime's allocator by accident.

use crate::allocator::{into_raw, MapAlloc};
use core::ptr::NonNull;

#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapalloc_malloc(size: usize) -> *mut u8 {
    into_raw(MapAlloc::heap().allocate(size))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapalloc_calloc(count: usize, element_size: usize) -> *mut u8 {
    into_raw(MapAlloc::heap().allocate_zeroed(count, element_size))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapalloc_realloc(ptr: *mut u8, new_size: usize) -> *mut u8 {
    into_raw(unsafe { MapAlloc::heap().resize(NonNull::new(ptr), new_size) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn mapalloc_free(ptr: *mut u8) {
    unsafe { MapAlloc::heap().release(NonNull::new(ptr)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_contract() {
        unsafe {
            assert!(mapalloc_malloc(0).is_null());
            mapalloc_free(core::ptr::null_mut());

            let p = mapalloc_malloc(24);
            assert!(!p.is_null());
            p.write_bytes(0x11, 24);

            let q = mapalloc_realloc(p, 4096);
            assert!(!q.is_null());
            assert!((0..24).all(|i| *q.add(i) == 0x11));

            assert!(mapalloc_realloc(q, 0).is_null());

            let z = mapalloc_calloc(10, 10);
            assert!((0..100).all(|i| *z.add(i) == 0));
            mapalloc_free(z);

            assert!(mapalloc_calloc(usize::MAX, 16).is_null());
        }
    }
}
