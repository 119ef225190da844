//! Error code translation between the Rust layers and newlib
//!
//! The pthread family returns the errno value directly; `mmap`/`munmap`
//! return a sentinel and leave the code in the caller's `errno`.

use hlibc_core::ErrnoSlot;
use hlibc_ffi::{c_int, Result};

/// Convert a Result to the pthread return convention
///
/// - Ok(_) => 0
/// - Err(error) => positive errno
pub fn result_to_errno<T>(result: Result<T>) -> c_int {
    match result {
        Ok(_) => 0,
        Err(e) => e.to_errno(),
    }
}

/// Convert a Result to the `0`/`-1` status convention, storing the errno
pub fn result_to_status<T, E: ErrnoSlot + ?Sized>(result: Result<T>, slot: &E) -> c_int {
    match result {
        Ok(_) => 0,
        Err(e) => {
            slot.set_errno(e.to_errno());
            -1
        }
    }
}
