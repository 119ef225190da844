//! Micro-kernel entry points
//!
//! Declarations only: the symbols come from the kernel's userspace syscall
//! stubs (and `__errno` from newlib's reentrancy support).

#![allow(non_snake_case)]

use crate::{c_int, c_void, size_t};

/// Wake count meaning "every waiter on the word"
pub const FUTEX_WAKE_ALL: u32 = u32::MAX;

extern "C" {
    /// Block while `*word == expected`. Returns 0 when woken, non-zero if the
    /// value already differed.
    pub fn h_futexWait(word: *const u32, expected: u32) -> c_int;

    /// Wake up to `count` waiters blocked on `word`; returns the number woken.
    pub fn h_futexWake(word: *const u32, count: u32) -> c_int;

    /// Identifier of the calling thread.
    pub fn h_getTid() -> u32;

    /// Map `len` bytes (a page multiple) with the packed protection and flags.
    /// Returns null on failure.
    pub fn h_mmap(len: size_t, prot: c_int, flags: c_int) -> *mut c_void;

    /// Release a mapping obtained from `h_mmap`. Returns 0 on success.
    pub fn h_munmap(addr: *mut c_void, len: size_t) -> c_int;

    /// Physical address backing `vaddr`, or 0 when it is not a DMA mapping.
    pub fn h_getPhysAddr(vaddr: *const c_void) -> u64;

    /// Size of a page in bytes.
    pub fn h_getPageSize() -> size_t;

    /// newlib's per-thread errno slot.
    pub fn __errno() -> *mut c_int;
}
