//! Kernel collaborator interfaces
//!
//! The synchronization and mapping layers never talk to the kernel directly;
//! they go through these traits. The on-target implementation forwards to the
//! syscalls declared in `hlibc_ffi::syscall`, the host harness simulates them.

use core::ptr::NonNull;
use core::sync::atomic::AtomicU32;

use hlibc_ffi::{c_int, Result};

use crate::{PhysAddr, ThreadId};

/// How many waiters a futex wake should release
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WakeCount {
    One,
    Many(u32),
    All,
}

impl WakeCount {
    /// Raw count as passed to the kernel (`u32::MAX` for all)
    pub fn as_raw(self) -> u32 {
        match self {
            WakeCount::One => 1,
            WakeCount::Many(n) => n,
            WakeCount::All => u32::MAX,
        }
    }
}

/// Kernel futex wait/wake on a shared 32-bit cell
pub trait FutexChannel {
    /// Block the caller while `word` holds `expected`.
    ///
    /// Returns immediately if the value already differs. May return without a
    /// matching wake; callers re-check their condition.
    fn wait(&self, word: &AtomicU32, expected: u32);

    /// Unblock up to `count` waiters on `word`, returning how many were woken.
    fn wake(&self, word: &AtomicU32, count: WakeCount) -> usize;
}

/// Identity of the calling thread
pub trait CurrentThread {
    fn current_thread(&self) -> ThreadId;
}

/// Everything the mutex and barrier need from the kernel
pub trait SyncKernel: FutexChannel + CurrentThread {}

impl<T: FutexChannel + CurrentThread + ?Sized> SyncKernel for T {}

/// Kernel mapping syscall
///
/// `prot` and `flags` are the packed `<sys/mman.h>` values; the mapper only
/// produces them at this boundary.
pub trait MappingSyscall {
    /// Size of a page in bytes (a power of two)
    fn page_size(&self) -> usize;

    /// Map `len` bytes, `len` being a non-zero page multiple.
    fn map(&self, len: usize, prot: u32, flags: u32) -> Result<NonNull<u8>>;

    /// Release `len` bytes starting at the page-aligned `addr`.
    fn unmap(&self, addr: NonNull<u8>, len: usize) -> Result<()>;

    /// Physical address backing `addr` if it lies in a DMA-contiguous mapping
    fn physical_address(&self, addr: NonNull<u8>) -> Option<PhysAddr>;
}

impl<T: MappingSyscall + ?Sized> MappingSyscall for &T {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn map(&self, len: usize, prot: u32, flags: u32) -> Result<NonNull<u8>> {
        (**self).map(len, prot, flags)
    }

    fn unmap(&self, addr: NonNull<u8>, len: usize) -> Result<()> {
        (**self).unmap(addr, len)
    }

    fn physical_address(&self, addr: NonNull<u8>) -> Option<PhysAddr> {
        (**self).physical_address(addr)
    }
}

/// The per-thread `errno` cell C callers read after a failed call
pub trait ErrnoSlot {
    fn set_errno(&self, errno: c_int);
}

/// Scheduling priority; larger values are more urgent
#[repr(transparent)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u32);

/// Scheduler-side priority bookkeeping used by priority-aware mutexes
///
/// The scheduler owns the base and effective priorities; the mutex only tells
/// it when a holder must be boosted and when the boost ends.
pub trait PriorityScheduler {
    /// Current base priority of `thread`
    fn priority(&self, thread: ThreadId) -> Priority;

    /// Raise the effective priority of `thread` to at least `priority`.
    fn raise(&self, thread: ThreadId, priority: Priority);

    /// Drop any boost applied to `thread`.
    fn restore(&self, thread: ThreadId);
}
