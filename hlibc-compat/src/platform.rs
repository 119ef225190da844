//! The kernel the C entry points run against
//!
//! With the `kernel` feature the traits forward to the micro-kernel syscall
//! stubs; otherwise the `host` feature supplies the simulated kernel.

#[cfg(not(any(feature = "kernel", feature = "host")))]
compile_error!("hlibc-compat needs either the `kernel` or the `host` feature");

#[cfg(feature = "kernel")]
pub use self::kernel::KernelSyscalls as Platform;

#[cfg(all(feature = "host", not(feature = "kernel")))]
pub use hlibc_host::HostKernel as Platform;

/// The process-wide kernel handle
#[cfg(feature = "kernel")]
pub fn platform() -> &'static Platform {
    &kernel::KERNEL
}

#[cfg(all(feature = "host", not(feature = "kernel")))]
pub fn platform() -> &'static Platform {
    hlibc_host::global()
}

#[cfg(feature = "kernel")]
mod kernel {
    use core::ptr::NonNull;
    use core::sync::atomic::AtomicU32;

    use hlibc_core::{
        CurrentThread, ErrnoSlot, FutexChannel, MappingSyscall, PhysAddr, ThreadId, WakeCount,
    };
    use hlibc_ffi::syscall;
    use hlibc_ffi::{c_int, c_void, Error, Result};

    /// Forwards every collaborator call to the kernel's syscall stubs
    pub struct KernelSyscalls;

    pub(super) static KERNEL: KernelSyscalls = KernelSyscalls;

    impl FutexChannel for KernelSyscalls {
        fn wait(&self, word: &AtomicU32, expected: u32) {
            // A non-zero return means the word already changed; callers re-check.
            unsafe { syscall::h_futexWait(word.as_ptr(), expected) };
        }

        fn wake(&self, word: &AtomicU32, count: WakeCount) -> usize {
            let woken = unsafe { syscall::h_futexWake(word.as_ptr(), count.as_raw()) };
            woken.max(0) as usize
        }
    }

    impl CurrentThread for KernelSyscalls {
        fn current_thread(&self) -> ThreadId {
            ThreadId(unsafe { syscall::h_getTid() })
        }
    }

    impl MappingSyscall for KernelSyscalls {
        fn page_size(&self) -> usize {
            unsafe { syscall::h_getPageSize() }
        }

        fn map(&self, len: usize, prot: u32, flags: u32) -> Result<NonNull<u8>> {
            let addr = unsafe { syscall::h_mmap(len, prot as c_int, flags as c_int) };
            NonNull::new(addr.cast::<u8>()).ok_or(Error::OutOfMemory)
        }

        fn unmap(&self, addr: NonNull<u8>, len: usize) -> Result<()> {
            match unsafe { syscall::h_munmap(addr.as_ptr().cast::<c_void>(), len) } {
                0 => Ok(()),
                _ => Err(Error::InvalidArgument),
            }
        }

        fn physical_address(&self, addr: NonNull<u8>) -> Option<PhysAddr> {
            match unsafe { syscall::h_getPhysAddr(addr.as_ptr().cast::<c_void>()) } {
                0 => None,
                phys => Some(PhysAddr(phys)),
            }
        }
    }

    impl ErrnoSlot for KernelSyscalls {
        fn set_errno(&self, errno: c_int) {
            unsafe { *syscall::__errno() = errno };
        }
    }
}
