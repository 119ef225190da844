//! `<sys/mman.h>`

use core::ptr::NonNull;

use hlibc_core::ErrnoSlot;
use hlibc_ffi::{c_int, c_void, off_t, size_t, Error};
use hlibc_mm::{cacheability, MapFlags, MapOptions, MemoryMapper, Protection};
use tracing::debug;

use crate::error::result_to_status;
use crate::platform::platform;

pub const PROT_NONE: c_int = 0;
pub const PROT_READ: c_int = Protection::READ.bits() as c_int;
pub const PROT_WRITE: c_int = Protection::WRITE.bits() as c_int;
pub const PROT_EXEC: c_int = Protection::EXEC.bits() as c_int;

/// Accepted for source compatibility; placement is never honoured.
pub const MAP_FIXED: c_int = 0;
pub const MAP_PRIVATE: c_int = MapFlags::PRIVATE.bits() as c_int;
pub const MAP_SHARED: c_int = MapFlags::SHARED.bits() as c_int;
pub const MAP_ANONYMOUS: c_int = MapFlags::ANONYMOUS.bits() as c_int;
pub const MAP_ANON: c_int = MAP_ANONYMOUS;
pub const MAP_FIXED_PADDR: c_int = MapFlags::FIXED_PADDR.bits() as c_int;
pub const MAP_DMA: c_int = MapFlags::DMA.bits() as c_int;

pub const MAP_FAILED: *mut c_void = usize::MAX as *mut c_void;

/// `MAP_CACHEABILITY(x)`: presence bit plus the low seven bits of `x`
pub const fn MAP_CACHEABILITY(policy: c_int) -> c_int {
    cacheability(policy as u32) as c_int
}

/// Map anonymous memory.
///
/// `addr` is a hint and is ignored. On failure returns [`MAP_FAILED`] and sets
/// `errno`.
#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn mmap(
    addr: *mut c_void,
    len: size_t,
    prot: c_int,
    flags: c_int,
    fd: c_int,
    off: off_t,
) -> *mut c_void {
    let kernel = platform();
    let region = MapOptions::decode(prot, flags, fd, off)
        .and_then(|options| MemoryMapper::new(kernel).mmap(len, options));

    match region {
        Ok(region) => {
            debug!(hint = ?addr, address = ?region.address, length = region.length, "mmap");
            region.address.as_ptr().cast::<c_void>()
        }
        Err(e) => {
            kernel.set_errno(e.to_errno());
            MAP_FAILED
        }
    }
}

/// Unmap a region returned by [`mmap`]. Returns `0`, or `-1` with `errno` set.
#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn munmap(addr: *mut c_void, len: size_t) -> c_int {
    let kernel = platform();
    let result = NonNull::new(addr.cast::<u8>())
        .ok_or(Error::InvalidArgument)
        .and_then(|addr| MemoryMapper::new(kernel).munmap(addr, len));
    result_to_status(result, kernel)
}

#[cfg(all(test, not(feature = "kernel")))]
mod tests {
    use super::*;
    use hlibc_core::MappingSyscall;
    use serial_test::serial;

    const ANON: c_int = MAP_PRIVATE | MAP_ANONYMOUS;

    fn errno() -> c_int {
        platform().errno()
    }

    #[test]
    fn test_constants() {
        assert_eq!((PROT_READ, PROT_WRITE, PROT_EXEC), (1, 2, 4));
        assert_eq!((MAP_PRIVATE, MAP_SHARED, MAP_ANONYMOUS), (1, 2, 4));
        assert_eq!((MAP_FIXED_PADDR, MAP_DMA), (8, 16));
        assert_eq!(MAP_CACHEABILITY(3), 0x100 | 3 << 9);
        assert_eq!(MAP_CACHEABILITY(0xff), 0xff00);
        assert_eq!(MAP_FAILED as usize, usize::MAX);
    }

    #[test]
    #[serial]
    fn test_mmap_round_trip() {
        unsafe {
            let addr = mmap(core::ptr::null_mut(), 100, PROT_READ | PROT_WRITE, ANON, -1, 0);
            assert_ne!(addr, MAP_FAILED);
            let page = platform().mapping().page_size();
            assert_eq!(addr as usize % page, 0);

            let bytes = addr.cast::<u8>();
            *bytes.add(99) = 0xa5;
            assert_eq!(*bytes.add(99), 0xa5);

            assert_eq!(munmap(addr, 100), 0);
        }
    }

    #[test]
    #[serial]
    fn test_mmap_failures_set_errno() {
        unsafe {
            assert_eq!(mmap(core::ptr::null_mut(), 0, PROT_READ, ANON, -1, 0), MAP_FAILED);
            assert_eq!(errno(), 22);

            assert_eq!(mmap(core::ptr::null_mut(), 4096, PROT_READ, MAP_PRIVATE, 3, 0), MAP_FAILED);
            assert_eq!(errno(), 134);

            assert_eq!(mmap(core::ptr::null_mut(), 4096, PROT_READ, ANON | MAP_SHARED, -1, 0), MAP_FAILED);
            assert_eq!(errno(), 134);

            assert_eq!(mmap(core::ptr::null_mut(), 4096, PROT_READ, ANON, 5, 0), MAP_FAILED);
            assert_eq!(errno(), 22);
        }
    }

    #[test]
    #[serial]
    fn test_munmap_failures_set_errno() {
        unsafe {
            assert_eq!(munmap(core::ptr::null_mut(), 4096), -1);
            assert_eq!(errno(), 22);
            assert_eq!(munmap(0x1001 as *mut c_void, 4096), -1);
            assert_eq!(errno(), 22);
        }
    }

    #[test]
    #[serial]
    fn test_dma_mapping_records_policy() {
        unsafe {
            let flags = ANON | MAP_DMA | MAP_CACHEABILITY(0x11);
            let addr = mmap(core::ptr::null_mut(), 8192, PROT_READ | PROT_WRITE, flags, -1, 0);
            assert_ne!(addr, MAP_FAILED);

            let ptr = NonNull::new(addr.cast::<u8>()).unwrap();
            let info = platform().mapping().region_info(ptr).unwrap();
            assert_eq!(info.cache_policy.raw(), 0x11);
            assert!(info.physical_address.is_some());

            assert_eq!(munmap(addr, 8192), 0);
        }
    }
}
