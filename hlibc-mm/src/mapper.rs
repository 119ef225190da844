//! `mmap`/`munmap` over the kernel mapping syscall

use core::ptr::NonNull;

use hlibc_core::{MappingSyscall, PhysAddr};
use hlibc_ffi::{Error, Result};
use tracing::{debug, warn};

use crate::options::{CacheDefaults, CachePolicy, Contiguity, MapOptions, Protection};

/// A mapping handed out by [`MemoryMapper::mmap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRegion {
    pub address: NonNull<u8>,
    /// Page-rounded length
    pub length: usize,
    pub protection: Protection,
    pub contiguity: Contiguity,
    pub cache_policy: CachePolicy,
    /// Set iff the region is DMA contiguous
    pub physical_address: Option<PhysAddr>,
}

pub struct MemoryMapper<S> {
    syscall: S,
    defaults: CacheDefaults,
}

impl<S: MappingSyscall> MemoryMapper<S> {
    pub fn new(syscall: S) -> Self {
        Self::with_defaults(syscall, CacheDefaults::default())
    }

    pub fn with_defaults(syscall: S, defaults: CacheDefaults) -> Self {
        Self { syscall, defaults }
    }

    pub fn syscall(&self) -> &S {
        &self.syscall
    }

    pub fn page_size(&self) -> usize {
        self.syscall.page_size()
    }

    /// Round `len` up to a whole number of pages.
    pub fn round_to_pages(&self, len: usize) -> Result<usize> {
        if len == 0 {
            return Err(Error::InvalidArgument);
        }
        let page = self.page_size();
        len.checked_add(page - 1)
            .map(|padded| padded & !(page - 1))
            .ok_or(Error::OutOfMemory)
    }

    /// Map `len` bytes. The address hint of the C call is advisory and not
    /// part of the request.
    pub fn mmap(&self, len: usize, options: MapOptions) -> Result<MappedRegion> {
        let length = self.round_to_pages(len)?;
        let (prot, flags) = options.encode();

        let address = self.syscall.map(length, prot, flags).map_err(|err| {
            warn!(length, prot, flags, %err, "kernel refused mapping");
            err
        })?;

        let physical_address = match options.contiguity {
            Contiguity::Normal => None,
            Contiguity::DmaContiguous => match self.syscall.physical_address(address) {
                Some(phys) => Some(phys),
                None => {
                    warn!(address = ?address, length, "DMA mapping has no physical address");
                    if let Err(err) = self.syscall.unmap(address, length) {
                        warn!(address = ?address, length, %err, "failed to undo DMA mapping");
                    }
                    return Err(Error::OutOfMemory);
                }
            },
        };
        let region = MappedRegion {
            address,
            length,
            protection: options.protection,
            contiguity: options.contiguity,
            cache_policy: options.effective_cache_policy(&self.defaults),
            physical_address,
        };
        debug!(
            address = ?region.address,
            length,
            contiguity = ?region.contiguity,
            cache_policy = region.cache_policy.raw(),
            "mapped region"
        );
        Ok(region)
    }

    /// Release `len` bytes at `addr`.
    pub fn munmap(&self, addr: NonNull<u8>, len: usize) -> Result<()> {
        let page = self.page_size();
        if addr.as_ptr() as usize & (page - 1) != 0 {
            warn!(address = ?addr, "munmap of misaligned address");
            return Err(Error::InvalidArgument);
        }
        let length = self.round_to_pages(len)?;
        self.syscall.unmap(addr, length)?;
        debug!(address = ?addr, length, "unmapped region");
        Ok(())
    }

    /// Physical address behind `addr`, for DMA-contiguous regions only.
    pub fn physical_address(&self, addr: NonNull<u8>) -> Option<PhysAddr> {
        self.syscall.physical_address(addr)
    }
}
