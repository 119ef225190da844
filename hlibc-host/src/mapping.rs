//! Simulated mapping syscall backed by the host allocator

use std::alloc::{self, Layout};
use std::collections::BTreeMap;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hlibc_core::{MappingSyscall, PhysAddr};
use hlibc_ffi::{Error, Result};
use hlibc_mm::{CacheDefaults, CachePolicy, Contiguity, MapOptions, Protection};
use tracing::{debug, warn};

/// What the simulated kernel recorded for a live mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    pub length: usize,
    pub protection: Protection,
    pub contiguity: Contiguity,
    /// Policy after applying the kernel's defaults
    pub cache_policy: CachePolicy,
    pub physical_address: Option<PhysAddr>,
}

#[derive(Debug, Default)]
struct MappingState {
    regions: BTreeMap<usize, RegionInfo>,
    in_use: usize,
    next_phys: u64,
}

/// Zeroed, page-aligned heap allocations standing in for mapped pages
#[derive(Debug)]
pub struct HostMapping {
    page_size: usize,
    memory_limit: usize,
    dma_base: u64,
    defaults: CacheDefaults,
    state: Mutex<MappingState>,
}

impl HostMapping {
    pub fn new(page_size: usize, memory_limit: usize, dma_base: u64, defaults: CacheDefaults) -> Self {
        Self {
            page_size,
            memory_limit,
            dma_base,
            defaults,
            state: Mutex::new(MappingState::default()),
        }
    }

    /// Record for the mapping starting exactly at `addr`
    pub fn region_info(&self, addr: NonNull<u8>) -> Option<RegionInfo> {
        self.state().regions.get(&(addr.as_ptr() as usize)).copied()
    }

    /// Bytes currently mapped
    pub fn in_use(&self) -> usize {
        self.state().in_use
    }

    pub fn region_count(&self) -> usize {
        self.state().regions.len()
    }

    fn layout(&self, len: usize) -> Result<Layout> {
        Layout::from_size_align(len, self.page_size).map_err(|_| Error::InvalidArgument)
    }

    fn state(&self) -> MutexGuard<'_, MappingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HostMapping {
    fn default() -> Self {
        let config = crate::HostConfig::default();
        HostMapping::new(
            config.page_size,
            config.memory_limit,
            config.dma_base,
            CacheDefaults::default(),
        )
    }
}

impl MappingSyscall for HostMapping {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn map(&self, len: usize, prot: u32, flags: u32) -> Result<NonNull<u8>> {
        if len == 0 || len % self.page_size != 0 {
            return Err(Error::InvalidArgument);
        }
        let options = MapOptions::from_raw(prot, flags)?;
        let layout = self.layout(len)?;

        let mut state = self.state();
        if state.in_use.saturating_add(len) > self.memory_limit {
            warn!(len, in_use = state.in_use, limit = self.memory_limit, "mapping over memory limit");
            return Err(Error::OutOfMemory);
        }

        let physical_address = match options.contiguity {
            Contiguity::Normal => None,
            Contiguity::DmaContiguous => {
                let phys = PhysAddr(self.dma_base)
                    .checked_add(state.next_phys)
                    .filter(|phys| phys.checked_add(len as u64).is_some())
                    .ok_or_else(|| {
                        warn!(len, dma_base = self.dma_base, "DMA physical range exhausted");
                        Error::OutOfMemory
                    })?;
                Some(phys)
            }
        };

        // SAFETY: `layout` has a non-zero size.
        let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or(Error::OutOfMemory)?;
        if physical_address.is_some() {
            state.next_phys += len as u64;
        }
        let info = RegionInfo {
            length: len,
            protection: options.protection,
            contiguity: options.contiguity,
            cache_policy: options.effective_cache_policy(&self.defaults),
            physical_address,
        };
        state.regions.insert(ptr.as_ptr() as usize, info);
        state.in_use += len;

        debug!(address = ?ptr, len, ?info.contiguity, "host map");
        Ok(ptr)
    }

    fn unmap(&self, addr: NonNull<u8>, len: usize) -> Result<()> {
        let key = addr.as_ptr() as usize;
        let mut state = self.state();
        match state.regions.get(&key) {
            Some(info) if info.length == len => {}
            _ => return Err(Error::InvalidArgument),
        }
        state.regions.remove(&key);
        state.in_use -= len;

        let layout = self.layout(len)?;
        // SAFETY: the region was allocated in `map` with this exact layout.
        unsafe { alloc::dealloc(addr.as_ptr(), layout) };
        debug!(address = ?addr, len, "host unmap");
        Ok(())
    }

    fn physical_address(&self, addr: NonNull<u8>) -> Option<PhysAddr> {
        let addr = addr.as_ptr() as usize;
        let state = self.state();
        let (&base, info) = state.regions.range(..=addr).next_back()?;
        if addr >= base + info.length {
            return None;
        }
        info.physical_address
            .map(|phys| phys.add((addr - base) as u64))
    }
}

impl Drop for HostMapping {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (&base, info) in &state.regions {
            if let (Some(ptr), Ok(layout)) = (
                NonNull::new(base as *mut u8),
                Layout::from_size_align(info.length, self.page_size),
            ) {
                // SAFETY: every recorded region came from `alloc_zeroed` with this layout.
                unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlibc_mm::{cacheability, MapFlags};

    const PAGE: usize = 4096;
    const ANON: u32 = MapFlags::PRIVATE.bits() | MapFlags::ANONYMOUS.bits();

    fn mapping(limit: usize) -> HostMapping {
        HostMapping::new(PAGE, limit, 0x1000_0000, CacheDefaults::default())
    }

    #[test]
    fn test_map_zeroed_and_aligned() {
        let host = mapping(1 << 20);
        let ptr = host.map(2 * PAGE, 3, ANON).unwrap();
        assert_eq!(ptr.as_ptr() as usize % PAGE, 0);

        // SAFETY: two freshly mapped pages.
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 2 * PAGE) };
        assert!(bytes.iter().all(|&b| b == 0));

        assert_eq!(host.in_use(), 2 * PAGE);
        host.unmap(ptr, 2 * PAGE).unwrap();
        assert_eq!(host.in_use(), 0);
    }

    #[test]
    fn test_memory_limit() {
        let host = mapping(2 * PAGE);
        let a = host.map(2 * PAGE, 3, ANON).unwrap();
        assert_eq!(host.map(PAGE, 3, ANON), Err(Error::OutOfMemory));
        host.unmap(a, 2 * PAGE).unwrap();
        assert!(host.map(PAGE, 3, ANON).is_ok());
    }

    #[test]
    fn test_unmap_must_match_region() {
        let host = mapping(1 << 20);
        let ptr = host.map(2 * PAGE, 3, ANON).unwrap();
        assert_eq!(host.unmap(ptr, PAGE), Err(Error::InvalidArgument));
        host.unmap(ptr, 2 * PAGE).unwrap();
        assert_eq!(host.unmap(ptr, 2 * PAGE), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_dma_range_exhaustion() {
        let host = HostMapping::new(PAGE, 1 << 20, u64::MAX - PAGE as u64, CacheDefaults::default());
        let dma = ANON | MapFlags::DMA.bits();

        assert_eq!(host.map(2 * PAGE, 3, dma), Err(Error::OutOfMemory));
        assert_eq!(host.in_use(), 0);

        let last = host.map(PAGE, 3, dma).unwrap();
        assert_eq!(host.physical_address(last), Some(PhysAddr(u64::MAX - PAGE as u64)));
        assert_eq!(host.map(PAGE, 3, dma), Err(Error::OutOfMemory));
        assert!(host.map(PAGE, 3, ANON).is_ok());
    }

    #[test]
    fn test_dma_physical_addresses() {
        let host = mapping(1 << 20);
        let dma = ANON | MapFlags::DMA.bits();
        let a = host.map(PAGE, 3, dma).unwrap();
        let b = host.map(2 * PAGE, 3, dma).unwrap();
        let plain = host.map(PAGE, 3, ANON).unwrap();

        assert_eq!(host.physical_address(a), Some(PhysAddr(0x1000_0000)));
        assert_eq!(host.physical_address(b), Some(PhysAddr(0x1000_0000 + PAGE as u64)));
        assert_eq!(host.physical_address(plain), None);

        // Interior addresses resolve to the same contiguous run.
        let interior = NonNull::new(b.as_ptr().wrapping_add(PAGE + 16)).unwrap();
        assert_eq!(
            host.physical_address(interior),
            Some(PhysAddr(0x1000_0000 + 2 * PAGE as u64 + 16))
        );
    }

    #[test]
    fn test_region_info_records_policy() {
        let host = mapping(1 << 20);
        let ptr = host.map(PAGE, 1, ANON | cacheability(0x21)).unwrap();
        let info = host.region_info(ptr).unwrap();
        assert_eq!(info.cache_policy.raw(), 0x21);
        assert_eq!(info.protection, Protection::READ);

        let dma = host.map(PAGE, 1, ANON | MapFlags::DMA.bits()).unwrap();
        assert_eq!(host.region_info(dma).unwrap().cache_policy, CacheDefaults::default().dma);
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let host = mapping(1 << 20);
        assert_eq!(host.map(0, 3, ANON), Err(Error::InvalidArgument));
        assert_eq!(host.map(100, 3, ANON), Err(Error::InvalidArgument));
    }
}
