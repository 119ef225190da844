//! Mapping tests through `mmap`/`munmap` and a dedicated host kernel

use std::ptr::{self, NonNull};

use hlibc_compat::{
    mmap, munmap, MAP_ANONYMOUS, MAP_CACHEABILITY, MAP_DMA, MAP_FAILED, MAP_PRIVATE, PROT_READ,
    PROT_WRITE,
};
use hlibc_core::{MappingSyscall, PhysAddr};
use hlibc_ffi::{Errno, Error};
use hlibc_host::{HostConfig, HostKernel};
use hlibc_mm::{MapOptions, MemoryMapper, Protection};
use hlibc_test_framework::spawn_contenders;
use serial_test::serial;

const RW: i32 = PROT_READ | PROT_WRITE;
const ANON: i32 = MAP_PRIVATE | MAP_ANONYMOUS;

fn kernel_with(page_size: usize, memory_limit: usize) -> HostKernel {
    let config = HostConfig {
        page_size,
        memory_limit,
        ..HostConfig::default()
    };
    HostKernel::new(&config).expect("valid host config")
}

#[test]
#[serial]
fn test_mmap_munmap_round_trip() {
    let page = hlibc_host::global().page_size();
    unsafe {
        for len in [1, page - 1, page, page + 1, 10 * page] {
            let addr = mmap(ptr::null_mut(), len, RW, ANON, -1, 0);
            assert_ne!(addr, MAP_FAILED, "mmap({len})");
            assert_eq!(addr as usize % page, 0);

            let bytes = std::slice::from_raw_parts_mut(addr.cast::<u8>(), len);
            assert!(bytes.iter().all(|&b| b == 0));
            bytes.fill(0x5a);

            assert_eq!(munmap(addr, len.div_ceil(page) * page), 0);
        }
    }
}

#[test]
#[serial]
fn test_dma_mapping_through_c() {
    unsafe {
        let flags = ANON | MAP_DMA | MAP_CACHEABILITY(2);
        let addr = mmap(ptr::null_mut(), 3 * 4096, RW, flags, -1, 0);
        assert_ne!(addr, MAP_FAILED);

        let base = NonNull::new(addr.cast::<u8>()).expect("mapped");
        let global = hlibc_host::global();
        let info = global.mapping().region_info(base).expect("recorded");
        assert_eq!(info.cache_policy.raw(), 2);

        let phys = global.physical_address(base).expect("DMA region has a physical address");
        let last = NonNull::new(addr.cast::<u8>().add(3 * 4096 - 1)).expect("mapped");
        assert_eq!(global.physical_address(last), Some(phys.add(3 * 4096 - 1)));

        assert_eq!(munmap(addr, 3 * 4096), 0);
    }
}

#[test]
fn test_dma_regions_are_disjoint() {
    let kernel = kernel_with(4096, 1 << 20);
    let mapper = MemoryMapper::new(&kernel);
    let options = MapOptions::anonymous(Protection::READ | Protection::WRITE).dma();

    let regions: Vec<_> = (0..8)
        .map(|_| mapper.mmap(8192, options).expect("dma map"))
        .collect();
    let mut spans: Vec<(u64, u64)> = regions
        .iter()
        .map(|r| {
            let PhysAddr(start) = r.physical_address.expect("physical address");
            (start, start + r.length as u64)
        })
        .collect();
    spans.sort_unstable();
    assert!(spans.windows(2).all(|w| w[0].1 <= w[1].0), "overlap in {spans:?}");

    for region in regions {
        mapper.munmap(region.address, region.length).expect("unmap");
    }
    assert_eq!(kernel.mapping().in_use(), 0);
}

#[test]
fn test_memory_limit_is_enforced_and_recovered() {
    let kernel = kernel_with(4096, 4 * 4096);
    let mapper = MemoryMapper::new(&kernel);
    let options = MapOptions::anonymous(Protection::READ);

    let held: Vec<_> = (0..4).map(|_| mapper.mmap(4096, options).expect("map")).collect();
    assert_eq!(mapper.mmap(1, options).unwrap_err(), Error::OutOfMemory);
    assert_eq!(Error::OutOfMemory.to_errno(), Errno::ENOMEM.to_errno());

    let first = held[0];
    mapper.munmap(first.address, first.length).expect("unmap");
    let again = mapper.mmap(4096, options).expect("space was returned");
    mapper.munmap(again.address, again.length).expect("unmap");

    for region in &held[1..] {
        mapper.munmap(region.address, region.length).expect("unmap");
    }
    assert_eq!(kernel.mapping().region_count(), 0);
}

#[test]
fn test_concurrent_mapping() {
    let kernel = std::sync::Arc::new(kernel_with(4096, 64 << 20));
    let shared = kernel.clone();
    spawn_contenders(8, move |index| {
        let mapper = MemoryMapper::new(&*shared);
        let options = MapOptions::anonymous(Protection::READ | Protection::WRITE);
        for round in 0..200 {
            let len = 4096 * (1 + (index + round) % 4);
            let region = mapper.mmap(len, options).expect("map");
            unsafe { region.address.as_ptr().write(index as u8) };
            mapper.munmap(region.address, region.length).expect("unmap");
        }
    });
    assert_eq!(kernel.mapping().in_use(), 0);
}

#[test]
fn test_unmap_requires_exact_region() {
    let kernel = kernel_with(4096, 1 << 20);
    let mapper = MemoryMapper::new(&kernel);
    let region = mapper
        .mmap(2 * 4096, MapOptions::anonymous(Protection::READ))
        .expect("map");

    assert_eq!(mapper.munmap(region.address, 4096), Err(Error::InvalidArgument));
    mapper.munmap(region.address, region.length).expect("unmap");
    assert_eq!(mapper.munmap(region.address, region.length), Err(Error::InvalidArgument));
}
