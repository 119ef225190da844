//! Userspace stand-in for the micro-kernel
//!
//! [`HostKernel`] implements every collaborator trait of `hlibc-core` on top
//! of std threads and the host allocator, so the shim can be exercised in an
//! ordinary test process.

pub mod config;
pub mod futex;
pub mod logging;
pub mod mapping;
pub mod scheduler;
pub mod thread;

use std::ptr::NonNull;
use std::sync::atomic::AtomicU32;
use std::sync::OnceLock;

use hlibc_core::{
    CurrentThread, ErrnoSlot, FutexChannel, MappingSyscall, PhysAddr, Priority,
    PriorityScheduler, ThreadId, WakeCount,
};
use hlibc_ffi::{c_int, Result};
use tracing::{info, warn};

pub use config::{CacheConfig, ConfigError, HostConfig};
pub use futex::ParkingTable;
pub use logging::init_tracing;
pub use mapping::{HostMapping, RegionInfo};
pub use scheduler::HostScheduler;

/// Simulated kernel
#[derive(Default)]
pub struct HostKernel {
    futex: ParkingTable,
    mapping: HostMapping,
    scheduler: HostScheduler,
}

impl HostKernel {
    pub fn new(config: &HostConfig) -> std::result::Result<Self, ConfigError> {
        let defaults = config.cache_defaults()?;
        config.validate()?;
        Ok(Self {
            futex: ParkingTable::new(),
            mapping: HostMapping::new(
                config.page_size,
                config.memory_limit,
                config.dma_base,
                defaults,
            ),
            scheduler: HostScheduler::default(),
        })
    }

    pub fn futex(&self) -> &ParkingTable {
        &self.futex
    }

    pub fn mapping(&self) -> &HostMapping {
        &self.mapping
    }

    pub fn set_priority(&self, thread: ThreadId, priority: Priority) {
        self.scheduler.set_priority(thread, priority);
    }

    pub fn effective_priority(&self, thread: ThreadId) -> Priority {
        self.scheduler.effective_priority(thread)
    }

    /// errno of the calling thread
    pub fn errno(&self) -> c_int {
        thread::errno()
    }
}

impl FutexChannel for HostKernel {
    fn wait(&self, word: &AtomicU32, expected: u32) {
        self.futex.wait(word, expected);
    }

    fn wake(&self, word: &AtomicU32, count: WakeCount) -> usize {
        self.futex.wake(word, count)
    }
}

impl CurrentThread for HostKernel {
    fn current_thread(&self) -> ThreadId {
        thread::current()
    }
}

impl MappingSyscall for HostKernel {
    fn page_size(&self) -> usize {
        self.mapping.page_size()
    }

    fn map(&self, len: usize, prot: u32, flags: u32) -> Result<NonNull<u8>> {
        self.mapping.map(len, prot, flags)
    }

    fn unmap(&self, addr: NonNull<u8>, len: usize) -> Result<()> {
        self.mapping.unmap(addr, len)
    }

    fn physical_address(&self, addr: NonNull<u8>) -> Option<PhysAddr> {
        self.mapping.physical_address(addr)
    }
}

impl ErrnoSlot for HostKernel {
    fn set_errno(&self, errno: c_int) {
        thread::set_errno(errno);
    }
}

impl PriorityScheduler for HostKernel {
    fn priority(&self, thread: ThreadId) -> Priority {
        self.scheduler.priority(thread)
    }

    fn raise(&self, thread: ThreadId, priority: Priority) {
        self.scheduler.raise(thread, priority);
    }

    fn restore(&self, thread: ThreadId) {
        self.scheduler.restore(thread);
    }
}

static GLOBAL: OnceLock<HostKernel> = OnceLock::new();

/// Process-wide kernel used by the C entry points on host builds.
///
/// Configured from [`HostConfig::load`] on first use; an unusable
/// configuration falls back to the defaults.
pub fn global() -> &'static HostKernel {
    GLOBAL.get_or_init(|| {
        let config = HostConfig::load(None).unwrap_or_else(|err| {
            warn!(%err, "host kernel config rejected, using defaults");
            HostConfig::default()
        });
        info!(page_size = config.page_size, memory_limit = config.memory_limit, "host kernel up");
        HostKernel::new(&config).unwrap_or_default()
    })
}
