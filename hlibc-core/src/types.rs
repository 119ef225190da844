//! Core shim types

use hlibc_ffi::{Error, Result};
use static_assertions::assert_eq_size;

/// Kernel thread identifier (`pthread_t`)
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

/// Physical address of a DMA-contiguous mapping
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(pub u64);

impl PhysAddr {
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Offset this address by `bytes`
    pub const fn add(self, bytes: u64) -> Self {
        PhysAddr(self.0 + bytes)
    }

    /// Offset this address by `bytes`, or `None` past the top of the
    /// physical address space
    pub const fn checked_add(self, bytes: u64) -> Option<Self> {
        match self.0.checked_add(bytes) {
            Some(addr) => Some(PhysAddr(addr)),
            None => None,
        }
    }
}

/// Number of CPUs a [`CpuSet`] can describe
pub const CPU_SETSIZE: usize = 32;

/// Static CPU affinity set, one bit per CPU (CPU ids 0..=31)
///
/// Matches the C `cpu_set_t { uint32_t __bits; }`.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CpuSet {
    bits: u32,
}

impl CpuSet {
    /// An empty set
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    /// Build a set from its raw bit mask
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// `CPU_ZERO`
    pub fn zero(&mut self) {
        self.bits = 0;
    }

    /// `CPU_SET`
    pub fn set(&mut self, cpu: usize) -> Result<()> {
        self.bits |= Self::bit(cpu)?;
        Ok(())
    }

    /// `CPU_CLR`
    pub fn clear(&mut self, cpu: usize) -> Result<()> {
        self.bits &= !Self::bit(cpu)?;
        Ok(())
    }

    /// `CPU_ISSET`; CPUs outside the set's range are never members.
    pub fn is_set(&self, cpu: usize) -> bool {
        Self::bit(cpu).map_or(false, |bit| self.bits & bit != 0)
    }

    /// `CPU_COUNT`
    pub fn count(&self) -> u32 {
        self.bits.count_ones()
    }

    /// `CPU_AND`
    pub fn and(&self, other: &CpuSet) -> CpuSet {
        CpuSet::from_bits(self.bits & other.bits)
    }

    /// `CPU_OR`
    pub fn or(&self, other: &CpuSet) -> CpuSet {
        CpuSet::from_bits(self.bits | other.bits)
    }

    /// `CPU_XOR`
    pub fn xor(&self, other: &CpuSet) -> CpuSet {
        CpuSet::from_bits(self.bits ^ other.bits)
    }

    fn bit(cpu: usize) -> Result<u32> {
        if cpu >= CPU_SETSIZE {
            return Err(Error::InvalidArgument);
        }
        Ok(1u32 << cpu)
    }
}

assert_eq_size!(ThreadId, u32);
assert_eq_size!(PhysAddr, u64);
assert_eq_size!(CpuSet, u32);
