//! Structured mapping options
//!
//! The C interface packs everything into two integers. Requests are decoded
//! into [`MapOptions`] as soon as they cross into Rust and only re-encoded
//! when handed to the kernel.

use bitflags::bitflags;
use hlibc_ffi::{c_int, off_t, Error, Result};
use static_assertions::const_assert_eq;

bitflags! {
    /// `PROT_*`; the empty set is `PROT_NONE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
    }
}

bitflags! {
    /// `MAP_*` flag bits, excluding the cache policy field in bits 9..=15.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapFlags: u32 {
        const PRIVATE = 1 << 0;
        const SHARED = 1 << 1;
        const ANONYMOUS = 1 << 2;
        /// Map at a caller-chosen physical address.
        const FIXED_PADDR = 1 << 3;
        /// Physically contiguous backing.
        const DMA = 1 << 4;
        /// Bits 9..=15 carry a cache policy.
        const CACHEABILITY = 1 << 8;
    }
}

/// Position of the cache policy field
pub const CACHE_POLICY_SHIFT: u32 = 9;
/// Mask of the cache policy field in a flags word
pub const CACHE_POLICY_MASK: u32 = 0x7f << CACHE_POLICY_SHIFT;

const_assert_eq!(CACHE_POLICY_MASK, 0xfe00);

/// `MAP_CACHEABILITY(x)`
pub const fn cacheability(policy: u32) -> u32 {
    MapFlags::CACHEABILITY.bits() | ((policy & 0x7f) << CACHE_POLICY_SHIFT)
}

/// Architecture-defined 7-bit cache policy
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CachePolicy(u8);

impl CachePolicy {
    pub const MAX: u8 = 0x7f;

    /// `None` if `raw` does not fit in seven bits
    pub const fn new(raw: u8) -> Option<Self> {
        if raw > Self::MAX {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// Physical layout of the backing pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contiguity {
    Normal,
    /// One physically contiguous run, usable for DMA.
    DmaContiguous,
}

/// Cache policy used when a request does not name one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDefaults {
    pub normal: CachePolicy,
    pub dma: CachePolicy,
}

impl CacheDefaults {
    pub fn for_contiguity(&self, contiguity: Contiguity) -> CachePolicy {
        match contiguity {
            Contiguity::Normal => self.normal,
            Contiguity::DmaContiguous => self.dma,
        }
    }
}

impl Default for CacheDefaults {
    /// Write-back (1) for normal memory, uncached (0) for DMA buffers.
    fn default() -> Self {
        Self {
            normal: CachePolicy(1),
            dma: CachePolicy(0),
        }
    }
}

/// A decoded `mmap` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOptions {
    pub protection: Protection,
    pub contiguity: Contiguity,
    /// Explicit policy; `None` defers to [`CacheDefaults`].
    pub cache_policy: Option<CachePolicy>,
}

impl MapOptions {
    /// Anonymous, private, normal memory with the default cache policy
    pub const fn anonymous(protection: Protection) -> Self {
        Self {
            protection,
            contiguity: Contiguity::Normal,
            cache_policy: None,
        }
    }

    pub const fn dma(mut self) -> Self {
        self.contiguity = Contiguity::DmaContiguous;
        self
    }

    pub const fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    /// Decode the arguments of a C `mmap` call.
    ///
    /// Only anonymous memory exists: a request without `MAP_ANONYMOUS` is
    /// file-backed and unsupported, and an anonymous one must pass `fd = -1`
    /// and `off = 0`.
    pub fn decode(prot: c_int, flags: c_int, fd: c_int, off: off_t) -> Result<Self> {
        let options = Self::from_raw(prot as u32, flags as u32)?;
        if fd != -1 || off != 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(options)
    }

    /// Decode packed protection and flag words.
    pub fn from_raw(prot: u32, flags: u32) -> Result<Self> {
        let protection = Protection::from_bits(prot).ok_or(Error::InvalidArgument)?;
        let map_flags =
            MapFlags::from_bits(flags & !CACHE_POLICY_MASK).ok_or(Error::NotSupported)?;

        if !map_flags.contains(MapFlags::ANONYMOUS) {
            return Err(Error::NotSupported);
        }
        if map_flags.intersects(MapFlags::SHARED | MapFlags::FIXED_PADDR) {
            return Err(Error::NotSupported);
        }

        let policy_bits = (flags & CACHE_POLICY_MASK) >> CACHE_POLICY_SHIFT;
        let cache_policy = if map_flags.contains(MapFlags::CACHEABILITY) {
            Some(CachePolicy(policy_bits as u8))
        } else if policy_bits != 0 {
            // A policy without the presence bit is not a valid encoding.
            return Err(Error::NotSupported);
        } else {
            None
        };

        let contiguity = if map_flags.contains(MapFlags::DMA) {
            Contiguity::DmaContiguous
        } else {
            Contiguity::Normal
        };

        Ok(Self {
            protection,
            contiguity,
            cache_policy,
        })
    }

    /// Packed `(prot, flags)` for the kernel
    pub fn encode(&self) -> (u32, u32) {
        let mut flags = MapFlags::PRIVATE | MapFlags::ANONYMOUS;
        if self.contiguity == Contiguity::DmaContiguous {
            flags |= MapFlags::DMA;
        }
        let mut raw = flags.bits();
        if let Some(policy) = self.cache_policy {
            raw |= cacheability(policy.raw() as u32);
        }
        (self.protection.bits(), raw)
    }

    pub fn effective_cache_policy(&self, defaults: &CacheDefaults) -> CachePolicy {
        self.cache_policy
            .unwrap_or_else(|| defaults.for_contiguity(self.contiguity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ANON: c_int = (MapFlags::PRIVATE.bits() | MapFlags::ANONYMOUS.bits()) as c_int;

    #[test]
    fn test_cacheability_macro() {
        assert_eq!(cacheability(0), 0x100);
        assert_eq!(cacheability(0x7f), 0xff00);
        assert_eq!(cacheability(0x80), 0x100);
        assert_eq!(cacheability(5), 0x100 | (5 << 9));
    }

    #[test]
    fn test_cache_policy_range() {
        assert_eq!(CachePolicy::new(0x7f).map(CachePolicy::raw), Some(0x7f));
        assert_eq!(CachePolicy::new(0x80), None);
    }

    #[test]
    fn test_decode_plain_anonymous() {
        let options = MapOptions::decode(3, ANON, -1, 0).unwrap();
        assert_eq!(options.protection, Protection::READ | Protection::WRITE);
        assert_eq!(options.contiguity, Contiguity::Normal);
        assert_eq!(options.cache_policy, None);
    }

    #[test]
    fn test_private_is_optional() {
        let flags = MapFlags::ANONYMOUS.bits() as c_int;
        assert!(MapOptions::decode(0, flags, -1, 0).is_ok());
    }

    #[test]
    fn test_decode_rejections() {
        // file-backed
        let private = MapFlags::PRIVATE.bits() as c_int;
        assert_eq!(MapOptions::decode(1, private, 3, 0), Err(Error::NotSupported));
        // anonymous with a descriptor or offset
        assert_eq!(MapOptions::decode(1, ANON, 3, 0), Err(Error::InvalidArgument));
        assert_eq!(MapOptions::decode(1, ANON, -1, 4096), Err(Error::InvalidArgument));
        // shared and fixed physical address
        let shared = ANON | MapFlags::SHARED.bits() as c_int;
        assert_eq!(MapOptions::decode(1, shared, -1, 0), Err(Error::NotSupported));
        let fixed = ANON | MapFlags::FIXED_PADDR.bits() as c_int;
        assert_eq!(MapOptions::decode(1, fixed, -1, 0), Err(Error::NotSupported));
        // unknown bits
        assert_eq!(MapOptions::decode(1, ANON | 1 << 20, -1, 0), Err(Error::NotSupported));
        assert_eq!(MapOptions::decode(8, ANON, -1, 0), Err(Error::InvalidArgument));
        // policy without presence bit
        assert_eq!(MapOptions::decode(1, ANON | 3 << 9, -1, 0), Err(Error::NotSupported));
    }

    #[test]
    fn test_dma_defaults() {
        let flags = ANON | MapFlags::DMA.bits() as c_int;
        let options = MapOptions::decode(3, flags, -1, 0).unwrap();
        assert_eq!(options.contiguity, Contiguity::DmaContiguous);

        let defaults = CacheDefaults::default();
        assert_eq!(options.effective_cache_policy(&defaults), defaults.dma);
        assert_eq!(
            MapOptions::anonymous(Protection::READ).effective_cache_policy(&defaults),
            defaults.normal
        );
    }

    #[test]
    fn test_explicit_policy_overrides_default() {
        let flags = ANON | MapFlags::DMA.bits() as c_int | cacheability(0x42) as c_int;
        let options = MapOptions::decode(1, flags, -1, 0).unwrap();
        assert_eq!(options.cache_policy, CachePolicy::new(0x42));
        assert_eq!(
            options.effective_cache_policy(&CacheDefaults::default()).raw(),
            0x42
        );
    }

    fn arb_options() -> impl Strategy<Value = MapOptions> {
        (0u32..8, any::<bool>(), proptest::option::of(0u8..=0x7f)).prop_map(
            |(prot, dma, policy)| {
                let mut options = MapOptions::anonymous(Protection::from_bits_truncate(prot));
                if dma {
                    options = options.dma();
                }
                match policy.and_then(CachePolicy::new) {
                    Some(policy) => options.with_cache_policy(policy),
                    None => options,
                }
            },
        )
    }

    proptest! {
        #[test]
        fn encoded_options_decode_to_themselves(options in arb_options()) {
            let (prot, flags) = options.encode();
            prop_assert_eq!(MapOptions::from_raw(prot, flags), Ok(options));
        }

        #[test]
        fn cacheability_field_round_trips(policy in 0u32..=0x7f) {
            let flags = MapFlags::ANONYMOUS.bits() | cacheability(policy);
            let options = MapOptions::from_raw(0, flags).unwrap();
            prop_assert_eq!(options.cache_policy.map(|p| p.raw() as u32), Some(policy));
        }
    }
}
