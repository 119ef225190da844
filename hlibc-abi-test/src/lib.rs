//! ABI Compatibility Testing for hlibc
//!
//! This crate checks that the Rust types handed to newlib have the layout the
//! C side expects. Compile-time checks use the macros below; the tests in
//! `tests/` compare against a C reference compiled by `build.rs`.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

use core::mem::{align_of, size_of};

/// Fail the build unless `$rust_type` is `$expected_size` bytes
#[macro_export]
macro_rules! verify_size {
    ($rust_type:ty, $expected_size:expr) => {
        const _: () = {
            const SIZE: usize = ::core::mem::size_of::<$rust_type>();
            const EXPECTED: usize = $expected_size;

            assert!(SIZE == EXPECTED, "Size mismatch");
        };
    };
}

/// Fail the build unless `$field` sits at `$expected_offset` in `$type`
#[macro_export]
macro_rules! verify_offset {
    ($type:ty, $field:ident, $expected_offset:expr) => {
        const _: () = {
            use memoffset::offset_of;
            const OFFSET: usize = offset_of!($type, $field);
            const EXPECTED: usize = $expected_offset;

            assert!(OFFSET == EXPECTED, "Offset mismatch");
        };
    };
}

#[macro_export]
macro_rules! verify_align {
    ($type:ty, $expected_align:expr) => {
        const _: () = {
            const ALIGN: usize = ::core::mem::align_of::<$type>();
            const EXPECTED: usize = $expected_align;

            assert!(ALIGN == EXPECTED, "Alignment mismatch");
        };
    };
}

/// Size and alignment of a Rust type next to its C counterpart
#[derive(Debug, PartialEq, Eq)]
pub struct LayoutCheck {
    pub type_name: &'static str,
    pub rust_size: usize,
    pub rust_align: usize,
    pub c_size: usize,
    pub c_align: usize,
}

impl LayoutCheck {
    pub fn of<T>(type_name: &'static str, c_size: usize, c_align: usize) -> Self {
        Self {
            type_name,
            rust_size: size_of::<T>(),
            rust_align: align_of::<T>(),
            c_size,
            c_align,
        }
    }

    pub fn is_compatible(&self) -> bool {
        self.rust_size == self.c_size && self.rust_align == self.c_align
    }
}

// The 32-bit newlib target and the host agree on these: every field is an
// `int` or `uint32_t`.
verify_size!(hlibc_compat::pthread_mutexattr_t, 24);
verify_size!(hlibc_compat::pthread_barrierattr_t, 8);
verify_size!(hlibc_compat::pthread_attr_t, 8);
verify_size!(hlibc_compat::pthread_mutex_t, 16);
verify_size!(hlibc_compat::pthread_barrier_t, 28);
verify_align!(hlibc_compat::pthread_mutex_t, 4);
verify_offset!(hlibc_compat::pthread_attr_t, affinity, 4);
verify_offset!(hlibc_compat::pthread_mutexattr_t, type_, 16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_check() {
        let check = LayoutCheck::of::<u32>("uint32_t", 4, 4);
        assert!(check.is_compatible());

        let check = LayoutCheck::of::<u64>("uint32_t", 4, 4);
        assert!(!check.is_compatible());
    }
}
