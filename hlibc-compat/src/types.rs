//! newlib type definitions
//!
//! C names for the shim's core types.

use hlibc_core::{CpuSet, ThreadId};
use static_assertions::assert_eq_size;

/// `pthread_t`: the kernel thread id
pub type pthread_t = u32;

/// `cpu_set_t { uint32_t __bits; }`
pub type cpu_set_t = CpuSet;

assert_eq_size!(pthread_t, ThreadId);
assert_eq_size!(cpu_set_t, u32);
