//! Mapped-memory allocation
//!
//! Decodes the packed `<sys/mman.h>` protection and flag words into
//! [`MapOptions`], and drives the kernel mapping syscall through
//! [`MemoryMapper`].

#![cfg_attr(not(test), no_std)]

pub mod mapper;
pub mod options;

pub use mapper::*;
pub use options::*;
