//! newlib C ABI adapter
//!
//! This crate is the boundary between newlib's `<pthread.h>` and
//! `<sys/mman.h>` declarations and the Rust synchronization and mapping
//! layers. It translates between the two without constraining either side.
//!
//! # Architecture
//!
//! ```text
//! newlib / application C code
//!      ↓
//! hlibc-compat (this crate): C types, errno conventions
//!      ↓
//! hlibc-sync, hlibc-mm
//!      ↓
//! platform: micro-kernel syscalls, or the hlibc-host simulation
//! ```
//!
//! Entry points carry their C names only with the `c-abi` feature.

#![cfg_attr(not(any(test, feature = "host")), no_std)]
#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]

pub mod error;
pub mod mman;
pub mod platform;
pub mod pthread;
pub mod types;

pub use error::{result_to_errno, result_to_status};
pub use mman::*;
pub use platform::{platform, Platform};
pub use pthread::*;
pub use types::*;
