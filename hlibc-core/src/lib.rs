//! Core shim types and kernel interfaces
//!
//! This crate provides the fundamental types shared by the synchronization and
//! memory layers, and the traits through which they reach the kernel.

#![cfg_attr(not(test), no_std)]

pub mod kernel;
pub mod types;

pub use kernel::*;
pub use types::*;
