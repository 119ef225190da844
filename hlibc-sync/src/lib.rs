//! Futex-based synchronization primitives
//!
//! The mutex and barrier behind newlib's `pthread_mutex_t` and
//! `pthread_barrier_t`. Blocking goes through the kernel's futex wait/wake,
//! reached via [`hlibc_core::FutexChannel`].

#![cfg_attr(not(test), no_std)]

pub mod barrier;
pub mod futex;
pub mod mutex;
pub mod priority;

pub use barrier::*;
pub use futex::*;
pub use mutex::*;
pub use priority::*;
