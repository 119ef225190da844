//! Test framework for the hlibc shim
//!
//! Runs the `no_std` synchronization and mapping layers on real threads
//! against the simulated kernel in `hlibc-host`.

pub mod helpers;

pub use helpers::{errno_named, spawn_contenders, wait_until};
