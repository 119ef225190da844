//! FFI compatibility layer between the shim and newlib
//!
//! This crate provides the C scalar types, the newlib errno values and the
//! error taxonomy shared by every other hlibc crate. The kernel entry points
//! are declared in [`syscall`] behind the `kernel` feature.

#![cfg_attr(not(test), no_std)]
#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

use static_assertions::assert_eq_size;

pub use core::ffi::{c_char, c_int, c_long, c_uint, c_void};

#[cfg(feature = "kernel")]
pub mod syscall;

/// `size_t` as seen by newlib
pub type size_t = usize;

/// `off_t` as seen by newlib (`_off_t` is a `long`)
pub type off_t = c_long;

/// Error codes matching newlib's `<sys/errno.h>`
///
/// These are the values a newlib application compares `errno` and pthread
/// return codes against, so they follow newlib rather than the host libc.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Errno {
    EPERM = 1,
    EAGAIN = 11,
    ENOMEM = 12,
    EBUSY = 16,
    EINVAL = 22,
    EDEADLK = 45,
    ENOSYS = 88,
    ENOTSUP = 134,
}

impl Errno {
    /// Positive errno value, as returned by the pthread family
    pub fn to_errno(self) -> c_int {
        self as c_int
    }

    /// Map a raw errno value back to a known code
    pub fn from_raw(raw: c_int) -> Option<Self> {
        Some(match raw {
            1 => Errno::EPERM,
            11 => Errno::EAGAIN,
            12 => Errno::ENOMEM,
            16 => Errno::EBUSY,
            22 => Errno::EINVAL,
            45 => Errno::EDEADLK,
            88 => Errno::ENOSYS,
            134 => Errno::ENOTSUP,
            _ => return None,
        })
    }
}

assert_eq_size!(Errno, i32);

/// Failure kinds reported by the synchronization and mapping layers
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A non-recursive mutex was relocked by its owner.
    #[error("relocking the mutex would deadlock its owner")]
    WouldDeadlock,
    /// Unlock attempted by a thread that does not hold the mutex.
    #[error("the calling thread does not own the mutex")]
    NotOwner,
    /// Unlock attempted on an unlocked mutex.
    #[error("the mutex is not locked")]
    NotLocked,
    /// The object is held or in use.
    #[error("resource busy")]
    Busy,
    #[error("object is not initialized")]
    NotInitialized,
    #[error("object is already initialized")]
    AlreadyInitialized,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("operation not supported")]
    NotSupported,
    #[error("out of memory")]
    OutOfMemory,
    /// A counter (recursion depth) would overflow.
    #[error("resource temporarily unavailable")]
    Again,
}

impl Error {
    /// The newlib errno reported to C callers for this error
    pub fn errno(self) -> Errno {
        match self {
            Error::WouldDeadlock => Errno::EDEADLK,
            Error::NotOwner | Error::NotLocked => Errno::EPERM,
            Error::Busy | Error::AlreadyInitialized => Errno::EBUSY,
            Error::NotInitialized | Error::InvalidArgument => Errno::EINVAL,
            Error::NotSupported => Errno::ENOTSUP,
            Error::OutOfMemory => Errno::ENOMEM,
            Error::Again => Errno::EAGAIN,
        }
    }

    /// Shorthand for `self.errno().to_errno()`
    pub fn to_errno(self) -> c_int {
        self.errno().to_errno()
    }
}

impl From<Error> for Errno {
    fn from(error: Error) -> Self {
        error.errno()
    }
}

/// Result type for shim operations
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(Errno::EDEADLK.to_errno(), 45);
        assert_eq!(Errno::ENOTSUP.to_errno(), 134);
        assert_eq!(Errno::EBUSY.to_errno(), 16);
    }

    #[test]
    fn test_error_to_errno() {
        assert_eq!(Error::WouldDeadlock.errno(), Errno::EDEADLK);
        assert_eq!(Error::NotOwner.errno(), Errno::EPERM);
        assert_eq!(Error::Busy.to_errno(), 16);
        assert_eq!(Error::OutOfMemory.to_errno(), 12);
        assert_eq!(Error::NotSupported.to_errno(), 134);
    }

    #[test]
    fn test_errno_round_trip() {
        for errno in [
            Errno::EPERM,
            Errno::EAGAIN,
            Errno::ENOMEM,
            Errno::EBUSY,
            Errno::EINVAL,
            Errno::EDEADLK,
            Errno::ENOSYS,
            Errno::ENOTSUP,
        ] {
            assert_eq!(Errno::from_raw(errno.to_errno()), Some(errno));
        }
        assert_eq!(Errno::from_raw(9999), None);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::Busy.to_string(), "resource busy");
    }
}
