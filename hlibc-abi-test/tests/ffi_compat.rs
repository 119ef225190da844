//! FFI Layer Compatibility Tests
//!
//! Verify that errno values and pthread constants match newlib

// Links the C reference library built by build.rs.
extern crate hlibc_abi_test;

use hlibc_compat::{
    PTHREAD_BARRIER_SERIAL_THREAD, PTHREAD_CREATE_DETACHED, PTHREAD_CREATE_JOINABLE,
    PTHREAD_MUTEX_DEFAULT, PTHREAD_MUTEX_ERRORCHECK, PTHREAD_MUTEX_NORMAL,
    PTHREAD_MUTEX_RECURSIVE,
};
use hlibc_ffi::{Errno, Error};
use static_assertions::*;

extern "C" {
    static VERIFY_EPERM: i32;
    static VERIFY_EAGAIN: i32;
    static VERIFY_ENOMEM: i32;
    static VERIFY_EBUSY: i32;
    static VERIFY_EINVAL: i32;
    static VERIFY_EDEADLK: i32;
    static VERIFY_ENOSYS: i32;
    static VERIFY_ENOTSUP: i32;

    static VERIFY_PTHREAD_BARRIER_SERIAL_THREAD: i32;
    static VERIFY_PTHREAD_MUTEX_NORMAL: i32;
    static VERIFY_PTHREAD_MUTEX_RECURSIVE: i32;
    static VERIFY_PTHREAD_MUTEX_ERRORCHECK: i32;
    static VERIFY_PTHREAD_MUTEX_DEFAULT: i32;
    static VERIFY_PTHREAD_CREATE_DETACHED: i32;
    static VERIFY_PTHREAD_CREATE_JOINABLE: i32;
}

assert_eq_size!(Errno, i32);

#[test]
fn test_errno_values_vs_newlib() {
    unsafe {
        assert_eq!(Errno::EPERM.to_errno(), VERIFY_EPERM);
        assert_eq!(Errno::EAGAIN.to_errno(), VERIFY_EAGAIN);
        assert_eq!(Errno::ENOMEM.to_errno(), VERIFY_ENOMEM);
        assert_eq!(Errno::EBUSY.to_errno(), VERIFY_EBUSY);
        assert_eq!(Errno::EINVAL.to_errno(), VERIFY_EINVAL);
        assert_eq!(Errno::EDEADLK.to_errno(), VERIFY_EDEADLK, "newlib EDEADLK is 45, not Linux's 35");
        assert_eq!(Errno::ENOSYS.to_errno(), VERIFY_ENOSYS);
        assert_eq!(Errno::ENOTSUP.to_errno(), VERIFY_ENOTSUP);
    }
}

#[test]
fn test_error_taxonomy_to_newlib() {
    unsafe {
        assert_eq!(Error::WouldDeadlock.to_errno(), VERIFY_EDEADLK);
        assert_eq!(Error::NotOwner.to_errno(), VERIFY_EPERM);
        assert_eq!(Error::NotLocked.to_errno(), VERIFY_EPERM);
        assert_eq!(Error::Busy.to_errno(), VERIFY_EBUSY);
        assert_eq!(Error::AlreadyInitialized.to_errno(), VERIFY_EBUSY);
        assert_eq!(Error::NotInitialized.to_errno(), VERIFY_EINVAL);
        assert_eq!(Error::InvalidArgument.to_errno(), VERIFY_EINVAL);
        assert_eq!(Error::NotSupported.to_errno(), VERIFY_ENOTSUP);
        assert_eq!(Error::OutOfMemory.to_errno(), VERIFY_ENOMEM);
        assert_eq!(Error::Again.to_errno(), VERIFY_EAGAIN);
    }
}

#[test]
fn test_pthread_constants_vs_newlib() {
    unsafe {
        assert_eq!(PTHREAD_BARRIER_SERIAL_THREAD, VERIFY_PTHREAD_BARRIER_SERIAL_THREAD);
        assert_eq!(PTHREAD_MUTEX_NORMAL, VERIFY_PTHREAD_MUTEX_NORMAL);
        assert_eq!(PTHREAD_MUTEX_RECURSIVE, VERIFY_PTHREAD_MUTEX_RECURSIVE);
        assert_eq!(PTHREAD_MUTEX_ERRORCHECK, VERIFY_PTHREAD_MUTEX_ERRORCHECK);
        assert_eq!(PTHREAD_MUTEX_DEFAULT, VERIFY_PTHREAD_MUTEX_DEFAULT);
        assert_eq!(PTHREAD_CREATE_DETACHED, VERIFY_PTHREAD_CREATE_DETACHED);
        assert_eq!(PTHREAD_CREATE_JOINABLE, VERIFY_PTHREAD_CREATE_JOINABLE);
    }
}
