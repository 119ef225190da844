//! `<pthread.h>`: mutexes, barriers and thread attributes
//!
//! Pointers come straight from C. A null pointer or an attribute object that
//! was never initialized is reported as `EINVAL`; everything else is handed to
//! `hlibc-sync` and its error translated with [`result_to_errno`].

use core::mem::size_of;

use hlibc_ffi::{c_int, c_uint, size_t, Errno, Error};
use hlibc_sync::{BarrierWaitResult, MutexKind, RawBarrier, RawMutex};
use static_assertions::assert_eq_size;
use tracing::warn;

use crate::error::result_to_errno;
use crate::platform::platform;
use crate::types::cpu_set_t;

pub const PTHREAD_CREATE_DETACHED: c_int = 0;
pub const PTHREAD_CREATE_JOINABLE: c_int = 1;

pub const PTHREAD_MUTEX_NORMAL: c_int = 0;
pub const PTHREAD_MUTEX_RECURSIVE: c_int = 1;
pub const PTHREAD_MUTEX_ERRORCHECK: c_int = 2;
pub const PTHREAD_MUTEX_DEFAULT: c_int = 3;

pub const PTHREAD_PROCESS_PRIVATE: c_int = 0;
pub const PTHREAD_PROCESS_SHARED: c_int = 1;

pub const PTHREAD_PRIO_NONE: c_int = 0;
pub const PTHREAD_PRIO_INHERIT: c_int = 1;
pub const PTHREAD_PRIO_PROTECT: c_int = 2;

/// Returned by `pthread_barrier_wait` to exactly one thread per round
pub const PTHREAD_BARRIER_SERIAL_THREAD: c_int = -1;

pub type pthread_mutex_t = RawMutex;
pub type pthread_barrier_t = RawBarrier;

pub const PTHREAD_MUTEX_INITIALIZER: pthread_mutex_t = RawMutex::INITIALIZER;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct pthread_mutexattr_t {
    pub is_initialized: c_int,
    pub process_shared: c_int,
    pub prio_ceiling: c_int,
    pub protocol: c_int,
    pub type_: c_int,
    pub recursive: c_int,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct pthread_barrierattr_t {
    pub is_initialized: c_int,
    pub process_shared: c_int,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct pthread_attr_t {
    pub detachstate: c_int,
    pub affinity: cpu_set_t,
}

assert_eq_size!(pthread_mutexattr_t, [c_int; 6]);
assert_eq_size!(pthread_barrierattr_t, [c_int; 2]);
assert_eq_size!(pthread_attr_t, [u32; 2]);

const EINVAL: c_int = Errno::EINVAL as c_int;
const ENOTSUP: c_int = Errno::ENOTSUP as c_int;

fn check_pshared(pshared: c_int) -> c_int {
    match pshared {
        PTHREAD_PROCESS_PRIVATE => 0,
        PTHREAD_PROCESS_SHARED => {
            warn!("process-shared synchronization objects are not supported");
            ENOTSUP
        }
        _ => EINVAL,
    }
}

/// Initialized attribute object behind `attr`, if any
unsafe fn mutexattr<'a>(attr: *const pthread_mutexattr_t) -> Option<&'a pthread_mutexattr_t> {
    attr.as_ref().filter(|a| a.is_initialized != 0)
}

unsafe fn mutexattr_mut<'a>(attr: *mut pthread_mutexattr_t) -> Option<&'a mut pthread_mutexattr_t> {
    attr.as_mut().filter(|a| a.is_initialized != 0)
}

// ---------------------------------------------------------------------------
// Mutex attributes
// ---------------------------------------------------------------------------

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_init(attr: *mut pthread_mutexattr_t) -> c_int {
    let Some(attr) = attr.as_mut() else {
        return EINVAL;
    };
    *attr = pthread_mutexattr_t {
        is_initialized: 1,
        process_shared: PTHREAD_PROCESS_PRIVATE,
        prio_ceiling: 0,
        protocol: PTHREAD_PRIO_NONE,
        type_: PTHREAD_MUTEX_DEFAULT,
        recursive: 0,
    };
    0
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_destroy(attr: *mut pthread_mutexattr_t) -> c_int {
    match mutexattr_mut(attr) {
        Some(attr) => {
            attr.is_initialized = 0;
            0
        }
        None => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_settype(attr: *mut pthread_mutexattr_t, kind: c_int) -> c_int {
    let Some(attr) = mutexattr_mut(attr) else {
        return EINVAL;
    };
    match u32::try_from(kind).map_err(|_| Error::InvalidArgument).and_then(MutexKind::from_raw) {
        Ok(parsed) => {
            attr.type_ = kind;
            attr.recursive = (parsed == MutexKind::Recursive) as c_int;
            0
        }
        Err(e) => e.to_errno(),
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_gettype(attr: *const pthread_mutexattr_t, kind: *mut c_int) -> c_int {
    match (mutexattr(attr), kind.as_mut()) {
        (Some(attr), Some(kind)) => {
            *kind = attr.type_;
            0
        }
        _ => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_setpshared(attr: *mut pthread_mutexattr_t, pshared: c_int) -> c_int {
    let Some(attr) = mutexattr_mut(attr) else {
        return EINVAL;
    };
    let rc = check_pshared(pshared);
    if rc == 0 {
        attr.process_shared = pshared;
    }
    rc
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_getpshared(attr: *const pthread_mutexattr_t, pshared: *mut c_int) -> c_int {
    match (mutexattr(attr), pshared.as_mut()) {
        (Some(attr), Some(pshared)) => {
            *pshared = attr.process_shared;
            0
        }
        _ => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_setprotocol(attr: *mut pthread_mutexattr_t, protocol: c_int) -> c_int {
    let Some(attr) = mutexattr_mut(attr) else {
        return EINVAL;
    };
    match protocol {
        PTHREAD_PRIO_NONE => {
            attr.protocol = protocol;
            0
        }
        PTHREAD_PRIO_INHERIT | PTHREAD_PRIO_PROTECT => {
            warn!(protocol, "priority protocols are not available through the C interface");
            ENOTSUP
        }
        _ => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_getprotocol(attr: *const pthread_mutexattr_t, protocol: *mut c_int) -> c_int {
    match (mutexattr(attr), protocol.as_mut()) {
        (Some(attr), Some(protocol)) => {
            *protocol = attr.protocol;
            0
        }
        _ => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_setprioceiling(attr: *mut pthread_mutexattr_t, ceiling: c_int) -> c_int {
    match mutexattr_mut(attr) {
        Some(attr) if ceiling >= 0 => {
            attr.prio_ceiling = ceiling;
            0
        }
        _ => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutexattr_getprioceiling(attr: *const pthread_mutexattr_t, ceiling: *mut c_int) -> c_int {
    match (mutexattr(attr), ceiling.as_mut()) {
        (Some(attr), Some(ceiling)) => {
            *ceiling = attr.prio_ceiling;
            0
        }
        _ => EINVAL,
    }
}

// ---------------------------------------------------------------------------
// Mutex
// ---------------------------------------------------------------------------

/// A null `attr` selects a default (normal) mutex.
#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutex_init(mutex: *mut pthread_mutex_t, attr: *const pthread_mutexattr_t) -> c_int {
    let Some(mutex) = mutex.as_ref() else {
        return EINVAL;
    };
    let kind = if attr.is_null() {
        MutexKind::Normal
    } else {
        let Some(attr) = mutexattr(attr) else {
            return EINVAL;
        };
        match u32::try_from(attr.type_).map_err(|_| Error::InvalidArgument).and_then(MutexKind::from_raw) {
            Ok(kind) => kind,
            Err(e) => return e.to_errno(),
        }
    };
    result_to_errno(mutex.init(kind))
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutex_destroy(mutex: *mut pthread_mutex_t) -> c_int {
    match mutex.as_ref() {
        Some(mutex) => result_to_errno(mutex.destroy()),
        None => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutex_lock(mutex: *mut pthread_mutex_t) -> c_int {
    match mutex.as_ref() {
        Some(mutex) => result_to_errno(mutex.lock(platform())),
        None => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutex_trylock(mutex: *mut pthread_mutex_t) -> c_int {
    match mutex.as_ref() {
        Some(mutex) => result_to_errno(mutex.trylock(platform())),
        None => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_mutex_unlock(mutex: *mut pthread_mutex_t) -> c_int {
    match mutex.as_ref() {
        Some(mutex) => result_to_errno(mutex.unlock(platform())),
        None => EINVAL,
    }
}

// ---------------------------------------------------------------------------
// Barrier attributes
// ---------------------------------------------------------------------------

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_barrierattr_init(attr: *mut pthread_barrierattr_t) -> c_int {
    let Some(attr) = attr.as_mut() else {
        return EINVAL;
    };
    *attr = pthread_barrierattr_t {
        is_initialized: 1,
        process_shared: PTHREAD_PROCESS_PRIVATE,
    };
    0
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_barrierattr_destroy(attr: *mut pthread_barrierattr_t) -> c_int {
    match attr.as_mut().filter(|a| a.is_initialized != 0) {
        Some(attr) => {
            attr.is_initialized = 0;
            0
        }
        None => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_barrierattr_setpshared(attr: *mut pthread_barrierattr_t, pshared: c_int) -> c_int {
    let Some(attr) = attr.as_mut().filter(|a| a.is_initialized != 0) else {
        return EINVAL;
    };
    let rc = check_pshared(pshared);
    if rc == 0 {
        attr.process_shared = pshared;
    }
    rc
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_barrierattr_getpshared(attr: *const pthread_barrierattr_t, pshared: *mut c_int) -> c_int {
    match (attr.as_ref().filter(|a| a.is_initialized != 0), pshared.as_mut()) {
        (Some(attr), Some(pshared)) => {
            *pshared = attr.process_shared;
            0
        }
        _ => EINVAL,
    }
}

// ---------------------------------------------------------------------------
// Barrier
// ---------------------------------------------------------------------------

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_barrier_init(
    barrier: *mut pthread_barrier_t,
    attr: *const pthread_barrierattr_t,
    count: c_uint,
) -> c_int {
    let Some(barrier) = barrier.as_ref() else {
        return EINVAL;
    };
    if !attr.is_null() && attr.as_ref().map_or(true, |a| a.is_initialized == 0) {
        return EINVAL;
    }
    result_to_errno(barrier.init(count))
}

/// Returns [`PTHREAD_BARRIER_SERIAL_THREAD`] to one participant, `0` to the
/// others.
#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_barrier_wait(barrier: *mut pthread_barrier_t) -> c_int {
    let Some(barrier) = barrier.as_ref() else {
        return EINVAL;
    };
    match barrier.wait(platform()) {
        Ok(BarrierWaitResult::Serial) => PTHREAD_BARRIER_SERIAL_THREAD,
        Ok(BarrierWaitResult::Waiter) => 0,
        Err(e) => e.to_errno(),
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_barrier_destroy(barrier: *mut pthread_barrier_t) -> c_int {
    match barrier.as_ref() {
        Some(barrier) => result_to_errno(barrier.destroy(platform())),
        None => EINVAL,
    }
}

// ---------------------------------------------------------------------------
// Thread attributes
// ---------------------------------------------------------------------------

/// Joinable, with an empty affinity set (no restriction).
#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_attr_init(attr: *mut pthread_attr_t) -> c_int {
    let Some(attr) = attr.as_mut() else {
        return EINVAL;
    };
    *attr = pthread_attr_t {
        detachstate: PTHREAD_CREATE_JOINABLE,
        affinity: cpu_set_t::new(),
    };
    0
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_attr_destroy(attr: *mut pthread_attr_t) -> c_int {
    if attr.is_null() {
        return EINVAL;
    }
    0
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_attr_setdetachstate(attr: *mut pthread_attr_t, state: c_int) -> c_int {
    match (attr.as_mut(), state) {
        (Some(attr), PTHREAD_CREATE_DETACHED | PTHREAD_CREATE_JOINABLE) => {
            attr.detachstate = state;
            0
        }
        _ => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_attr_getdetachstate(attr: *const pthread_attr_t, state: *mut c_int) -> c_int {
    match (attr.as_ref(), state.as_mut()) {
        (Some(attr), Some(state)) => {
            *state = attr.detachstate;
            0
        }
        _ => EINVAL,
    }
}

/// `cpusetsize` must cover a whole `cpu_set_t`.
#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_attr_setaffinity_np(
    attr: *mut pthread_attr_t,
    cpusetsize: size_t,
    cpuset: *const cpu_set_t,
) -> c_int {
    match (attr.as_mut(), cpuset.as_ref()) {
        (Some(attr), Some(cpuset)) if cpusetsize >= size_of::<cpu_set_t>() => {
            attr.affinity = *cpuset;
            0
        }
        _ => EINVAL,
    }
}

#[cfg_attr(feature = "c-abi", no_mangle)]
pub unsafe extern "C" fn pthread_attr_getaffinity_np(
    attr: *const pthread_attr_t,
    cpusetsize: size_t,
    cpuset: *mut cpu_set_t,
) -> c_int {
    match (attr.as_ref(), cpuset.as_mut()) {
        (Some(attr), Some(cpuset)) if cpusetsize >= size_of::<cpu_set_t>() => {
            *cpuset = attr.affinity;
            0
        }
        _ => EINVAL,
    }
}
