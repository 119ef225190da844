//! Thread identity and errno for host threads

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

use hlibc_core::ThreadId;
use hlibc_ffi::c_int;

static NEXT_TID: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static TID: ThreadId = ThreadId(NEXT_TID.fetch_add(1, Ordering::Relaxed));
    static ERRNO: Cell<c_int> = const { Cell::new(0) };
}

/// Id of the calling thread, assigned on first use and stable for its lifetime
pub fn current() -> ThreadId {
    TID.with(|tid| *tid)
}

pub fn errno() -> c_int {
    ERRNO.with(Cell::get)
}

pub fn set_errno(value: c_int) {
    ERRNO.with(|errno| errno.set(value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ids_are_per_thread() {
        let here = current();
        assert_eq!(here, current());
        let there = thread::spawn(current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_errno_is_per_thread() {
        set_errno(22);
        let other = thread::spawn(errno).join().unwrap();
        assert_eq!(other, 0);
        assert_eq!(errno(), 22);
    }
}
