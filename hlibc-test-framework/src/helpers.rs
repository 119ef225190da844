//! Thread and polling helpers shared by the feature and stress tests

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hlibc_ffi::Errno;

/// Spawn `threads` workers that all run `body` with their index, and join
/// them. Panics in a worker are re-raised here.
pub fn spawn_contenders<F>(threads: usize, body: F)
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let handles: Vec<JoinHandle<()>> = (0..threads)
        .map(|index| {
            let body = Arc::clone(&body);
            thread::spawn(move || body(index))
        })
        .collect();

    for handle in handles {
        if let Err(panic) = handle.join() {
            std::panic::resume_unwind(panic);
        }
    }
}

/// Poll `condition` until it holds. Returns `false` after `timeout`.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::yield_now();
    }
    true
}

/// Parse the errno names used in feature files
pub fn errno_named(name: &str) -> Option<Errno> {
    Some(match name {
        "EPERM" => Errno::EPERM,
        "EAGAIN" => Errno::EAGAIN,
        "ENOMEM" => Errno::ENOMEM,
        "EBUSY" => Errno::EBUSY,
        "EINVAL" => Errno::EINVAL,
        "EDEADLK" => Errno::EDEADLK,
        "ENOSYS" => Errno::ENOSYS,
        "ENOTSUP" => Errno::ENOTSUP,
        _ => return None,
    })
}
