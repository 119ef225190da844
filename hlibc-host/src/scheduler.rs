//! Priority bookkeeping for host threads

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use hlibc_core::{Priority, PriorityScheduler, ThreadId};
use tracing::trace;

#[derive(Debug, Default)]
struct Priorities {
    base: HashMap<ThreadId, Priority>,
    boost: HashMap<ThreadId, Priority>,
}

/// Records base priorities and the boosts applied by priority mutexes
#[derive(Debug, Default)]
pub struct HostScheduler {
    inner: Mutex<Priorities>,
}

impl HostScheduler {
    pub fn set_priority(&self, thread: ThreadId, priority: Priority) {
        self.with(|p| {
            p.base.insert(thread, priority);
        });
    }

    /// Base priority raised by any active boost
    pub fn effective_priority(&self, thread: ThreadId) -> Priority {
        self.with(|p| {
            let base = p.base.get(&thread).copied().unwrap_or_default();
            p.boost.get(&thread).map_or(base, |&boost| boost.max(base))
        })
    }

    fn with<R>(&self, f: impl FnOnce(&mut Priorities) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl PriorityScheduler for HostScheduler {
    fn priority(&self, thread: ThreadId) -> Priority {
        self.with(|p| p.base.get(&thread).copied().unwrap_or_default())
    }

    fn raise(&self, thread: ThreadId, priority: Priority) {
        trace!(tid = thread.0, priority = priority.0, "raise");
        self.with(|p| {
            let boost = p.boost.entry(thread).or_insert(priority);
            *boost = (*boost).max(priority);
        });
    }

    fn restore(&self, thread: ThreadId) {
        trace!(tid = thread.0, "restore");
        self.with(|p| {
            p.boost.remove(&thread);
        });
    }
}
