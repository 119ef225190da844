//! Priority-aware mutex
//!
//! Layered over [`RawMutex`]: the futex state machine is untouched, the
//! protocol only tells the scheduler whom to boost and when to stop.

use core::hint::spin_loop;
use core::sync::atomic::{fence, AtomicU32, Ordering};

use hlibc_core::{Priority, PriorityScheduler, SyncKernel, ThreadId};
use hlibc_ffi::{Error, Result};
use tracing::trace;

use crate::mutex::{Acquisition, MutexKind, RawMutex, NO_OWNER};

/// `PTHREAD_PRIO_*`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PriorityProtocol {
    None,
    /// The holder runs at the highest priority among its waiters.
    Inherit,
    /// The holder runs at the given ceiling.
    Protect(Priority),
}

#[derive(Debug)]
pub struct PriorityMutex {
    raw: RawMutex,
    protocol: PriorityProtocol,
    /// Highest priority that boosted the current holder
    inherited: AtomicU32,
    /// Thread carrying this mutex's boost, or [`NO_OWNER`]
    boosted: AtomicU32,
}

impl PriorityMutex {
    pub const fn new(kind: MutexKind, protocol: PriorityProtocol) -> Self {
        Self {
            raw: RawMutex::new(kind),
            protocol,
            inherited: AtomicU32::new(0),
            boosted: AtomicU32::new(NO_OWNER),
        }
    }

    pub fn protocol(&self) -> PriorityProtocol {
        self.protocol
    }

    pub fn raw(&self) -> &RawMutex {
        &self.raw
    }

    /// Thread currently boosted on behalf of this mutex
    pub fn boosted(&self) -> Option<ThreadId> {
        match self.boosted.load(Ordering::Acquire) {
            NO_OWNER => None,
            tid => Some(ThreadId(tid)),
        }
    }

    pub fn lock<K>(&self, kernel: &K) -> Result<()>
    where
        K: SyncKernel + PriorityScheduler + ?Sized,
    {
        let me = kernel.current_thread();
        match self.protocol {
            PriorityProtocol::None => self.raw.lock(kernel),
            PriorityProtocol::Inherit => {
                let mine = kernel.priority(me);
                self.raw
                    .acquire(kernel, |owner| self.boost_holder(kernel, owner, mine))
                    .map(|_| ())
            }
            PriorityProtocol::Protect(ceiling) => {
                if kernel.priority(me) > ceiling {
                    return Err(Error::InvalidArgument);
                }
                if self.raw.acquire(kernel, |_| {})? == Acquisition::Fresh {
                    self.boosted.store(me.0, Ordering::Release);
                    kernel.raise(me, ceiling);
                }
                Ok(())
            }
        }
    }

    pub fn trylock<K>(&self, kernel: &K) -> Result<()>
    where
        K: SyncKernel + PriorityScheduler + ?Sized,
    {
        let me = kernel.current_thread();
        if let PriorityProtocol::Protect(ceiling) = self.protocol {
            if kernel.priority(me) > ceiling {
                return Err(Error::InvalidArgument);
            }
            if self.raw.trylock(kernel)? == Acquisition::Fresh {
                self.boosted.store(me.0, Ordering::Release);
                kernel.raise(me, ceiling);
            }
            return Ok(());
        }
        self.raw.trylock(kernel).map(|_| ())
    }

    pub fn unlock<K>(&self, kernel: &K) -> Result<()>
    where
        K: SyncKernel + PriorityScheduler + ?Sized,
    {
        self.raw
            .release(kernel, || {
                // Pairs with the fence in `boost_holder`: either this swap sees
                // the waiter's record, or the waiter sees the cleared owner.
                fence(Ordering::SeqCst);
                self.inherited.store(0, Ordering::Release);
                let boosted = self.boosted.swap(NO_OWNER, Ordering::AcqRel);
                if boosted != NO_OWNER {
                    kernel.restore(ThreadId(boosted));
                }
            })
            .map(|_| ())
    }

    /// Raise the holder to at least `mine` before the caller sleeps.
    ///
    /// The boost only stands if the same thread still holds the mutex and its
    /// release has not already consumed the record; otherwise it is undone
    /// and the current holder, if any, is boosted instead.
    fn boost_holder<K>(&self, kernel: &K, mut owner: Option<ThreadId>, mine: Priority)
    where
        K: SyncKernel + PriorityScheduler + ?Sized,
    {
        loop {
            let Some(holder) = owner else {
                // Between the CAS and the owner store, or mid-release.
                if !self.raw.is_locked() {
                    return;
                }
                spin_loop();
                owner = self.raw.owner();
                continue;
            };

            let top = self.inherited.fetch_max(mine.0, Ordering::AcqRel).max(mine.0);
            trace!(owner = holder.0, priority = top, "inheriting priority");
            self.boosted.store(holder.0, Ordering::Release);
            kernel.raise(holder, Priority(top));

            fence(Ordering::SeqCst);
            owner = self.raw.owner();
            if owner == Some(holder) && self.boosted.load(Ordering::Acquire) == holder.0 {
                return;
            }

            trace!(owner = holder.0, "holder released during boost");
            kernel.restore(holder);
        }
    }

    pub fn destroy(&self) -> Result<()> {
        self.raw.destroy()
    }
}
