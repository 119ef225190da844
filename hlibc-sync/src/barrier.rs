//! Generation-counted barrier
//!
//! The futex word waiters sleep on is the generation counter itself. A waiter
//! captures the generation under the internal mutex and sleeps until it
//! changes, so a wake aimed at the previous round can never release a thread
//! that has already re-entered the next one.

use core::sync::atomic::{AtomicU32, Ordering};

use hlibc_core::{SyncKernel, WakeCount};
use hlibc_ffi::{Error, Result};
use tracing::trace;

use crate::mutex::{MutexKind, RawMutex};

/// Outcome of [`RawBarrier::wait`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BarrierWaitResult {
    /// Exactly one participant per round gets this (`PTHREAD_BARRIER_SERIAL_THREAD`).
    Serial,
    Waiter,
}

impl BarrierWaitResult {
    pub fn is_serial(self) -> bool {
        self == BarrierWaitResult::Serial
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct RawBarrier {
    lock: RawMutex,
    generation: AtomicU32,
    thread_count: AtomicU32,
    nb_left: AtomicU32,
}

impl RawBarrier {
    /// A barrier for `count` participants
    pub fn new(count: u32) -> Result<Self> {
        let barrier = Self::uninit();
        barrier.init(count)?;
        Ok(barrier)
    }

    pub const fn uninit() -> Self {
        Self {
            lock: RawMutex::new(MutexKind::Normal),
            generation: AtomicU32::new(0),
            thread_count: AtomicU32::new(0),
            nb_left: AtomicU32::new(0),
        }
    }

    pub fn init(&self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidArgument);
        }
        if self.thread_count.load(Ordering::Acquire) != 0 {
            return Err(Error::AlreadyInitialized);
        }
        if self.lock.kind().is_err() {
            self.lock.init(MutexKind::Normal)?;
        }
        self.generation.store(0, Ordering::Relaxed);
        self.nb_left.store(count, Ordering::Relaxed);
        self.thread_count.store(count, Ordering::Release);
        Ok(())
    }

    pub fn thread_count(&self) -> u32 {
        self.thread_count.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Participants still missing from the current round
    pub fn remaining(&self) -> u32 {
        self.nb_left.load(Ordering::Relaxed)
    }

    /// Block until `thread_count` participants have arrived.
    pub fn wait<K: SyncKernel + ?Sized>(&self, kernel: &K) -> Result<BarrierWaitResult> {
        let count = self.thread_count();
        if count == 0 {
            return Err(Error::NotInitialized);
        }

        let guard = self.lock.guard(kernel)?;
        let left = self.nb_left.load(Ordering::Relaxed);
        assert!(left != 0, "barrier arrival count underflow");
        let left = left - 1;

        if left == 0 {
            self.nb_left.store(count, Ordering::Relaxed);
            let released = self.generation.fetch_add(1, Ordering::Release);
            drop(guard);

            trace!(generation = released, count, "barrier released");
            kernel.wake(&self.generation, WakeCount::All);
            return Ok(BarrierWaitResult::Serial);
        }

        self.nb_left.store(left, Ordering::Relaxed);
        let captured = self.generation.load(Ordering::Relaxed);
        drop(guard);

        while self.generation.load(Ordering::Acquire) == captured {
            kernel.wait(&self.generation, captured);
        }
        Ok(BarrierWaitResult::Waiter)
    }

    /// Invalidate the barrier. Fails with `Busy` while a round is in progress.
    pub fn destroy<K: SyncKernel + ?Sized>(&self, kernel: &K) -> Result<()> {
        let count = self.thread_count();
        if count == 0 {
            return Err(Error::NotInitialized);
        }

        let guard = self.lock.guard(kernel)?;
        if self.nb_left.load(Ordering::Relaxed) != count {
            return Err(Error::Busy);
        }
        self.thread_count.store(0, Ordering::Release);
        self.nb_left.store(0, Ordering::Relaxed);
        drop(guard);
        Ok(())
    }
}
