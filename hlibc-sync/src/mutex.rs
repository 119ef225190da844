//! Futex-backed mutex
//!
//! `RawMutex` is the storage behind `pthread_mutex_t`. All blocking happens in
//! [`FutexChannel::wait`] on the futex word; the owner, recursion depth and
//! attribute cells are only written by the thread holding the mutex (or by
//! `init`/`destroy`, which require exclusive use by contract).

use core::sync::atomic::{AtomicU32, Ordering};

use hlibc_core::{SyncKernel, ThreadId, WakeCount};
use hlibc_ffi::{Error, Result};
use static_assertions::assert_eq_size;
use tracing::trace;

use crate::futex::{FutexState, FutexWord};

/// Owner value while the mutex is free
pub const NO_OWNER: u32 = u32::MAX;

const INITIALIZED: u32 = 1 << 31;
const KIND_MASK: u32 = 0xff;

/// Mutex type, fixed at init
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MutexKind {
    /// Relocking by the owner reports `WouldDeadlock`.
    Normal = 0,
    Recursive = 1,
    ErrorCheck = 2,
}

impl MutexKind {
    /// Decode a `PTHREAD_MUTEX_*` type value. `PTHREAD_MUTEX_DEFAULT` (3) is
    /// a normal mutex.
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            0 | 3 => Ok(MutexKind::Normal),
            1 => Ok(MutexKind::Recursive),
            2 => Ok(MutexKind::ErrorCheck),
            _ => Err(Error::InvalidArgument),
        }
    }
}

/// How a successful lock was obtained
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// The caller took the futex word.
    Fresh,
    /// A recursive owner bumped its depth.
    Reentered,
}

/// Futex mutex
#[repr(C)]
#[derive(Debug)]
pub struct RawMutex {
    word: FutexWord,
    owner: AtomicU32,
    depth: AtomicU32,
    attr: AtomicU32,
}

assert_eq_size!(RawMutex, [u32; 4]);

impl RawMutex {
    /// Static initializer, a normal unlocked mutex
    pub const INITIALIZER: Self = Self::new(MutexKind::Normal);

    /// An initialized, unlocked mutex
    pub const fn new(kind: MutexKind) -> Self {
        Self {
            word: FutexWord::new(),
            owner: AtomicU32::new(NO_OWNER),
            depth: AtomicU32::new(0),
            attr: AtomicU32::new(INITIALIZED | kind as u32),
        }
    }

    /// Storage that every operation except `init` rejects
    pub const fn uninit() -> Self {
        Self {
            word: FutexWord::new(),
            owner: AtomicU32::new(NO_OWNER),
            depth: AtomicU32::new(0),
            attr: AtomicU32::new(0),
        }
    }

    pub fn init(&self, kind: MutexKind) -> Result<()> {
        if self.attr.load(Ordering::Acquire) & INITIALIZED != 0 {
            return Err(Error::AlreadyInitialized);
        }
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.depth.store(0, Ordering::Relaxed);
        self.word.release();
        self.attr.store(INITIALIZED | kind as u32, Ordering::Release);
        Ok(())
    }

    pub fn kind(&self) -> Result<MutexKind> {
        let attr = self.attr.load(Ordering::Acquire);
        if attr & INITIALIZED == 0 {
            return Err(Error::NotInitialized);
        }
        match attr & KIND_MASK {
            1 => Ok(MutexKind::Recursive),
            2 => Ok(MutexKind::ErrorCheck),
            _ => Ok(MutexKind::Normal),
        }
    }

    /// Current holder, if any
    pub fn owner(&self) -> Option<ThreadId> {
        match self.owner.load(Ordering::Relaxed) {
            NO_OWNER => None,
            tid => Some(ThreadId(tid)),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.word.load() != FutexState::Unlocked
    }

    /// Recursion depth; zero unless a recursive mutex is held
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> FutexState {
        self.word.load()
    }

    pub fn lock<K: SyncKernel + ?Sized>(&self, kernel: &K) -> Result<()> {
        self.acquire(kernel, |_| {}).map(|_| ())
    }

    /// `lock` with a hook run before every futex wait.
    ///
    /// The hook receives the holder observed at that moment, which the
    /// priority layer uses to boost it.
    pub fn acquire<K, F>(&self, kernel: &K, mut before_wait: F) -> Result<Acquisition>
    where
        K: SyncKernel + ?Sized,
        F: FnMut(Option<ThreadId>),
    {
        let kind = self.kind()?;
        let me = kernel.current_thread();

        if self.is_owned_by(me) {
            return self.relock(kind);
        }

        if let Err(seen) = self.word.try_acquire() {
            trace!(tid = me.0, ?seen, "mutex contended");
            while self.word.contend() != FutexState::Unlocked {
                before_wait(self.owner());
                kernel.wait(self.word.as_atomic(), FutexState::Contended.as_raw());
            }
        }

        self.take_ownership(me, kind);
        Ok(Acquisition::Fresh)
    }

    pub fn trylock<K: SyncKernel + ?Sized>(&self, kernel: &K) -> Result<Acquisition> {
        let kind = self.kind()?;
        let me = kernel.current_thread();

        if self.is_owned_by(me) {
            return match kind {
                MutexKind::Recursive => self.relock(kind),
                _ => Err(Error::Busy),
            };
        }

        self.word.try_acquire().map_err(|_| Error::Busy)?;
        self.take_ownership(me, kind);
        Ok(Acquisition::Fresh)
    }

    pub fn unlock<K: SyncKernel + ?Sized>(&self, kernel: &K) -> Result<()> {
        self.release(kernel, || {}).map(|_| ())
    }

    /// `unlock` with a hook run once the owner is cleared, just before the
    /// futex word is released.
    ///
    /// Returns `false` when a recursive owner only dropped one level.
    pub fn release<K, F>(&self, kernel: &K, before_release: F) -> Result<bool>
    where
        K: SyncKernel + ?Sized,
        F: FnOnce(),
    {
        let kind = self.kind()?;
        let me = kernel.current_thread();

        if self.word.load() == FutexState::Unlocked {
            return Err(Error::NotLocked);
        }
        if kind != MutexKind::Normal && !self.is_owned_by(me) {
            return Err(Error::NotOwner);
        }

        if kind == MutexKind::Recursive {
            let depth = self.depth.load(Ordering::Relaxed);
            assert!(depth != 0, "recursive mutex held with zero depth");
            if depth > 1 {
                self.depth.store(depth - 1, Ordering::Relaxed);
                return Ok(false);
            }
        }

        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.depth.store(0, Ordering::Relaxed);
        before_release();

        match self.word.release() {
            FutexState::Unlocked => Err(Error::NotLocked),
            FutexState::Locked => Ok(true),
            FutexState::Contended => {
                trace!(tid = me.0, "mutex release wakes a waiter");
                kernel.wake(self.word.as_atomic(), WakeCount::One);
                Ok(true)
            }
        }
    }

    /// Invalidate the mutex. Fails with `Busy` while it is held.
    pub fn destroy(&self) -> Result<()> {
        self.kind()?;
        if self.is_locked() {
            return Err(Error::Busy);
        }
        self.attr.store(0, Ordering::Release);
        Ok(())
    }

    /// Lock and return a guard that unlocks on drop
    pub fn guard<'a, K: SyncKernel + ?Sized>(
        &'a self,
        kernel: &'a K,
    ) -> Result<RawMutexGuard<'a, K>> {
        self.lock(kernel)?;
        Ok(RawMutexGuard {
            mutex: self,
            kernel,
        })
    }

    fn is_owned_by(&self, me: ThreadId) -> bool {
        self.owner.load(Ordering::Relaxed) == me.0
    }

    fn relock(&self, kind: MutexKind) -> Result<Acquisition> {
        match kind {
            MutexKind::Recursive => {
                let depth = self
                    .depth
                    .load(Ordering::Relaxed)
                    .checked_add(1)
                    .ok_or(Error::Again)?;
                self.depth.store(depth, Ordering::Relaxed);
                Ok(Acquisition::Reentered)
            }
            MutexKind::Normal | MutexKind::ErrorCheck => Err(Error::WouldDeadlock),
        }
    }

    fn take_ownership(&self, me: ThreadId, kind: MutexKind) {
        self.owner.store(me.0, Ordering::Relaxed);
        if kind == MutexKind::Recursive {
            self.depth.store(1, Ordering::Relaxed);
        }
    }
}

/// Holds a [`RawMutex`] until dropped
pub struct RawMutexGuard<'a, K: SyncKernel + ?Sized> {
    mutex: &'a RawMutex,
    kernel: &'a K,
}

impl<'a, K: SyncKernel + ?Sized> Drop for RawMutexGuard<'a, K> {
    fn drop(&mut self) {
        if let Err(err) = self.mutex.unlock(self.kernel) {
            panic!("guarded mutex failed to unlock: {err}");
        }
    }
}
