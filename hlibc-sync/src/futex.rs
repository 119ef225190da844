//! Three-state futex word
//!
//! Every transition of a mutex word goes through [`FutexState::next`]:
//!
//! | event     | from                | to          | caller then           |
//! |-----------|---------------------|-------------|-----------------------|
//! | `Acquire` | `Unlocked`          | `Locked`    | owns the mutex        |
//! | `Contend` | `Unlocked`          | `Contended` | owns the mutex        |
//! | `Contend` | `Locked`/`Contended`| `Contended` | waits on `Contended`  |
//! | `Release` | `Locked`            | `Unlocked`  | returns               |
//! | `Release` | `Contended`         | `Unlocked`  | wakes one waiter      |
//!
//! `Acquire` is a compare-and-set and leaves a held word untouched; the other
//! two are unconditional swaps, so the previous state tells the caller which
//! row applied.

use core::sync::atomic::{AtomicU32, Ordering};

/// Value of a mutex futex word
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FutexState {
    Unlocked = 0,
    /// Held, nobody waiting.
    Locked = 1,
    /// Held, at least one thread may be waiting.
    Contended = 2,
}

/// Events that move a futex word between states
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FutexEvent {
    Acquire,
    Contend,
    Release,
}

impl FutexState {
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Decode a raw word.
    ///
    /// # Panics
    /// On any value outside `{0, 1, 2}`: the word has been corrupted and the
    /// mutex cannot be used safely.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => FutexState::Unlocked,
            1 => FutexState::Locked,
            2 => FutexState::Contended,
            other => panic!("corrupted futex word: {other:#x}"),
        }
    }

    /// The transition table. `None` means the event does not apply in this
    /// state and the word is left as is.
    pub const fn next(self, event: FutexEvent) -> Option<FutexState> {
        match (self, event) {
            (FutexState::Unlocked, FutexEvent::Acquire) => Some(FutexState::Locked),
            (_, FutexEvent::Acquire) => None,
            (_, FutexEvent::Contend) => Some(FutexState::Contended),
            (FutexState::Unlocked, FutexEvent::Release) => None,
            (_, FutexEvent::Release) => Some(FutexState::Unlocked),
        }
    }

    /// Whether leaving this state on release requires a wake
    pub const fn has_waiters(self) -> bool {
        matches!(self, FutexState::Contended)
    }
}

/// Atomic futex word driven by the [`FutexState`] table
#[repr(transparent)]
#[derive(Debug)]
pub struct FutexWord {
    word: AtomicU32,
}

impl FutexWord {
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(FutexState::Unlocked as u32),
        }
    }

    /// The raw cell handed to the kernel
    pub fn as_atomic(&self) -> &AtomicU32 {
        &self.word
    }

    pub fn load(&self) -> FutexState {
        FutexState::from_raw(self.word.load(Ordering::Relaxed))
    }

    /// `Acquire` row: compare-and-set `Unlocked → Locked`.
    ///
    /// Returns the state that blocked the acquisition on failure.
    pub fn try_acquire(&self) -> Result<(), FutexState> {
        self.word
            .compare_exchange(
                FutexState::Unlocked.as_raw(),
                FutexState::Locked.as_raw(),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .map(|_| ())
            .map_err(FutexState::from_raw)
    }

    /// `Contend` rows: mark the word contended and return the previous state.
    ///
    /// A previous state of `Unlocked` means the caller now owns the mutex.
    pub fn contend(&self) -> FutexState {
        FutexState::from_raw(
            self.word
                .swap(FutexState::Contended.as_raw(), Ordering::Acquire),
        )
    }

    /// `Release` rows: unlock and return the previous state.
    ///
    /// A previous state of `Unlocked` means the word was not held; the swap
    /// leaves it unlocked either way.
    pub fn release(&self) -> FutexState {
        FutexState::from_raw(self.word.swap(FutexState::Unlocked.as_raw(), Ordering::Release))
    }
}

impl Default for FutexWord {
    fn default() -> Self {
        Self::new()
    }
}
