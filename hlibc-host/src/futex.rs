//! Simulated futex wait queues
//!
//! Words are hashed by address into buckets. A waiter re-checks the word
//! under its bucket lock before enqueueing, and a waker takes the same lock
//! after changing the word, so a wake issued after the change cannot miss a
//! waiter that saw the old value.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use hlibc_core::{FutexChannel, WakeCount};

const BUCKETS: usize = 64;

struct Parker {
    addr: usize,
    woken: Mutex<bool>,
    signal: Condvar,
}

impl Parker {
    fn new(addr: usize) -> Self {
        Self {
            addr,
            woken: Mutex::new(false),
            signal: Condvar::new(),
        }
    }

    fn park(&self) {
        let mut woken = relock(&self.woken);
        while !*woken {
            woken = self
                .signal
                .wait(woken)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn unpark(&self) {
        *relock(&self.woken) = true;
        self.signal.notify_one();
    }
}

/// Address-keyed table of parked threads
pub struct ParkingTable {
    buckets: Vec<Mutex<VecDeque<Arc<Parker>>>>,
}

impl ParkingTable {
    pub fn new() -> Self {
        Self {
            buckets: (0..BUCKETS).map(|_| Mutex::new(VecDeque::new())).collect(),
        }
    }

    fn bucket(&self, addr: usize) -> MutexGuard<'_, VecDeque<Arc<Parker>>> {
        // Words are 4-byte aligned; drop the always-zero bits before hashing.
        relock(&self.buckets[(addr >> 2) % BUCKETS])
    }

    /// Number of threads currently parked on `word`
    pub fn waiters(&self, word: &AtomicU32) -> usize {
        let addr = word as *const AtomicU32 as usize;
        self.bucket(addr).iter().filter(|p| p.addr == addr).count()
    }
}

impl Default for ParkingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FutexChannel for ParkingTable {
    fn wait(&self, word: &AtomicU32, expected: u32) {
        let addr = word as *const AtomicU32 as usize;
        let parker = {
            let mut queue = self.bucket(addr);
            if word.load(Ordering::SeqCst) != expected {
                return;
            }
            let parker = Arc::new(Parker::new(addr));
            queue.push_back(Arc::clone(&parker));
            parker
        };
        parker.park();
    }

    fn wake(&self, word: &AtomicU32, count: WakeCount) -> usize {
        let addr = word as *const AtomicU32 as usize;
        let limit = count.as_raw() as usize;

        let woken: Vec<Arc<Parker>> = {
            let mut queue = self.bucket(addr);
            let mut woken = Vec::new();
            let mut i = 0;
            while i < queue.len() && woken.len() < limit {
                if queue[i].addr == addr {
                    if let Some(parker) = queue.remove(i) {
                        woken.push(parker);
                    }
                } else {
                    i += 1;
                }
            }
            woken
        };

        for parker in &woken {
            parker.unpark();
        }
        woken.len()
    }
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_on_mismatch() {
        let table = ParkingTable::new();
        let word = AtomicU32::new(1);
        table.wait(&word, 0);
        assert_eq!(table.waiters(&word), 0);
    }

    #[test]
    fn test_wake_without_waiters() {
        let table = ParkingTable::new();
        let word = AtomicU32::new(0);
        assert_eq!(table.wake(&word, WakeCount::All), 0);
    }

    #[test]
    fn test_wake_one_then_all() {
        let table = Arc::new(ParkingTable::new());
        let word = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let (table, word) = (Arc::clone(&table), Arc::clone(&word));
                thread::spawn(move || table.wait(&word, 0))
            })
            .collect();

        while table.waiters(&word) != 3 {
            thread::sleep(Duration::from_millis(1));
        }
        word.store(1, Ordering::SeqCst);

        assert_eq!(table.wake(&word, WakeCount::One), 1);
        assert_eq!(table.waiters(&word), 2);
        assert_eq!(table.wake(&word, WakeCount::All), 2);

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_wake_only_matching_word() {
        let table = Arc::new(ParkingTable::new());
        let words = Arc::new([AtomicU32::new(0), AtomicU32::new(0)]);

        let (t, w) = (Arc::clone(&table), Arc::clone(&words));
        let handle = thread::spawn(move || t.wait(&w[0], 0));
        while table.waiters(&words[0]) != 1 {
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(table.wake(&words[1], WakeCount::All), 0);
        words[0].store(1, Ordering::SeqCst);
        assert_eq!(table.wake(&words[0], WakeCount::Many(5)), 1);
        handle.join().unwrap();
    }
}
