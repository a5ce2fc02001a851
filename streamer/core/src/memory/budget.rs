//! Memory Budget Tracker
//!
//! Process-wide counter of bytes attributed to in-flight stream buffers.
//! This is advisory backpressure, not a hard allocator: `used <= capacity`
//! is a target, and brief overshoot is resolved by the caller backing off,
//! never by corruption. Callers that fail a reservation record a pressure
//! event, fire the rate-limited relief action, wait, and retry once before
//! giving up on the stream.
//!
//! Successful reservations are RAII guards: the bytes come back exactly
//! once no matter how the holding session exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::memory::pool::BufferPool;

/// Shared used/capacity counter gating stream buffer allocations
pub struct MemoryBudget {
    capacity: u64,
    used: AtomicU64,
    relief_cooldown: std::time::Duration,
    last_relief: Mutex<Option<Instant>>,
    relief_count: AtomicU64,
}

impl MemoryBudget {
    /// Create a budget with the given ceiling and relief cooldown
    #[must_use]
    pub fn new(capacity: u64, relief_cooldown: std::time::Duration) -> Self {
        Self {
            capacity,
            used: AtomicU64::new(0),
            relief_cooldown,
            last_relief: Mutex::new(None),
            relief_count: AtomicU64::new(0),
        }
    }

    /// Configured ceiling in bytes
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes currently attributed to in-flight buffers
    #[must_use]
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    /// Number of relief actions that have actually fired (lifetime)
    #[must_use]
    pub fn relief_count(&self) -> u64 {
        self.relief_count.load(Ordering::Relaxed)
    }

    /// Atomically reserve `bytes` if it fits under the ceiling
    ///
    /// Returns `None` without mutating state when it does not fit. The
    /// returned guard releases the bytes on drop.
    pub fn try_reserve(self: &Arc<Self>, bytes: u64) -> Option<BudgetReservation> {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = current.checked_add(bytes)?;
            if next > self.capacity {
                return None;
            }
            match self.used.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Some(BudgetReservation {
                        budget: Arc::clone(self),
                        bytes,
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Run the budget-relief action if the cooldown has elapsed
    ///
    /// Relief trims the pool's idle buffers to its low-water mark so the
    /// next retry can find headroom. Fires at most once per cooldown
    /// interval no matter how many pressure events arrive in between;
    /// returns whether it fired.
    pub fn try_relief(&self, pool: &BufferPool) -> bool {
        let now = Instant::now();
        {
            let mut last = self.last_relief.lock();
            match *last {
                Some(at) if now.duration_since(at) < self.relief_cooldown => return false,
                _ => *last = Some(now),
            }
        }
        let freed = pool.release_idle();
        self.relief_count.fetch_add(1, Ordering::Relaxed);
        debug!(
            freed,
            used = self.used(),
            capacity = self.capacity,
            "budget relief fired"
        );
        true
    }

    fn release(&self, bytes: u64) {
        let prev = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |u| {
                Some(u.saturating_sub(bytes))
            })
            .unwrap_or(0);
        if prev < bytes {
            warn!(
                release = bytes,
                tracked = prev,
                "budget release exceeds tracked usage; clamping at zero"
            );
        }
    }
}

/// RAII guard for bytes reserved from a [`MemoryBudget`]
///
/// Dropping the guard returns the bytes. A guard can also be released
/// explicitly for clarity at call sites; doing both is harmless because the
/// release happens exactly once.
pub struct BudgetReservation {
    budget: Arc<MemoryBudget>,
    bytes: u64,
}

impl BudgetReservation {
    /// Bytes held by this reservation
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Release the reservation now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for BudgetReservation {
    fn drop(&mut self) {
        self.budget.release(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn budget(capacity: u64) -> Arc<MemoryBudget> {
        Arc::new(MemoryBudget::new(capacity, Duration::from_millis(50)))
    }

    #[test]
    fn test_reserve_within_capacity() {
        let budget = budget(1000);
        let a = budget.try_reserve(400).expect("fits");
        let b = budget.try_reserve(600).expect("fits exactly");
        assert_eq!(budget.used(), 1000);
        drop(a);
        assert_eq!(budget.used(), 600);
        drop(b);
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_reserve_over_capacity_fails_without_mutation() {
        let budget = budget(1000);
        let _held = budget.try_reserve(900).expect("fits");
        assert!(budget.try_reserve(101).is_none());
        assert_eq!(budget.used(), 900);
    }

    #[test]
    fn test_explicit_release_is_single() {
        let budget = budget(1000);
        let guard = budget.try_reserve(500).expect("fits");
        guard.release();
        assert_eq!(budget.used(), 0);
        // A later foreign release would clamp, not underflow
        budget.release(100);
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_relief_is_rate_limited() {
        let budget = budget(1000);
        let pool = BufferPool::new(3, 1024 * 1024, 0);

        assert!(budget.try_relief(&pool));
        assert!(!budget.try_relief(&pool));
        assert!(!budget.try_relief(&pool));
        assert_eq!(budget.relief_count(), 1);

        std::thread::sleep(Duration::from_millis(60));
        assert!(budget.try_relief(&pool));
        assert_eq!(budget.relief_count(), 2);
    }

    #[test]
    fn test_concurrent_reservations_never_oversubscribe() {
        let budget = budget(100);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let budget = Arc::clone(&budget);
            handles.push(std::thread::spawn(move || {
                let mut granted = 0u32;
                for _ in 0..1000 {
                    if let Some(guard) = budget.try_reserve(10) {
                        assert!(budget.used() <= 100);
                        granted += 1;
                        drop(guard);
                    }
                }
                granted
            }));
        }
        for handle in handles {
            assert!(handle.join().expect("worker panicked") > 0);
        }
        assert_eq!(budget.used(), 0);
    }
}
