//! Outstanding-work counters used for admission control and backpressure.
//!
//! Every unit of work admitted to a scheduler is "on-ramped" into a counter and
//! "off-ramped" once it has been handled. A counter with a capacity makes the
//! blocking on-ramp wait until enough work has drained.
//!
//! # Correctness Invariants
//!
//! - The count never goes negative: off-ramping more than was on-ramped is a
//!   caller bug, caught by a `debug_assert` rather than recovered at runtime.
//! - `force_on_ramp` never blocks and never fails, even above capacity.
//! - `wait_until_empty` returns only once the count has been observed at zero.
//!
//! Blocking uses `parking_lot::Mutex` + `Condvar`; there is no spin-wait.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Thread-safe counter of outstanding work units.
pub trait ObjectCounter: Send + Sync + fmt::Debug {
    /// Block until capacity allows, then add `weight`.
    fn on_ramp(&self, weight: u64);

    /// Add `weight` only if capacity allows. Returns whether it was added.
    fn attempt_on_ramp(&self, weight: u64) -> bool;

    /// Add `weight` regardless of capacity.
    fn force_on_ramp(&self, weight: u64);

    /// Remove `weight`. Must match exactly one successful on-ramp.
    fn off_ramp(&self, weight: u64);

    /// Current outstanding count.
    fn count(&self) -> u64;

    /// Block until the count reaches zero.
    fn wait_until_empty(&self);
}

/// Count plus the condition variable signalled on every decrement.
#[derive(Debug, Default)]
struct CountState {
    count: Mutex<u64>,
    changed: Condvar,
}

impl CountState {
    fn add(&self, weight: u64) {
        let mut count = self.count.lock();
        *count = count.saturating_add(weight);
    }

    fn remove(&self, weight: u64) {
        let mut count = self.count.lock();
        debug_assert!(*count >= weight, "off-ramp of {weight} exceeds count {}", *count);
        *count = count.saturating_sub(weight);
        drop(count);
        // Waiters have different weights, so everyone re-checks.
        self.changed.notify_all();
    }

    fn get(&self) -> u64 {
        *self.count.lock()
    }

    fn wait_until_empty(&self) {
        let mut count = self.count.lock();
        self.changed.wait_while(&mut count, |c| *c > 0);
    }
}

/// Counter that enforces a capacity on blocking and attempted on-ramps.
///
/// An on-ramp whose weight alone exceeds the capacity is admitted when the
/// counter is empty, otherwise an oversize item would block its producer forever.
#[derive(Debug)]
pub struct BackpressureObjectCounter {
    capacity: u64,
    state: CountState,
}

impl BackpressureObjectCounter {
    /// Create a counter with the given capacity.
    #[must_use]
    pub fn new(capacity: u64) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            state: CountState::default(),
        })
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    const fn fits(&self, count: u64, weight: u64) -> bool {
        count == 0 || count.saturating_add(weight) <= self.capacity
    }
}

impl ObjectCounter for BackpressureObjectCounter {
    fn on_ramp(&self, weight: u64) {
        let mut count = self.state.count.lock();
        self.state
            .changed
            .wait_while(&mut count, |c| !self.fits(*c, weight));
        *count = count.saturating_add(weight);
    }

    fn attempt_on_ramp(&self, weight: u64) -> bool {
        let mut count = self.state.count.lock();
        if !self.fits(*count, weight) {
            return false;
        }
        *count = count.saturating_add(weight);
        true
    }

    fn force_on_ramp(&self, weight: u64) {
        self.state.add(weight);
    }

    fn off_ramp(&self, weight: u64) {
        self.state.remove(weight);
    }

    fn count(&self) -> u64 {
        self.state.get()
    }

    fn wait_until_empty(&self) {
        self.state.wait_until_empty();
    }
}

/// Counter without a capacity. On-ramps never block or fail.
#[derive(Debug, Default)]
pub struct StandardObjectCounter {
    state: CountState,
}

impl StandardObjectCounter {
    /// Create an unbounded counter.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ObjectCounter for StandardObjectCounter {
    fn on_ramp(&self, weight: u64) {
        self.state.add(weight);
    }

    fn attempt_on_ramp(&self, weight: u64) -> bool {
        self.state.add(weight);
        true
    }

    fn force_on_ramp(&self, weight: u64) {
        self.state.add(weight);
    }

    fn off_ramp(&self, weight: u64) {
        self.state.remove(weight);
    }

    fn count(&self) -> u64 {
        self.state.get()
    }

    fn wait_until_empty(&self) {
        self.state.wait_until_empty();
    }
}

/// Fans every on-ramp and off-ramp out to several counters.
///
/// The first counter is the primary: `count` and `wait_until_empty` only look
/// at it. Schedulers use this to keep their own count while also feeding
/// external counters shared with other schedulers.
#[derive(Debug)]
pub struct MultiObjectCounter {
    counters: Vec<Arc<dyn ObjectCounter>>,
}

impl MultiObjectCounter {
    /// Combine `primary` with `others`.
    #[must_use]
    pub fn new(primary: Arc<dyn ObjectCounter>, others: Vec<Arc<dyn ObjectCounter>>) -> Arc<Self> {
        let mut counters = Vec::with_capacity(others.len() + 1);
        counters.push(primary);
        counters.extend(others);
        Arc::new(Self { counters })
    }
}

impl ObjectCounter for MultiObjectCounter {
    fn on_ramp(&self, weight: u64) {
        for counter in &self.counters {
            counter.on_ramp(weight);
        }
    }

    fn attempt_on_ramp(&self, weight: u64) -> bool {
        for (index, counter) in self.counters.iter().enumerate() {
            if !counter.attempt_on_ramp(weight) {
                for admitted in &self.counters[..index] {
                    admitted.off_ramp(weight);
                }
                return false;
            }
        }
        true
    }

    fn force_on_ramp(&self, weight: u64) {
        for counter in &self.counters {
            counter.force_on_ramp(weight);
        }
    }

    fn off_ramp(&self, weight: u64) {
        for counter in &self.counters {
            counter.off_ramp(weight);
        }
    }

    fn count(&self) -> u64 {
        self.counters.first().map_or(0, |primary| primary.count())
    }

    fn wait_until_empty(&self) {
        if let Some(primary) = self.counters.first() {
            primary.wait_until_empty();
        }
    }
}

/// RAII off-ramp for one admitted unit of work.
///
/// Created right after a successful on-ramp and moved along with the task. The
/// off-ramp happens exactly once when the guard drops, whether the task ran,
/// failed, was squelched or was discarded unexecuted.
pub struct OffRampGuard {
    counter: Arc<dyn ObjectCounter>,
    weight: u64,
}

impl OffRampGuard {
    /// Take responsibility for off-ramping `weight` from `counter`.
    #[must_use]
    pub fn new(counter: Arc<dyn ObjectCounter>, weight: u64) -> Self {
        Self { counter, weight }
    }

    /// Weight that will be off-ramped.
    #[must_use]
    pub const fn weight(&self) -> u64 {
        self.weight
    }
}

impl fmt::Debug for OffRampGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffRampGuard")
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

impl Drop for OffRampGuard {
    fn drop(&mut self) {
        self.counter.off_ramp(self.weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_attempt_on_ramp_respects_capacity() {
        let counter = BackpressureObjectCounter::new(3);
        assert!(counter.attempt_on_ramp(2));
        assert!(counter.attempt_on_ramp(1));
        assert!(!counter.attempt_on_ramp(1));
        assert_eq!(counter.count(), 3);

        counter.off_ramp(1);
        assert!(counter.attempt_on_ramp(1));
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn test_force_on_ramp_exceeds_capacity() {
        let counter = BackpressureObjectCounter::new(1);
        counter.on_ramp(1);
        counter.force_on_ramp(5);
        assert_eq!(counter.count(), 6);
    }

    #[test]
    fn test_oversize_weight_admitted_when_empty() {
        let counter = BackpressureObjectCounter::new(2);
        assert!(counter.attempt_on_ramp(10));
        assert!(!counter.attempt_on_ramp(1));
        counter.off_ramp(10);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_on_ramp_blocks_until_off_ramp() {
        let counter = BackpressureObjectCounter::new(1);
        counter.on_ramp(1);

        let admitted = Arc::new(AtomicBool::new(false));
        let handle = {
            let counter = Arc::clone(&counter);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                counter.on_ramp(1);
                admitted.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!admitted.load(Ordering::SeqCst));

        counter.off_ramp(1);
        handle.join().unwrap();
        assert!(admitted.load(Ordering::SeqCst));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_wait_until_empty() {
        let counter = StandardObjectCounter::new();
        counter.on_ramp(3);

        let releaser = {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..3 {
                    thread::sleep(Duration::from_millis(5));
                    counter.off_ramp(1);
                }
            })
        };

        counter.wait_until_empty();
        assert_eq!(counter.count(), 0);
        releaser.join().unwrap();
    }

    #[test]
    fn test_multi_counter_rolls_back_failed_attempt() {
        let own = BackpressureObjectCounter::new(10);
        let shared = BackpressureObjectCounter::new(1);
        let others: Vec<Arc<dyn ObjectCounter>> = vec![shared.clone()];
        let multi = MultiObjectCounter::new(own.clone(), others);

        assert!(multi.attempt_on_ramp(1));
        assert!(!multi.attempt_on_ramp(1));
        assert_eq!(own.count(), 1);
        assert_eq!(shared.count(), 1);
        assert_eq!(multi.count(), 1);

        multi.off_ramp(1);
        assert_eq!(own.count(), 0);
        assert_eq!(shared.count(), 0);
    }

    #[test]
    fn test_guard_off_ramps_on_drop() {
        let counter = BackpressureObjectCounter::new(10);
        counter.on_ramp(4);
        let guard = OffRampGuard::new(counter.clone(), 4);
        assert_eq!(guard.weight(), 4);
        assert_eq!(counter.count(), 4);
        drop(guard);
        assert_eq!(counter.count(), 0);
    }
}
