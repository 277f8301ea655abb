//! Pure source scheduler emitting wall-clock timestamps at fixed rates.
//!
//! One heartbeat scheduler owns one timer thread, no matter how many heartbeat
//! wires are built on it. Each wire is ticked at a fixed rate from the moment
//! the scheduler starts; a tick that falls behind is caught up rather than
//! skipped. Rates are best-effort, not real-time.
//!
//! # Lifecycle
//!
//! `Created → Started → Stopped`. Wires may only be built while `Created`, and
//! each of the later transitions happens at most once.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::error::SchedulerError;
use super::scheduler::{Capacity, SchedulerIntrospect, SchedulerType};
use super::wire::OutputWire;
use super::worker_pool::join_with_timeout;
use crate::util::Clock;

/// Shortest supported heartbeat period.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Heartbeat lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    /// Accepting wire registrations.
    Created,
    /// Timer running.
    Started,
    /// Timer cancelled.
    Stopped,
}

#[derive(Clone)]
struct HeartbeatTask {
    period: Duration,
    wire: OutputWire<SystemTime>,
}

struct Inner {
    state: HeartbeatState,
    tasks: Vec<HeartbeatTask>,
    stop_tx: Option<Sender<()>>,
    timer: Option<JoinHandle<()>>,
}

/// Source of periodic timestamps on one or more output wires.
pub struct HeartbeatScheduler {
    name: String,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl HeartbeatScheduler {
    /// Heartbeat scheduler stamping ticks with `clock`'s wall-clock time.
    #[must_use]
    pub fn new(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            clock,
            inner: Mutex::new(Inner {
                state: HeartbeatState::Created,
                tasks: Vec::new(),
                stop_tx: None,
                timer: None,
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> HeartbeatState {
        self.inner.lock().state
    }

    /// Build a wire that receives the current time every `period`.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidPeriod`] if `period` is below [`MIN_PERIOD`]
    /// - [`SchedulerError::AlreadyStarted`] if the scheduler has been started
    pub fn build_heartbeat_wire(
        &self,
        period: Duration,
    ) -> Result<OutputWire<SystemTime>, SchedulerError> {
        if period < MIN_PERIOD {
            return Err(SchedulerError::InvalidPeriod(period));
        }

        let mut inner = self.inner.lock();
        if inner.state != HeartbeatState::Created {
            return Err(SchedulerError::AlreadyStarted(self.name.clone()));
        }

        let wire = OutputWire::new(format!("{}_heartbeat_{}ms", self.name, period.as_millis()));
        inner.tasks.push(HeartbeatTask {
            period,
            wire: wire.clone(),
        });
        debug!(scheduler = %self.name, period_ms = period.as_millis(), "Heartbeat wire registered");
        Ok(wire)
    }

    /// Build a wire that receives the current time `frequency` times per second.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidFrequency`] if `frequency` is not a positive
    ///   finite number or maps to a period below [`MIN_PERIOD`]
    /// - [`SchedulerError::AlreadyStarted`] if the scheduler has been started
    pub fn build_heartbeat_wire_frequency(
        &self,
        frequency: f64,
    ) -> Result<OutputWire<SystemTime>, SchedulerError> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(SchedulerError::InvalidFrequency(frequency));
        }
        let period = Duration::try_from_secs_f64(1.0 / frequency)
            .map_err(|_| SchedulerError::InvalidFrequency(frequency))?;
        if period < MIN_PERIOD {
            return Err(SchedulerError::InvalidFrequency(frequency));
        }
        self.build_heartbeat_wire(period)
    }

    /// Start ticking every registered wire.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::AlreadyStarted`] if called more than once
    /// - [`SchedulerError::Internal`] if the timer thread cannot be spawned
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock();
        if inner.state != HeartbeatState::Created {
            return Err(SchedulerError::AlreadyStarted(self.name.clone()));
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let tasks = inner.tasks.clone();
        let clock = Arc::clone(&self.clock);
        let name = self.name.clone();
        let timer = thread::Builder::new()
            .name(format!("wiring-{}", self.name))
            .spawn(move || timer_loop(&name, &tasks, clock.as_ref(), &stop_rx))
            .map_err(|e| SchedulerError::Internal(format!("failed to spawn heartbeat timer: {e}")))?;

        inner.stop_tx = Some(stop_tx);
        inner.timer = Some(timer);
        inner.state = HeartbeatState::Started;
        info!(scheduler = %self.name, wires = inner.tasks.len(), "Heartbeat scheduler started");
        Ok(())
    }

    /// Cancel every periodic tick.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::NotStarted`] if the scheduler was never started
    /// - [`SchedulerError::AlreadyStopped`] on a second call
    pub fn stop(&self) -> Result<(), SchedulerError> {
        let timer = {
            let mut inner = self.inner.lock();
            match inner.state {
                HeartbeatState::Created => return Err(SchedulerError::NotStarted(self.name.clone())),
                HeartbeatState::Stopped => {
                    return Err(SchedulerError::AlreadyStopped(self.name.clone()))
                }
                HeartbeatState::Started => {}
            }
            inner.state = HeartbeatState::Stopped;
            // Dropping the sender disconnects the channel and wakes the timer.
            inner.stop_tx.take();
            inner.timer.take()
        };

        if let Some(timer) = timer {
            join_with_timeout(0, timer, STOP_TIMEOUT);
        }
        info!(scheduler = %self.name, "Heartbeat scheduler stopped");
        Ok(())
    }
}

impl SchedulerIntrospect for HeartbeatScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheduler_type(&self) -> SchedulerType {
        SchedulerType::Heartbeat
    }

    fn capacity(&self) -> Capacity {
        Capacity::Unlimited
    }

    fn unprocessed_task_count(&self) -> u64 {
        0
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.inner.get_mut().stop_tx.take();
    }
}

impl fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("HeartbeatScheduler")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("wires", &inner.tasks.len())
            .finish_non_exhaustive()
    }
}

fn timer_loop(name: &str, tasks: &[HeartbeatTask], clock: &dyn Clock, stop_rx: &Receiver<()>) {
    debug!(scheduler = name, "Heartbeat timer started");

    // A period too long to represent as an instant never comes due.
    let start = Instant::now();
    let mut next_due: Vec<Option<Instant>> =
        tasks.iter().map(|task| start.checked_add(task.period)).collect();

    loop {
        let now = Instant::now();
        for (task, due) in tasks.iter().zip(next_due.iter_mut()) {
            if let Some(at) = *due {
                if at <= now {
                    tick(name, task, clock);
                    *due = at.checked_add(task.period);
                }
            }
        }

        let wake = match next_due.iter().flatten().min() {
            Some(earliest) => stop_rx.recv_timeout(earliest.saturating_duration_since(Instant::now())),
            None => stop_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match wake {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(scheduler = name, "Heartbeat timer exiting");
}

fn tick(name: &str, task: &HeartbeatTask, clock: &dyn Clock) {
    let now = clock.wall_clock();
    if panic::catch_unwind(AssertUnwindSafe(|| task.wire.forward(now))).is_err() {
        error!(scheduler = name, wire = task.wire.name(), "Heartbeat consumer panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::SystemClock;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_rejects_sub_millisecond_period() {
        let heartbeat = HeartbeatScheduler::new("heartbeat", SystemClock::shared());
        let result = heartbeat.build_heartbeat_wire(Duration::from_micros(999));
        assert!(matches!(result, Err(SchedulerError::InvalidPeriod(_))));
    }

    #[test]
    fn test_rejects_bad_frequencies() {
        let heartbeat = HeartbeatScheduler::new("heartbeat", SystemClock::shared());
        for frequency in [0.0, -1.0, f64::NAN, f64::INFINITY, 2_000.0, 1e-300, f64::MIN_POSITIVE] {
            assert!(matches!(
                heartbeat.build_heartbeat_wire_frequency(frequency),
                Err(SchedulerError::InvalidFrequency(_))
            ));
        }
        assert!(heartbeat.build_heartbeat_wire_frequency(500.0).is_ok());
    }

    #[test]
    fn test_very_long_period_is_accepted_and_never_ticks() {
        let heartbeat = HeartbeatScheduler::new("glacial", SystemClock::shared());
        let ticks = Arc::new(AtomicU64::new(0));
        let wire = heartbeat.build_heartbeat_wire(Duration::MAX).unwrap();
        {
            let ticks = Arc::clone(&ticks);
            wire.solder(move |_| {
                ticks.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(heartbeat.build_heartbeat_wire_frequency(1e-12).is_ok());

        heartbeat.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        heartbeat.stop().unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_state_machine() {
        let heartbeat = HeartbeatScheduler::new("heartbeat", SystemClock::shared());
        assert!(matches!(heartbeat.stop(), Err(SchedulerError::NotStarted(_))));

        heartbeat.build_heartbeat_wire(Duration::from_millis(10)).unwrap();
        heartbeat.start().unwrap();
        assert_eq!(heartbeat.state(), HeartbeatState::Started);
        assert!(matches!(heartbeat.start(), Err(SchedulerError::AlreadyStarted(_))));
        assert!(matches!(
            heartbeat.build_heartbeat_wire(Duration::from_millis(10)),
            Err(SchedulerError::AlreadyStarted(_))
        ));

        heartbeat.stop().unwrap();
        assert_eq!(heartbeat.state(), HeartbeatState::Stopped);
        assert!(matches!(heartbeat.stop(), Err(SchedulerError::AlreadyStopped(_))));
        assert!(matches!(heartbeat.start(), Err(SchedulerError::AlreadyStarted(_))));
    }

    #[test]
    fn test_introspection() {
        let heartbeat = HeartbeatScheduler::new("beat", SystemClock::shared());
        assert_eq!(heartbeat.name(), "beat");
        assert_eq!(heartbeat.scheduler_type(), SchedulerType::Heartbeat);
        assert_eq!(heartbeat.capacity(), Capacity::Unlimited);
        assert_eq!(heartbeat.unprocessed_task_count(), 0);
    }
}
