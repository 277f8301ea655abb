//! Busy/idle accounting for a single worker thread.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug)]
struct TimerState {
    window_start: Instant,
    busy_since: Option<Instant>,
    busy_in_window: Duration,
}

/// Tracks what fraction of wall time a worker spends handling tasks.
///
/// The worker calls [`activate`](Self::activate) before each task and
/// [`deactivate`](Self::deactivate) after. Any thread may read and reset the
/// fraction.
#[derive(Debug)]
pub struct BusyTimer {
    state: Mutex<TimerState>,
}

impl Default for BusyTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyTimer {
    /// Idle timer whose measurement window starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TimerState {
                window_start: Instant::now(),
                busy_since: None,
                busy_in_window: Duration::ZERO,
            }),
        }
    }

    /// Mark the worker busy. No-op if already busy.
    pub fn activate(&self) {
        let mut state = self.state.lock();
        if state.busy_since.is_none() {
            state.busy_since = Some(Instant::now());
        }
    }

    /// Mark the worker idle. No-op if already idle.
    pub fn deactivate(&self) {
        let mut state = self.state.lock();
        if let Some(since) = state.busy_since.take() {
            // Busy time from before the window started belongs to the previous window.
            let from = since.max(state.window_start);
            state.busy_in_window += Instant::now().saturating_duration_since(from);
        }
    }

    /// Fraction of the current window spent busy, in `[0.0, 1.0]`.
    #[must_use]
    pub fn busy_fraction(&self) -> f64 {
        let state = self.state.lock();
        let now = Instant::now();
        let window = now.saturating_duration_since(state.window_start);
        if window.is_zero() {
            return 0.0;
        }
        let mut busy = state.busy_in_window;
        if let Some(since) = state.busy_since {
            busy += now.saturating_duration_since(since.max(state.window_start));
        }
        (busy.as_secs_f64() / window.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Return the busy fraction and start a new window.
    pub fn take_busy_fraction(&self) -> f64 {
        let fraction = self.busy_fraction();
        let mut state = self.state.lock();
        state.window_start = Instant::now();
        state.busy_in_window = Duration::ZERO;
        fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_idle_timer_reports_zero() {
        let timer = BusyTimer::new();
        thread::sleep(Duration::from_millis(5));
        assert!(timer.busy_fraction() < f64::EPSILON);
    }

    #[test]
    fn test_busy_fraction_tracks_activity() {
        let timer = BusyTimer::new();
        timer.activate();
        thread::sleep(Duration::from_millis(20));
        timer.deactivate();
        thread::sleep(Duration::from_millis(20));

        let fraction = timer.take_busy_fraction();
        assert!(fraction > 0.1 && fraction < 0.9, "fraction was {fraction}");
        assert!(timer.busy_fraction() < 0.5);
    }
}
