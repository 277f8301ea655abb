//! Typed entry and exit points of schedulers.
//!
//! An [`InputWire`] binds a handler for datum type `T` to a scheduler and turns
//! each datum into a [`Task`]. An [`OutputWire`] fans a produced value out to
//! every consumer soldered to it. A [`WiredScheduler`] pairs a scheduler with
//! its primary output wire, so handler results flow on to the next scheduler.
//! Building and validating the graph that connects wires is left to the caller.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::error::AppResult;
use super::scheduler::TaskScheduler;
use super::task::Task;

/// Handler invoked with each datum.
pub type Handler<T> = Arc<dyn Fn(T) -> AppResult<()> + Send + Sync>;

/// Capacity units a datum costs.
pub type Weigher<T> = Arc<dyn Fn(&T) -> u64 + Send + Sync>;

/// Consumer soldered to an output wire.
pub type Consumer<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Admission method used when an output wire feeds an input wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolderType {
    /// `put`: may block under backpressure.
    Put,
    /// `offer`: drops the value when the target is at capacity.
    Offer,
    /// `inject`: bypasses backpressure.
    Inject,
}

/// A handler bound to a scheduler.
pub struct InputWire<T> {
    scheduler: Arc<dyn TaskScheduler>,
    handler: Handler<T>,
    weigher: Option<Weigher<T>>,
}

impl<T: Send + 'static> InputWire<T> {
    /// Bind `handler` to `scheduler`. Every datum costs one unit.
    pub fn bind<F>(scheduler: Arc<dyn TaskScheduler>, handler: F) -> Self
    where
        F: Fn(T) -> AppResult<()> + Send + Sync + 'static,
    {
        Self {
            scheduler,
            handler: Arc::new(handler),
            weigher: None,
        }
    }

    /// Charge each datum `weigher(&datum)` capacity units instead of one.
    #[must_use]
    pub fn with_weigher<W>(mut self, weigher: W) -> Self
    where
        W: Fn(&T) -> u64 + Send + Sync + 'static,
    {
        self.weigher = Some(Arc::new(weigher));
        self
    }

    /// Scheduler this wire feeds.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<dyn TaskScheduler> {
        &self.scheduler
    }

    fn task(&self, datum: T) -> Task {
        let weight = self.weigher.as_ref().map_or(1, |weigh| weigh(&datum));
        let handler = Arc::clone(&self.handler);
        Task::weighted(weight, move || handler(datum))
    }

    /// See [`TaskScheduler::put`].
    pub fn put(&self, datum: T) {
        self.scheduler.put(self.task(datum));
    }

    /// See [`TaskScheduler::offer`].
    pub fn offer(&self, datum: T) -> bool {
        self.scheduler.offer(self.task(datum))
    }

    /// See [`TaskScheduler::inject`].
    pub fn inject(&self, datum: T) {
        self.scheduler.inject(self.task(datum));
    }
}

impl<T> Clone for InputWire<T> {
    fn clone(&self) -> Self {
        Self {
            scheduler: Arc::clone(&self.scheduler),
            handler: Arc::clone(&self.handler),
            weigher: self.weigher.clone(),
        }
    }
}

impl<T> fmt::Debug for InputWire<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputWire")
            .field("scheduler", &self.scheduler.name())
            .field("weighted", &self.weigher.is_some())
            .finish()
    }
}

/// Fan-out point for values produced by a scheduler or source.
pub struct OutputWire<T> {
    name: String,
    consumers: Arc<RwLock<Vec<Consumer<T>>>>,
}

impl<T: Clone + Send + 'static> OutputWire<T> {
    /// Output wire with no consumers.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            consumers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Wire name, for logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a consumer invoked with every forwarded value.
    pub fn solder<F>(&self, consumer: F)
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.consumers.write().push(Arc::new(consumer));
    }

    /// Feed every forwarded value into `input` using `solder_type`.
    pub fn solder_to(&self, input: &InputWire<T>, solder_type: SolderType) {
        let input = input.clone();
        match solder_type {
            SolderType::Put => self.solder(move |value| input.put(value)),
            SolderType::Offer => self.solder(move |value| {
                let _ = input.offer(value);
            }),
            SolderType::Inject => self.solder(move |value| input.inject(value)),
        }
    }

    /// Number of soldered consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }

    /// Hand `value` to every consumer, in soldering order.
    pub fn forward(&self, value: T) {
        // Snapshot so a slow or blocking consumer never holds the lock.
        let consumers: Vec<Consumer<T>> = self.consumers.read().clone();
        if let Some((last, rest)) = consumers.split_last() {
            for consumer in rest {
                consumer(value.clone());
            }
            last(value);
        }
    }
}

impl<T> Clone for OutputWire<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            consumers: Arc::clone(&self.consumers),
        }
    }
}

impl<T> fmt::Debug for OutputWire<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputWire")
            .field("name", &self.name)
            .field("consumers", &self.consumers.read().len())
            .finish()
    }
}

/// A scheduler with a primary output wire of type `O`.
///
/// Handlers bound through [`input_wire`](Self::input_wire) return
/// `AppResult<Option<O>>`. `Some` values are forwarded on the primary wire by
/// the task that produced them, before it completes; `None` forwards nothing.
/// Failed or squelched handlers forward nothing either.
pub struct WiredScheduler<O> {
    scheduler: Arc<dyn TaskScheduler>,
    output: OutputWire<O>,
}

impl<O: Clone + Send + 'static> WiredScheduler<O> {
    /// Give `scheduler` a primary output wire named `<scheduler>_output`.
    #[must_use]
    pub fn new(scheduler: Arc<dyn TaskScheduler>) -> Self {
        let output = OutputWire::new(format!("{}_output", scheduler.name()));
        Self { scheduler, output }
    }

    /// The underlying scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<dyn TaskScheduler> {
        &self.scheduler
    }

    /// Wire carrying every value returned by this scheduler's handlers.
    #[must_use]
    pub fn output_wire(&self) -> &OutputWire<O> {
        &self.output
    }

    /// Extra output wire named `<scheduler>_<label>`. Handlers forward on it
    /// explicitly.
    #[must_use]
    pub fn build_secondary_output_wire<U>(&self, label: &str) -> OutputWire<U>
    where
        U: Clone + Send + 'static,
    {
        OutputWire::new(format!("{}_{label}", self.scheduler.name()))
    }

    /// Bind `handler` to this scheduler, forwarding its results on the primary
    /// output wire.
    pub fn input_wire<T, F>(&self, handler: F) -> InputWire<T>
    where
        T: Send + 'static,
        F: Fn(T) -> AppResult<Option<O>> + Send + Sync + 'static,
    {
        let output = self.output.clone();
        InputWire::bind(Arc::clone(&self.scheduler), move |datum: T| {
            if let Some(value) = handler(datum)? {
                output.forward(value);
            }
            Ok(())
        })
    }
}

impl<O> fmt::Debug for WiredScheduler<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WiredScheduler")
            .field("scheduler", &self.scheduler.name())
            .field("output", &self.output)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_forward_reaches_every_consumer() {
        let wire = OutputWire::<u32>::new("numbers");
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let seen = Arc::clone(&seen);
            wire.solder(move |value| seen.lock().push((tag, value)));
        }

        wire.forward(7);
        assert_eq!(wire.consumer_count(), 3);
        assert_eq!(*seen.lock(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_forward_without_consumers_is_noop() {
        let wire = OutputWire::<String>::new("empty");
        wire.forward("dropped".into());
        assert_eq!(wire.consumer_count(), 0);
    }

    #[test]
    fn test_none_results_are_not_forwarded() {
        use crate::builders::TaskSchedulerBuilder;
        use crate::core::SchedulerType;

        let wired = TaskSchedulerBuilder::new("evens")
            .with_type(SchedulerType::Direct)
            .build_wired::<u32>()
            .unwrap();
        assert_eq!(wired.output_wire().name(), "evens_output");

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            wired.output_wire().solder(move |value| seen.lock().push(value));
        }
        let input = wired.input_wire(|value: u32| Ok((value % 2 == 0).then_some(value * 10)));
        for value in 0..5 {
            input.put(value);
        }

        assert_eq!(*seen.lock(), vec![0, 20, 40]);
    }

    #[test]
    fn test_solder_to_feeds_input_wire() {
        use crate::builders::TaskSchedulerBuilder;
        use crate::core::SchedulerType;

        let scheduler = TaskSchedulerBuilder::new("sink")
            .with_type(SchedulerType::Direct)
            .build()
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let input = {
            let seen = Arc::clone(&seen);
            InputWire::bind(scheduler, move |value: u32| {
                seen.lock().push(value);
                Ok(())
            })
        };

        let output = OutputWire::<u32>::new("source");
        output.solder_to(&input, SolderType::Put);
        output.solder_to(&input, SolderType::Inject);
        output.forward(4);

        assert_eq!(*seen.lock(), vec![4, 4]);
    }
}
