//! # Scheduler: fixed worker pool over a shared work queue.
//!
//! The [`Scheduler`] owns an unbounded queue of [`Slot`]s and a fixed set of
//! [`Worker`]s created by a [`WorkerFactory`]. Pooled agents are pushed as slots
//! whenever they have mail; each worker takes a slot and runs one consume cycle.
//!
//! ## Architecture
//! ```text
//! Pooled::on_submit ──► schedule(agent) ──► [ work queue ] ──► worker 0 ──► agent.consume_message()
//!                                                 │        ├──► worker 1
//!                                                 │        └──► worker N-1
//! stop() ──► N sentinels ─────────────────────────┘              (each exits on its sentinel)
//! ```
//!
//! ## Rules
//! - The pool size is fixed at construction (`> 0`).
//! - `stop()` queues one sentinel per worker *behind* any pending slots, so
//!   already scheduled cycles still run.
//! - A panic escaping a worker is recorded, reported on the bus and stops the
//!   whole pool.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::agents::AgentRef;
use crate::core::config::ConfigSource;
use crate::core::queue::BlockingQueue;
use crate::core::slot::Slot;
use crate::core::worker::{Worker, WorkerFactory};
use crate::error::ConfigError;
use crate::events::{Bus, Event, EventKind};

/// Queue shared by the scheduler and its workers.
pub type WorkQueue = BlockingQueue<Slot>;

/// A panic that escaped a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFault {
    /// Id of the failed worker.
    pub worker: usize,
    /// Panic message.
    pub message: String,
}

/// Fixed-size worker pool for pooled agents.
pub struct Scheduler {
    queue: Arc<WorkQueue>,
    workers: Mutex<Vec<Box<dyn Worker>>>,
    size: usize,
    bus: Bus,
    errors: Mutex<Vec<WorkerFault>>,
    started: AtomicBool,
    stopping: AtomicBool,
    failed: CancellationToken,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Scheduler {
    /// Creates the pool with `config.worker_threads()` workers built by `factory`.
    ///
    /// Fails with [`ConfigError::InvalidWorkerThreads`] if the count is not positive.
    /// Workers are bound to the queue but not started.
    pub fn new(
        factory: &dyn WorkerFactory,
        config: &dyn ConfigSource,
        bus: Bus,
    ) -> Result<Arc<Self>, ConfigError> {
        let requested = config.worker_threads();
        let size = usize::try_from(requested)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidWorkerThreads(requested))?;

        Ok(Arc::new_cyclic(|me| {
            let queue = Arc::new(WorkQueue::unbounded());
            let workers = (0..size)
                .map(|id| {
                    let mut worker = factory.new_worker();
                    worker.bind(id, me.clone(), queue.clone());
                    worker
                })
                .collect();

            Self {
                queue,
                workers: Mutex::new(workers),
                size,
                bus,
                errors: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                failed: CancellationToken::new(),
            }
        }))
    }

    /// Queues one consume cycle for `agent`.
    pub fn schedule(&self, agent: AgentRef) {
        let name = agent.name().to_string();
        if self.queue.put(Slot::for_agent(agent)).is_err() {
            error!(agent = %name, "could not schedule agent");
        }
    }

    /// Starts every worker. Calling it again is a no-op.
    pub fn start(&self) -> io::Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for worker in lock(&self.workers).iter_mut() {
            worker.start()?;
        }
        debug!(workers = self.size, "scheduler started");
        self.bus
            .publish(Event::new(EventKind::SchedulerStarted).with_reason(self.size.to_string()));
        Ok(())
    }

    /// Asks every worker to exit once the slots queued so far have run.
    ///
    /// Idempotent; queues exactly one sentinel per worker.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(workers = self.size, "stopping scheduler");
        for _ in 0..self.size {
            if self.queue.put(Slot::sentinel()).is_err() {
                warn!("could not queue worker sentinel");
            }
        }
        self.bus.publish(Event::new(EventKind::SchedulerStopping));
    }

    /// Records a panic that escaped `worker` and stops the pool.
    pub fn signal_error(&self, worker: usize, message: String) {
        error!(worker, error = %message, "worker failed; stopping scheduler");
        lock(&self.errors).push(WorkerFault {
            worker,
            message: message.clone(),
        });
        self.bus.publish(
            Event::new(EventKind::WorkerFailed)
                .with_worker(worker)
                .with_reason(message),
        );
        self.failed.cancel();
        self.stop();
    }

    /// Blocks until every worker has exited. Returns the first join error.
    pub fn join(&self) -> io::Result<()> {
        let mut first = None;
        for worker in lock(&self.workers).iter_mut() {
            if let Err(err) = worker.join() {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Pool size.
    pub fn num_workers(&self) -> usize {
        self.size
    }

    /// Panics that escaped workers so far.
    pub fn errors(&self) -> Vec<WorkerFault> {
        lock(&self.errors).clone()
    }

    /// Slots (including sentinels) waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Token cancelled when a worker fails.
    pub fn failed_token(&self) -> CancellationToken {
        self.failed.clone()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("size", &self.size)
            .field("pending", &self.pending())
            .field("stopping", &self.stopping.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RuntimeConfig;
    use crate::core::router::Router;
    use crate::core::worker::ThreadWorkerFactory;
    use crate::error::AgentError;
    use crate::policies::NeverFatal;
    use crate::Agent;
    use std::sync::Weak;
    use std::sync::atomic::AtomicUsize;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        bound: AtomicUsize,
        started: AtomicUsize,
        joined: AtomicUsize,
        sentinels: AtomicUsize,
    }

    /// Drains the queue on its own thread, counting the sentinel it exits on.
    struct CountingWorker {
        counters: Arc<Counters>,
        queue: Option<Arc<WorkQueue>>,
        handle: Option<JoinHandle<()>>,
    }

    impl Worker for CountingWorker {
        fn bind(&mut self, _id: usize, _scheduler: Weak<Scheduler>, queue: Arc<WorkQueue>) {
            self.counters.bound.fetch_add(1, Ordering::SeqCst);
            self.queue = Some(queue);
        }

        fn start(&mut self) -> io::Result<()> {
            self.counters.started.fetch_add(1, Ordering::SeqCst);
            let queue = self.queue.clone().ok_or_else(|| io::Error::other("unbound"))?;
            let counters = self.counters.clone();
            self.handle = Some(thread::spawn(move || {
                while let Some(slot) = queue.take() {
                    if slot.is_sentinel() {
                        counters.sentinels.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                }
            }));
            Ok(())
        }

        fn join(&mut self) -> io::Result<()> {
            self.counters.joined.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = self.handle.take() {
                handle.join().map_err(|_| io::Error::other("worker panicked"))?;
            }
            Ok(())
        }
    }

    fn counting_factory(counters: Arc<Counters>) -> impl WorkerFactory {
        move || -> Box<dyn Worker> {
            Box::new(CountingWorker {
                counters: counters.clone(),
                queue: None,
                handle: None,
            })
        }
    }

    #[test]
    fn test_creates_configured_number_of_workers() {
        let counters = Arc::new(Counters::default());
        let scheduler = Scheduler::new(
            &counting_factory(counters.clone()),
            &RuntimeConfig::default(),
            Bus::new(16),
        )
        .unwrap();

        assert_eq!(scheduler.num_workers(), 5);
        assert_eq!(counters.bound.load(Ordering::SeqCst), 5);
        assert_eq!(counters.started.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejects_non_positive_worker_count() {
        for n in [0i64, -1] {
            let err = Scheduler::new(&ThreadWorkerFactory, &n, Bus::new(16)).unwrap_err();
            assert_eq!(err, ConfigError::InvalidWorkerThreads(n));
        }
    }

    #[test]
    fn test_stop_queues_one_sentinel_per_worker() {
        let scheduler = Scheduler::new(&ThreadWorkerFactory, &5i64, Bus::new(16)).unwrap();
        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.pending(), 5);
    }

    #[test]
    fn test_each_worker_exits_on_its_own_sentinel() {
        let counters = Arc::new(Counters::default());
        let scheduler =
            Scheduler::new(&counting_factory(counters.clone()), &5i64, Bus::new(16)).unwrap();

        scheduler.start().unwrap();
        scheduler.start().unwrap();
        scheduler.stop();
        scheduler.join().unwrap();

        assert_eq!(counters.started.load(Ordering::SeqCst), 5);
        assert_eq!(counters.joined.load(Ordering::SeqCst), 5);
        assert_eq!(counters.sentinels.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_thread_pool_start_stop_join() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let scheduler = Scheduler::new(&ThreadWorkerFactory, &3i64, bus).unwrap();
        scheduler.start().unwrap();
        scheduler.stop();
        scheduler.join().unwrap();

        assert!(scheduler.errors().is_empty());
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::SchedulerStarted);
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::SchedulerStopping);
    }

    #[test]
    fn test_escaped_panic_tears_down_pool() {
        let router = Router::new(Arc::new(NeverFatal), Bus::new(64));
        let scheduler = Scheduler::new(&ThreadWorkerFactory, &2i64, Bus::new(16)).unwrap();
        let failed = scheduler.failed_token();
        scheduler.start().unwrap();

        let agent = Agent::builder("fragile").pooled();
        agent
            .register_handler(|_a, _n: u8| -> Result<(), crate::BoxError> { panic!("worker kaboom") })
            .unwrap();
        agent.setup().unwrap();
        agent.execution().attach_scheduler(scheduler.clone());
        router.register_agent(&agent, true).unwrap();
        agent.start().unwrap();
        agent.submit(1u8);

        scheduler.join().unwrap();

        assert!(failed.is_cancelled());
        let errors = scheduler.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "worker kaboom");
        assert!(matches!(agent.error(), Some(AgentError::Panicked { .. })));
        assert!(agent.join_timeout(Duration::from_secs(1)).unwrap());
    }
}
