//! # Pool workers.
//!
//! A [`Worker`] takes [`Slot`](crate::core::Slot)s from the scheduler's queue
//! until it meets a sentinel. [`ThreadWorker`] is the default: one named OS
//! thread per worker. Plug another one in with a [`WorkerFactory`]; closures
//! `Fn() -> Box<dyn Worker>` are factories too.
//!
//! ## Worker loop
//! ```text
//! loop {
//!   slot = queue.take()
//!   sentinel?  ──► log "closing worker", exit
//!   agent      ──► catch_unwind(agent cycle)
//!                     └─ panic ──► agent fails (Panicked)
//!                                  scheduler.signal_error(id, msg) ──► stop(), exit
//! }
//! ```

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::core::scheduler::{Scheduler, WorkQueue};
use crate::error::{AgentError, panic_message};

/// One member of the worker pool.
pub trait Worker: Send + 'static {
    /// Attaches the worker to its pool. Called once, before `start`.
    fn bind(&mut self, id: usize, scheduler: Weak<Scheduler>, queue: Arc<WorkQueue>);

    /// Begins taking slots.
    fn start(&mut self) -> io::Result<()>;

    /// Blocks until the worker has exited.
    fn join(&mut self) -> io::Result<()>;
}

/// Builds the workers of a pool.
pub trait WorkerFactory {
    /// Creates one unbound worker.
    fn new_worker(&self) -> Box<dyn Worker>;
}

impl<F> WorkerFactory for F
where
    F: Fn() -> Box<dyn Worker>,
{
    fn new_worker(&self) -> Box<dyn Worker> {
        self()
    }
}

/// Factory for [`ThreadWorker`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadWorkerFactory;

impl WorkerFactory for ThreadWorkerFactory {
    fn new_worker(&self) -> Box<dyn Worker> {
        Box::new(ThreadWorker::default())
    }
}

/// Worker backed by a thread named `agentvisor-worker-<id>`.
#[derive(Default)]
pub struct ThreadWorker {
    id: usize,
    scheduler: Weak<Scheduler>,
    queue: Option<Arc<WorkQueue>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    fn run(id: usize, scheduler: Weak<Scheduler>, queue: Arc<WorkQueue>) {
        while let Some(slot) = queue.take() {
            let Some(agent) = slot.into_agent() else {
                debug!(worker = id, "closing worker");
                return;
            };

            trace!(worker = id, agent = %agent.name(), index = agent.index(), "handling slot");
            let cycle = panic::catch_unwind(AssertUnwindSafe(|| agent.run_scheduled_cycle()));
            if let Err(payload) = cycle {
                let message = panic_message(payload.as_ref());
                agent.fail(AgentError::Panicked {
                    message: message.clone(),
                });
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.signal_error(id, message);
                }
                return;
            }
        }
    }
}

impl Worker for ThreadWorker {
    fn bind(&mut self, id: usize, scheduler: Weak<Scheduler>, queue: Arc<WorkQueue>) {
        self.id = id;
        self.scheduler = scheduler;
        self.queue = Some(queue);
    }

    fn start(&mut self) -> io::Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let queue = self
            .queue
            .clone()
            .ok_or_else(|| io::Error::other("worker started before being bound"))?;
        let (id, scheduler) = (self.id, self.scheduler.clone());

        let handle = thread::Builder::new()
            .name(format!("agentvisor-worker-{id}"))
            .spawn(move || Self::run(id, scheduler, queue))?;
        self.handle = Some(handle);
        Ok(())
    }

    fn join(&mut self) -> io::Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|payload| io::Error::other(panic_message(payload.as_ref()))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_worker_refuses_to_start() {
        let mut worker = ThreadWorker::default();
        assert!(worker.start().is_err());
        worker.join().unwrap();
    }

    #[test]
    fn test_worker_exits_on_sentinel() {
        let queue = Arc::new(WorkQueue::unbounded());
        let mut worker = ThreadWorkerFactory.new_worker();
        worker.bind(7, Weak::new(), queue.clone());
        worker.start().unwrap();

        queue.put(crate::core::Slot::sentinel()).unwrap();
        worker.join().unwrap();
        assert!(queue.is_empty());
    }
}
