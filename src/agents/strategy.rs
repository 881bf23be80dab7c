//! # Execution strategies: who runs an agent's consume cycles.
//!
//! - [`Dedicated`]: one OS thread per agent, looping consume cycles until the
//!   agent is `STOPPED`.
//! - [`Pooled`]: no thread of its own; the agent is handed to the shared
//!   [`Scheduler`] whenever it has mail, and at most one cycle is in flight.
//!
//! The [`Execution`] trait is the seam between an [`Agent`] and whatever drives
//! it. The agent calls its hooks at fixed points of the lifecycle:
//!
//! ```text
//! start() ──► ready() ──► on_start()
//! submit() ─────────────► on_submit()
//! Stop consumed ────────► on_stop()
//! pooled cycle done ────► after_cycle()
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace};

use crate::agents::agent::{Agent, AgentRef};
use crate::agents::latch::{Latch, ReleaseOnDrop};
use crate::agents::status::AgentStatus;
use crate::core::Scheduler;
use crate::error::{AgentError, panic_message};

/// Drives the consume cycles of one agent.
///
/// Every hook except [`kind`](Self::kind) and [`on_start`](Self::on_start) has
/// a no-op default.
pub trait Execution: Send + Sync + 'static {
    /// Short label for logs.
    fn kind(&self) -> &'static str;

    /// Checked by `start()` before anything is signalled.
    fn ready(&self, _agent: &AgentRef) -> Result<(), AgentError> {
        Ok(())
    }

    /// Begins driving the agent.
    fn on_start(&self, agent: &AgentRef) -> Result<(), AgentError>;

    /// Called from the Stop handler, on the thread running the cycle.
    fn on_stop(&self, _agent: &AgentRef) {}

    /// Called after every successful `submit`.
    fn on_submit(&self, _agent: &AgentRef) {}

    /// Called by a pool worker after each cycle it ran for this agent.
    fn after_cycle(&self, _agent: &AgentRef) {}

    /// Offers the shared scheduler; returns `true` if this strategy uses it.
    fn attach_scheduler(&self, _scheduler: Arc<Scheduler>) -> bool {
        false
    }

    /// Blocks until the agent has terminated.
    fn join(&self, agent: &Agent) -> Result<(), AgentError> {
        agent.terminated().wait();
        Ok(())
    }

    /// Like `join`, bounded by `timeout`. Returns whether the agent terminated.
    fn join_timeout(&self, agent: &Agent, timeout: Duration) -> Result<bool, AgentError> {
        Ok(agent.terminated().wait_timeout(timeout))
    }
}

// ---------------------------
// Dedicated thread
// ---------------------------

/// One OS thread per agent, named after the agent.
pub struct Dedicated {
    thread: Mutex<Option<JoinHandle<()>>>,
    spawned: AtomicBool,
    exited: Arc<Latch>,
}

impl Dedicated {
    /// Creates the strategy; the thread is spawned by `start()`.
    pub fn new() -> Self {
        Self {
            thread: Mutex::new(None),
            spawned: AtomicBool::new(false),
            exited: Arc::new(Latch::new()),
        }
    }

    fn run(agent: AgentRef, exited: Arc<Latch>) {
        let _exit = ReleaseOnDrop(exited);
        debug!(agent = %agent.name(), "agent thread started");

        while agent.status() != AgentStatus::Stopped {
            let cycle = panic::catch_unwind(AssertUnwindSafe(|| agent.consume_message()));
            if let Err(payload) = cycle {
                agent.fail(AgentError::Panicked {
                    message: panic_message(payload.as_ref()),
                });
            }
        }

        debug!(agent = %agent.name(), "agent thread exited");
    }

    fn take_handle(&self) -> Option<JoinHandle<()>> {
        self.thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn join_handle(handle: JoinHandle<()>) -> Result<(), AgentError> {
        handle.join().map_err(|payload| AgentError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    }
}

impl Default for Dedicated {
    fn default() -> Self {
        Self::new()
    }
}

impl Execution for Dedicated {
    fn kind(&self) -> &'static str {
        "dedicated"
    }

    fn on_start(&self, agent: &AgentRef) -> Result<(), AgentError> {
        if self.spawned.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let worker = agent.clone();
        let exited = self.exited.clone();
        let handle = thread::Builder::new()
            .name(agent.name().to_string())
            .spawn(move || Self::run(worker, exited))
            .map_err(|e| {
                self.spawned.store(false, Ordering::SeqCst);
                AgentError::Spawn {
                    message: e.to_string(),
                }
            })?;

        *self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        Ok(())
    }

    fn join(&self, _agent: &Agent) -> Result<(), AgentError> {
        match self.take_handle() {
            Some(handle) => Self::join_handle(handle),
            None => Ok(()),
        }
    }

    fn join_timeout(&self, _agent: &Agent, timeout: Duration) -> Result<bool, AgentError> {
        if !self.spawned.load(Ordering::SeqCst) {
            return Ok(true);
        }
        if !self.exited.wait_timeout(timeout) {
            return Ok(false);
        }
        if let Some(handle) = self.take_handle() {
            Self::join_handle(handle)?;
        }
        Ok(true)
    }
}

// ---------------------------
// Worker pool
// ---------------------------

/// Scheduled on the shared worker pool whenever the mailbox is non-empty.
///
/// A `scheduled` flag guarantees at most one slot per agent sits in the work
/// queue or runs on a worker, so cycles of one agent never overlap.
pub struct Pooled {
    scheduler: OnceLock<Arc<Scheduler>>,
    started: AtomicBool,
    scheduled: AtomicBool,
}

impl Pooled {
    /// Creates the strategy; the scheduler is attached at registration.
    pub fn new() -> Self {
        Self {
            scheduler: OnceLock::new(),
            started: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
        }
    }

    /// True while a cycle for the agent is queued or running.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    fn schedule_if_idle(&self, agent: &AgentRef) {
        let Some(scheduler) = self.scheduler.get() else {
            return;
        };
        if !self.scheduled.swap(true, Ordering::SeqCst) {
            trace!(agent = %agent.name(), "scheduling agent");
            scheduler.schedule(agent.clone());
        }
    }
}

impl Default for Pooled {
    fn default() -> Self {
        Self::new()
    }
}

impl Execution for Pooled {
    fn kind(&self) -> &'static str {
        "pooled"
    }

    fn ready(&self, agent: &AgentRef) -> Result<(), AgentError> {
        match self.scheduler.get() {
            Some(_) => Ok(()),
            None => Err(AgentError::NoScheduler {
                name: agent.name().to_string(),
            }),
        }
    }

    fn on_start(&self, agent: &AgentRef) -> Result<(), AgentError> {
        self.started.store(true, Ordering::SeqCst);
        self.schedule_if_idle(agent);
        Ok(())
    }

    // Mail queued before start is scheduled by on_start.
    fn on_submit(&self, agent: &AgentRef) {
        if self.started.load(Ordering::SeqCst) {
            self.schedule_if_idle(agent);
        }
    }

    fn after_cycle(&self, agent: &AgentRef) {
        self.scheduled.store(false, Ordering::SeqCst);
        if agent.pending() > 0 {
            self.schedule_if_idle(agent);
        }
    }

    fn attach_scheduler(&self, scheduler: Arc<Scheduler>) -> bool {
        let _ = self.scheduler.set(scheduler);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::message::StopAgent;
    use crate::core::{Router, ThreadWorkerFactory};
    use crate::events::Bus;
    use crate::policies::NeverFatal;
    use std::sync::atomic::AtomicUsize;

    fn router() -> Arc<Router> {
        Router::new(Arc::new(NeverFatal), Bus::new(64))
    }

    #[test]
    fn test_dedicated_runs_until_stopped() {
        let router = router();
        let agent = Agent::builder("worker").dedicated();
        let sum = Arc::new(AtomicUsize::new(0));
        {
            let sum = sum.clone();
            agent
                .register_handler(move |_a, n: usize| {
                    sum.fetch_add(n, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        agent.setup().unwrap();
        router.register_agent(&agent, true).unwrap();

        agent.start().unwrap();
        for n in 1..=10 {
            agent.submit(n);
        }
        agent.stop().unwrap();

        assert!(agent.join_timeout(Duration::from_secs(5)).unwrap());
        assert_eq!(sum.load(Ordering::SeqCst), 55);
        assert_eq!(agent.status(), AgentStatus::Stopped);
        assert!(agent.error().is_none());
        assert_eq!(router.running(), 0);
    }

    #[test]
    fn test_dedicated_panic_becomes_agent_error() {
        let router = router();
        let agent = Agent::builder("fragile").dedicated();
        agent
            .register_handler(|_a, _n: u8| -> Result<(), crate::BoxError> { panic!("kaboom") })
            .unwrap();
        agent.setup().unwrap();
        router.register_agent(&agent, true).unwrap();

        agent.start().unwrap();
        agent.submit(1u8);

        assert!(agent.join_timeout(Duration::from_secs(5)).unwrap());
        match agent.error() {
            Some(AgentError::Panicked { message }) => assert_eq!(message, "kaboom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_join_without_start_returns() {
        let agent = Agent::builder("idle").dedicated();
        agent.join().unwrap();
        assert!(agent.join_timeout(Duration::from_millis(1)).unwrap());
    }

    #[test]
    fn test_pooled_start_requires_scheduler() {
        let router = router();
        let agent = Agent::builder("pooled").pooled();
        agent.setup().unwrap();
        router.register_agent(&agent, true).unwrap();

        assert!(matches!(agent.start(), Err(AgentError::NoScheduler { .. })));
        assert!(!agent.is_started());
        assert_eq!(router.running(), 0);
    }

    #[test]
    fn test_pooled_cycles_never_overlap() {
        let router = router();
        let scheduler = Scheduler::new(&ThreadWorkerFactory, &4i64, Bus::new(64)).unwrap();
        scheduler.start().unwrap();

        let agent = Agent::builder("serial").pooled();
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let (active, overlaps, seen) = (active.clone(), overlaps.clone(), seen.clone());
            agent
                .register_handler(move |_a, _n: u32| {
                    if active.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_micros(200));
                    seen.fetch_add(1, Ordering::SeqCst);
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        agent.setup().unwrap();
        assert!(agent.execution().attach_scheduler(scheduler.clone()));
        router.register_agent(&agent, true).unwrap();
        agent.start().unwrap();

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let agent = agent.clone();
                thread::spawn(move || {
                    for n in 0..50u32 {
                        agent.submit(n);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        agent.stop().unwrap();

        assert!(agent.join_timeout(Duration::from_secs(10)).unwrap());
        scheduler.stop();
        scheduler.join().unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 200);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert!(agent.error().is_none());
    }

    fn pooled_with_exit_handler<F>(
        name: &str,
        on_exit: F,
    ) -> anyhow::Result<(Arc<Router>, Arc<Scheduler>, AgentRef)>
    where
        F: FnMut(&AgentRef, &StopAgent) -> Result<(), crate::BoxError> + Send + 'static,
    {
        let router = router();
        let scheduler = Scheduler::new(&ThreadWorkerFactory, &2i64, Bus::new(64))?;
        scheduler.start()?;

        let agent = Agent::builder(name).pooled();
        agent.register_exit_handler(on_exit)?;
        agent.setup()?;
        assert!(agent.execution().attach_scheduler(scheduler.clone()));
        router.register_agent(&agent, true)?;
        Ok((router, scheduler, agent))
    }

    #[test]
    fn test_pooled_join_waits_for_exit_handler() -> anyhow::Result<()> {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let (router, scheduler, agent) = pooled_with_exit_handler("slow-exit", move |_a, _stop| {
            thread::sleep(Duration::from_millis(300));
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })?;

        agent.start()?;
        agent.stop()?;
        agent.join()?;

        assert!(done.load(Ordering::SeqCst));
        assert!(agent.error().is_none());
        assert_eq!(router.running(), 0);

        scheduler.stop();
        scheduler.join()?;
        Ok(())
    }

    #[test]
    fn test_failed_exit_handler_is_recorded_before_join_returns() -> anyhow::Result<()> {
        let (_router, scheduler, agent) = pooled_with_exit_handler("bad-exit", |_a, _stop| {
            thread::sleep(Duration::from_millis(50));
            Err("cleanup failed".into())
        })?;

        agent.start()?;
        agent.stop()?;
        assert!(agent.join_timeout(Duration::from_secs(5))?);

        assert!(matches!(agent.error(), Some(AgentError::Handler { .. })));
        assert_eq!(agent.status(), AgentStatus::Stopped);

        scheduler.stop();
        scheduler.join()?;
        Ok(())
    }
}
