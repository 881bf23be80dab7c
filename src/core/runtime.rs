//! # Runtime: bootstrap facade over router, worker pool and event fan-out.
//!
//! The [`Runtime`] is an explicit context value (no global instance). It owns
//! the event bus, the [`Router`] and the [`Scheduler`], and drives one run of
//! the agent system.
//!
//! ## Run sequence
//! ```text
//! run():
//!   INIT ──► RUNNING (once; otherwise AlreadyRunning)
//!   spawn subscriber listener: Bus ─► SubscriberSet::emit(&Event)
//!   scheduler.start()                 (only if a pooled agent was registered)
//!   router.start_all()
//!   select {
//!     router.wait_all_stopped()       ─► done
//!     scheduler failed                ─► router.stop_all(), WorkerFailed
//!     OS signal (handle_signals)      ─► ShutdownRequested, router.stop_all(), wait
//!   }
//!   on error ─► router.stop_all()
//!   wait up to `grace` for stopped agents to terminate
//!   scheduler.stop() + join()         (on a blocking thread)
//!   drain listener, shut subscribers down
//!   ──► STOPPED; errors surface as RuntimeError::Failed(cause)
//! ```
//!
//! ## Example
//! ```rust
//! use agentvisor::{Agent, Runtime, RuntimeConfig};
//!
//! #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = RuntimeConfig { handle_signals: false, ..RuntimeConfig::default() };
//!     let runtime = Runtime::builder(cfg).build()?;
//!
//!     let greeter = Agent::builder("greeter").pooled();
//!     greeter.register_handler(|agent, name: String| {
//!         println!("hello, {name}");
//!         agent.stop()?;
//!         Ok(())
//!     })?;
//!     greeter.setup()?;
//!     runtime.register(&greeter, true)?;
//!
//!     greeter.submit(String::from("world"));
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agents::AgentRef;
use crate::core::builder::RuntimeBuilder;
use crate::core::config::RuntimeConfig;
use crate::core::router::Router;
use crate::core::scheduler::Scheduler;
use crate::core::shutdown;
use crate::error::{AgentError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Lifecycle of a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Built, `run()` not called yet.
    Init,
    /// Inside `run()`.
    Running,
    /// `run()` returned.
    Stopped,
}

impl RuntimeState {
    /// Returns a short stable label for logs/errors.
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeState::Init => "init",
            RuntimeState::Running => "running",
            RuntimeState::Stopped => "stopped",
        }
    }
}

/// Owns the router and worker pool and runs the agent system once.
pub struct Runtime {
    cfg: RuntimeConfig,
    bus: Bus,
    router: Arc<Router>,
    scheduler: Arc<Scheduler>,
    events: Mutex<Option<broadcast::Receiver<Event>>>,
    subscribers: Mutex<Vec<Arc<dyn Subscribe>>>,
    state: Mutex<RuntimeState>,
    needs_scheduler: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Runtime {
    /// Starts building a runtime.
    pub fn builder(cfg: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    /// Builds a runtime with default policy, workers and no subscribers.
    pub fn new(cfg: RuntimeConfig) -> Result<Self, RuntimeError> {
        Self::builder(cfg).build()
    }

    pub(crate) fn new_internal(
        cfg: RuntimeConfig,
        bus: Bus,
        events: broadcast::Receiver<Event>,
        router: Arc<Router>,
        scheduler: Arc<Scheduler>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            router,
            scheduler,
            events: Mutex::new(Some(events)),
            subscribers: Mutex::new(subscribers),
            state: Mutex::new(RuntimeState::Init),
            needs_scheduler: AtomicBool::new(false),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.cfg
    }

    /// Event bus shared by every component.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The agent directory.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// The worker pool.
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RuntimeState {
        *lock(&self.state)
    }

    // ---------------------------
    // Registration
    // ---------------------------

    /// Registers `agent` with the router and hands it the worker pool if its
    /// strategy wants one. Returns the agent's index in its group.
    pub fn register(&self, agent: &AgentRef, unique: bool) -> Result<usize, RuntimeError> {
        if agent.execution().attach_scheduler(self.scheduler.clone()) {
            self.needs_scheduler.store(true, Ordering::SeqCst);
        }
        Ok(self.router.register_agent(agent, unique)?)
    }

    /// Creates `n` agents with `make(i)`, sets each up and registers it in a
    /// shared (non-unique) group.
    pub fn register_instances<F>(&self, n: usize, mut make: F) -> Result<Vec<AgentRef>, RuntimeError>
    where
        F: FnMut(usize) -> Result<AgentRef, AgentError>,
    {
        let mut agents = Vec::with_capacity(n);
        for i in 0..n {
            let agent = make(i)?;
            agent.setup()?;
            self.register(&agent, false)?;
            agents.push(agent);
        }
        Ok(agents)
    }

    // ---------------------------
    // Run
    // ---------------------------

    /// Starts every registered agent and waits until all of them stopped.
    ///
    /// May be called once. Any failure stops all agents and is returned as
    /// [`RuntimeError::Failed`].
    pub async fn run(&self) -> Result<(), RuntimeError> {
        {
            let mut state = lock(&self.state);
            if *state != RuntimeState::Init {
                return Err(RuntimeError::AlreadyRunning {
                    state: state.as_str(),
                });
            }
            *state = RuntimeState::Running;
        }

        let subs = Arc::new(SubscriberSet::new(
            std::mem::take(&mut *lock(&self.subscribers)),
            self.bus.clone(),
        ));
        let listener_stop = CancellationToken::new();
        let listener = self.subscriber_listener(Arc::clone(&subs), listener_stop.clone());

        let mut result = self.drive().await;
        if result.is_err() {
            self.router.stop_all();
        }
        if self.scheduler.errors().is_empty() {
            self.await_terminated().await;
        }
        let joined = self.shutdown_scheduler().await;
        result = result.and(joined);

        listener_stop.cancel();
        let _ = listener.await;
        if let Ok(subs) = Arc::try_unwrap(subs) {
            subs.shutdown().await;
        }

        *lock(&self.state) = RuntimeState::Stopped;
        result.map_err(|e| RuntimeError::Failed(Box::new(e)))
    }

    async fn drive(&self) -> Result<(), RuntimeError> {
        if self.needs_scheduler.load(Ordering::SeqCst) {
            self.scheduler.start()?;
        }
        if self.router.is_empty() {
            debug!("no agents registered; nothing to run");
            return Ok(());
        }

        self.router.start_all()?;

        let failed = self.scheduler.failed_token();
        tokio::select! {
            _ = self.router.wait_all_stopped() => {}
            _ = failed.cancelled() => {
                self.router.stop_all();
            }
            signal = shutdown::wait_for_shutdown_signal(), if self.cfg.handle_signals => {
                match signal {
                    Ok(name) => {
                        info!(signal = name, "shutdown requested");
                        self.bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(name));
                        self.router.stop_all();
                    }
                    Err(err) => warn!(error = %err, "cannot listen for shutdown signals"),
                }
                tokio::select! {
                    _ = self.router.wait_all_stopped() => {}
                    _ = failed.cancelled() => self.router.stop_all(),
                }
            }
        }

        match self.scheduler.errors().into_iter().next() {
            Some(fault) => Err(RuntimeError::WorkerFailed {
                worker: fault.worker,
                message: fault.message,
            }),
            None => Ok(()),
        }
    }

    /// Gives started agents up to `grace` to consume their Stop message.
    async fn await_terminated(&self) {
        let agents: Vec<AgentRef> = self
            .router
            .agents()
            .into_iter()
            .filter(|agent| agent.is_started())
            .collect();
        if agents.is_empty() {
            return;
        }

        let grace = self.cfg.grace;
        let waited = tokio::task::spawn_blocking(move || {
            let deadline = Instant::now() + grace;
            agents
                .iter()
                .filter(|agent| {
                    let left = deadline.saturating_duration_since(Instant::now());
                    matches!(agent.join_timeout(left), Ok(false))
                })
                .map(|agent| format!("{}#{}", agent.name(), agent.index()))
                .collect::<Vec<_>>()
        })
        .await;

        match waited {
            Ok(stuck) if stuck.is_empty() => {}
            Ok(stuck) => warn!(?stuck, ?grace, "agents did not terminate within grace"),
            Err(err) => warn!(error = %err, "termination wait failed"),
        }
    }

    async fn shutdown_scheduler(&self) -> Result<(), RuntimeError> {
        if !self.needs_scheduler.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.scheduler.stop();
        let scheduler = Arc::clone(&self.scheduler);
        tokio::task::spawn_blocking(move || scheduler.join())
            .await
            .map_err(std::io::Error::other)??;
        Ok(())
    }

    /// Forwards bus events to the subscriber set until `stop` is cancelled,
    /// then drains what is already buffered.
    fn subscriber_listener(&self, set: Arc<SubscriberSet>, stop: CancellationToken) -> JoinHandle<()> {
        let mut rx = lock(&self.events)
            .take()
            .unwrap_or_else(|| self.bus.subscribe());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscriber listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => {
                        while let Ok(ev) = rx.try_recv() {
                            set.emit(&ev);
                        }
                        break;
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("cfg", &self.cfg)
            .field("state", &self.state())
            .field("router", &self.router)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
