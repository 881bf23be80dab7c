//! # Agent: mailbox, handler table and lifecycle state machine.
//!
//! An [`Agent`] owns a FIFO mailbox and a table of handlers keyed by the exact
//! message type. Messages are processed one at a time by *consume cycles*,
//! driven either by the agent's own thread ([`Dedicated`](crate::Dedicated))
//! or by the shared worker pool ([`Pooled`](crate::Pooled)).
//!
//! ## Consume cycle
//! ```text
//! take() (blocks) ──► already failed?  ──yes──► fail(AlreadyFailed)
//!                        │ no
//!                        ▼
//!                  published STOPPED? ──yes──► log + drop (no router signal)
//!                        │ no
//!                        ▼
//!                  message is a Fault? ──yes──► fail(Fault)
//!                        │ no
//!                        ▼
//!                  handler for exact type? ──no──► fail(UnknownMessage)
//!                        │ yes
//!                        ▼
//!                  handler(msg) ──Err──► fail(Handler)
//!
//! fail(e): status = STOPPED, record e (first error wins), router.signal_error(name, e)
//! ```
//!
//! ## Lifecycle
//! ```text
//! register_handler()* ─► setup() ─► start() ─► ... ─► stop()
//!                                     │                 │
//!                          router count++         router count--
//!                          submit(InitAgent)      submit(StopAgent)
//!                          strategy.on_start()
//! ```
//!
//! ## Rules
//! - At most one consume cycle runs at a time for a given agent.
//! - A fault stops the agent for good; nothing is replayed.
//! - A fault moves the raw status to `STOPPED` but leaves the published status
//!   as it was; later messages fail with `AlreadyFailed` instead of being
//!   dropped silently.
//! - Faults never escape `consume_message`; only a panic can.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tracing::{debug, warn};

use crate::agents::handler::HandlerTable;
use crate::agents::latch::Latch;
use crate::agents::message::{Envelope, InitAgent, StopAgent};
use crate::agents::status::{AgentStatus, AtomicStatus};
use crate::agents::strategy::{Dedicated, Execution, Pooled};
use crate::core::{BlockingQueue, Router};
use crate::error::{AgentError, BoxError, Fault, panic_message};
use crate::events::{Event, EventKind};

/// Shared handle to an agent.
pub type AgentRef = Arc<Agent>;

type InitHandler = Box<dyn FnMut(&AgentRef, &InitAgent) -> Result<(), BoxError> + Send + 'static>;
type ExitHandler = Box<dyn FnMut(&AgentRef, &StopAgent) -> Result<(), BoxError> + Send + 'static>;

const NORMAL_STOP: &str = "Normal stop call";

#[derive(Default)]
struct Lifecycle {
    setup: bool,
    started: bool,
    stopped: bool,
}

/// An independent unit of execution with a private mailbox.
pub struct Agent {
    name: String,
    index: AtomicUsize,
    mailbox: BlockingQueue<Envelope>,
    handlers: Mutex<HandlerTable>,
    init_handler: Mutex<Option<InitHandler>>,
    exit_handler: Mutex<Option<ExitHandler>>,
    status: Mutex<AgentStatus>,
    published: AtomicStatus,
    lifecycle: Mutex<Lifecycle>,
    error: Mutex<Option<AgentError>>,
    router: Mutex<Weak<Router>>,
    execution: Box<dyn Execution>,
    terminated: Latch,
}

/// Builder for [`Agent`].
///
/// ```
/// use agentvisor::Agent;
///
/// let agent = Agent::builder("counter").capacity(64).pooled();
/// assert_eq!(agent.name(), "counter");
/// assert_eq!(agent.capacity(), Some(64));
/// ```
#[derive(Debug, Clone)]
pub struct AgentBuilder {
    name: String,
    capacity: usize,
}

impl AgentBuilder {
    /// Creates a builder for an agent with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: 0,
        }
    }

    /// Bounds the mailbox; `0` (default) means unbounded.
    ///
    /// A bounded mailbox makes `submit` block while it is full.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builds an agent running on its own OS thread.
    pub fn dedicated(self) -> AgentRef {
        self.build(Dedicated::new())
    }

    /// Builds an agent driven by the shared worker pool.
    pub fn pooled(self) -> AgentRef {
        self.build(Pooled::new())
    }

    /// Builds an agent with a custom execution strategy.
    pub fn build(self, execution: impl Execution) -> AgentRef {
        Arc::new(Agent {
            name: self.name,
            index: AtomicUsize::new(0),
            mailbox: BlockingQueue::new(self.capacity),
            handlers: Mutex::new(HandlerTable::new()),
            init_handler: Mutex::new(None),
            exit_handler: Mutex::new(None),
            status: Mutex::new(AgentStatus::Init),
            published: AtomicStatus::new(AgentStatus::Init),
            lifecycle: Mutex::new(Lifecycle::default()),
            error: Mutex::new(None),
            router: Mutex::new(Weak::new()),
            execution: Box::new(execution),
            terminated: Latch::new(),
        })
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Agent {
    /// Starts building an agent.
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// Group name the agent registers under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero-based position inside its group (assigned at registration).
    pub fn index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    pub(crate) fn set_index(&self, index: usize) {
        self.index.store(index, Ordering::SeqCst);
    }

    /// Raw lifecycle status.
    pub fn status(&self) -> AgentStatus {
        *lock(&self.status)
    }

    /// Status published by the built-in handlers, used to drop late messages.
    pub fn published_status(&self) -> AgentStatus {
        self.published.load()
    }

    /// The first error that stopped this agent, if any.
    pub fn error(&self) -> Option<AgentError> {
        lock(&self.error).clone()
    }

    /// Number of messages waiting in the mailbox.
    pub fn pending(&self) -> usize {
        self.mailbox.len()
    }

    /// Mailbox bound, `None` if unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.mailbox.capacity()
    }

    /// True once `start()` succeeded.
    pub fn is_started(&self) -> bool {
        lock(&self.lifecycle).started
    }

    /// The execution strategy driving this agent.
    pub fn execution(&self) -> &dyn Execution {
        self.execution.as_ref()
    }

    /// The router this agent is registered with, if it is still alive.
    pub fn router(&self) -> Option<Arc<Router>> {
        lock(&self.router).upgrade()
    }

    pub(crate) fn bind_router(&self, router: Weak<Router>) {
        *lock(&self.router) = router;
    }

    pub(crate) fn terminated(&self) -> &Latch {
        &self.terminated
    }

    // ---------------------------
    // Handler registration
    // ---------------------------

    /// Registers the handler for messages of exactly type `M`.
    ///
    /// Fails with [`AgentError::DuplicateHandler`] if `M` already has one.
    /// Must not be called from inside a handler of the same agent.
    ///
    /// ```
    /// use agentvisor::Agent;
    ///
    /// let agent = Agent::builder("echo").dedicated();
    /// agent.register_handler(|_agent, n: u32| {
    ///     println!("got {n}");
    ///     Ok(())
    /// }).unwrap();
    /// assert!(agent.register_handler(|_agent, _n: u32| Ok(())).is_err());
    /// ```
    pub fn register_handler<M, F>(&self, handler: F) -> Result<(), AgentError>
    where
        M: Any + Send,
        F: FnMut(&AgentRef, M) -> Result<(), BoxError> + Send + 'static,
    {
        lock(&self.handlers).insert::<M, F>(handler)
    }

    /// Registers the callback run when the Init message is consumed.
    pub fn register_init_handler<F>(&self, handler: F) -> Result<(), AgentError>
    where
        F: FnMut(&AgentRef, &InitAgent) -> Result<(), BoxError> + Send + 'static,
    {
        let mut slot = lock(&self.init_handler);
        if slot.is_some() {
            return Err(AgentError::InitHandlerExists);
        }
        *slot = Some(Box::new(handler));
        Ok(())
    }

    /// Registers the callback run when the Stop message is consumed.
    pub fn register_exit_handler<F>(&self, handler: F) -> Result<(), AgentError>
    where
        F: FnMut(&AgentRef, &StopAgent) -> Result<(), BoxError> + Send + 'static,
    {
        let mut slot = lock(&self.exit_handler);
        if slot.is_some() {
            return Err(AgentError::ExitHandlerExists);
        }
        *slot = Some(Box::new(handler));
        Ok(())
    }

    /// Installs the built-in handlers for [`InitAgent`], [`StopAgent`] and [`Fault`].
    ///
    /// Must precede [`start`](Self::start). User handlers for these types
    /// registered earlier make `setup` fail.
    pub fn setup(&self) -> Result<(), AgentError> {
        let mut lc = lock(&self.lifecycle);
        if lc.setup {
            return Err(AgentError::AlreadySetup);
        }

        let mut table = lock(&self.handlers);
        table.insert(|agent: &AgentRef, msg: InitAgent| agent.on_init(&msg))?;
        table.insert(|agent: &AgentRef, msg: StopAgent| agent.on_stop(&msg))?;
        table.insert(|_agent: &AgentRef, fault: Fault| Err(Box::new(fault) as BoxError))?;

        lc.setup = true;
        Ok(())
    }

    fn on_init(self: &Arc<Self>, msg: &InitAgent) -> Result<(), BoxError> {
        self.set_status(AgentStatus::Running);
        self.published.store(AgentStatus::Running);

        if let Some(handler) = lock(&self.init_handler).as_mut() {
            handler(self, msg)?;
        }
        Ok(())
    }

    fn on_stop(self: &Arc<Self>, msg: &StopAgent) -> Result<(), BoxError> {
        *lock(&self.status) = AgentStatus::Stopped;
        self.published.store(AgentStatus::Stopped);
        debug!(agent = %self.name, cause = msg.cause(), "agent stopped");

        let exited = match lock(&self.exit_handler).as_mut() {
            Some(handler) => handler(self, msg),
            None => Ok(()),
        };
        self.execution.on_stop(self);

        // A failed exit handler goes through fail(), which releases the latch
        // once the error is recorded.
        if exited.is_ok() {
            self.terminated.release();
        }
        exited
    }

    fn set_status(&self, status: AgentStatus) {
        *lock(&self.status) = status;
        if status == AgentStatus::Stopped {
            self.terminated.release();
        }
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Starts the agent: router count++, Init message, strategy start hook.
    ///
    /// Idempotent once it succeeded. Fails with [`AgentError::NotSetup`] before
    /// [`setup`](Self::setup), with [`AgentError::NotRegistered`] if no router
    /// is bound and with [`AgentError::RouterDown`] once every agent stopped.
    pub fn start(self: &Arc<Self>) -> Result<(), AgentError> {
        let mut lc = lock(&self.lifecycle);
        if !lc.setup {
            return Err(AgentError::NotSetup);
        }
        if lc.started {
            return Ok(());
        }

        let router = self.router().ok_or_else(|| AgentError::NotRegistered {
            name: self.name.clone(),
        })?;
        self.execution.ready(self)?;
        router
            .signal_agent_start(self)
            .map_err(|_| AgentError::RouterDown {
                name: self.name.clone(),
            })?;

        lc.started = true;
        self.submit(InitAgent);

        if let Err(err) = self.execution.on_start(self) {
            lc.stopped = true;
            router.signal_agent_stop(self);
            return Err(err);
        }
        Ok(())
    }

    /// Stops the agent with the default cause.
    pub fn stop(self: &Arc<Self>) -> Result<(), AgentError> {
        self.stop_with_cause(NORMAL_STOP)
    }

    /// Stops the agent: router count--, Stop message carrying `cause`.
    ///
    /// Idempotent once it succeeded. Fails with [`AgentError::NotStarted`]
    /// before [`start`](Self::start).
    pub fn stop_with_cause(self: &Arc<Self>, cause: impl Into<String>) -> Result<(), AgentError> {
        let mut lc = lock(&self.lifecycle);
        if !lc.started {
            return Err(AgentError::NotStarted);
        }
        if lc.stopped {
            return Ok(());
        }
        lc.stopped = true;

        match self.router() {
            Some(router) => router.signal_agent_stop(self),
            None => warn!(agent = %self.name, "router is gone; stop not counted"),
        }
        self.submit(StopAgent::new(cause));
        Ok(())
    }

    /// Blocks until the agent has terminated.
    pub fn join(&self) -> Result<(), AgentError> {
        self.execution.join(self)
    }

    /// Like [`join`](Self::join) but gives up after `timeout`; returns whether it terminated.
    pub fn join_timeout(&self, timeout: Duration) -> Result<bool, AgentError> {
        self.execution.join_timeout(self, timeout)
    }

    // ---------------------------
    // Messaging
    // ---------------------------

    /// Appends a message to the mailbox.
    ///
    /// Blocks while a bounded mailbox is full. Never fails: a message that
    /// cannot be queued is logged and dropped.
    pub fn submit<M: Any + Send>(self: &Arc<Self>, message: M) {
        if self.mailbox.put(Envelope::new(message)).is_err() {
            warn!(
                agent = %self.name,
                message = std::any::type_name::<M>(),
                "could not submit message"
            );
            return;
        }
        self.execution.on_submit(self);
    }

    /// Submits an error object; consuming it makes the agent fail.
    pub fn submit_fault(self: &Arc<Self>, fault: Fault) {
        self.submit(fault);
    }

    /// Sends `message` to agent `index` of group `dest`.
    pub fn route<M: Any + Send>(&self, dest: &str, index: usize, message: M) -> Result<(), AgentError> {
        let peer = self
            .router()
            .and_then(|router| router.get_agent_at(dest, index))
            .ok_or_else(|| AgentError::NoSuchPeer {
                name: dest.to_string(),
                index,
            })?;
        peer.submit(message);
        Ok(())
    }

    /// Sends `message` to the first agent of group `dest`.
    pub fn route_first<M: Any + Send>(&self, dest: &str, message: M) -> Result<(), AgentError> {
        self.route(dest, 0, message)
    }

    // ---------------------------
    // Consume cycle
    // ---------------------------

    /// Runs one consume cycle: blocks for a message, then dispatches or fails.
    ///
    /// Faults are handled internally (see module docs); this never returns an
    /// error. A panicking handler unwinds out of this call.
    pub fn consume_message(self: &Arc<Self>) {
        let Some(envelope) = self.mailbox.take() else {
            return;
        };
        if let Err(err) = self.dispatch(envelope) {
            self.fail(err);
        }
    }

    /// One cycle on behalf of the worker pool, followed by the strategy's re-scheduling.
    pub(crate) fn run_scheduled_cycle(self: &Arc<Self>) {
        self.consume_message();
        self.execution.after_cycle(self);
    }

    fn dispatch(self: &Arc<Self>, envelope: Envelope) -> Result<(), AgentError> {
        if lock(&self.error).is_some() {
            return Err(AgentError::AlreadyFailed);
        }

        if self.published.load() == AgentStatus::Stopped {
            warn!(agent = %self.name, message = envelope.type_name(), "dropped message");
            if let Some(router) = self.router() {
                router.bus().publish(
                    Event::new(EventKind::MessageDropped)
                        .with_agent(self.name.as_str())
                        .with_index(self.index())
                        .with_reason(envelope.type_name()),
                );
            }
            return Ok(());
        }

        let envelope = match envelope.into_fault() {
            Ok(fault) => return Err(AgentError::Fault(fault)),
            Err(envelope) => envelope,
        };

        lock(&self.handlers).dispatch(self, envelope)
    }

    /// Marks the agent as failed and notifies the router.
    pub(crate) fn fail(self: &Arc<Self>, err: AgentError) {
        {
            let mut first = lock(&self.error);
            if first.is_none() {
                *first = Some(err.clone());
            }
        }
        self.set_status(AgentStatus::Stopped);

        let Some(router) = self.router() else {
            warn!(agent = %self.name, error = %err, "ignoring error: no router to notify");
            return;
        };
        let notified = panic::catch_unwind(AssertUnwindSafe(|| router.signal_error(&self.name, &err)));
        if let Err(payload) = notified {
            warn!(
                agent = %self.name,
                error = %err,
                panic = %panic_message(payload.as_ref()),
                "ignoring error: router notification failed"
            );
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("index", &self.index())
            .field("status", &self.status())
            .field("execution", &self.execution.kind())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Router;
    use crate::events::Bus;
    use crate::policies::ErrorPolicy;
    use std::sync::atomic::AtomicUsize;

    /// Strategy with no thread and no pool: tests drive cycles by hand.
    #[derive(Default)]
    struct Manual {
        stops: Arc<AtomicUsize>,
    }

    impl Execution for Manual {
        fn kind(&self) -> &'static str {
            "manual"
        }

        fn on_start(&self, _agent: &AgentRef) -> Result<(), AgentError> {
            Ok(())
        }

        fn on_stop(&self, _agent: &AgentRef) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Records every `(agent, error label)` the router is told about; never fatal.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, &'static str)>>,
    }

    impl ErrorPolicy for Recorder {
        fn is_fatal(&self, agent: &str, error: &AgentError) -> bool {
            self.seen.lock().unwrap().push((agent.to_string(), error.as_label()));
            false
        }
    }

    fn fixture() -> (AgentRef, Arc<Router>, Arc<Recorder>, Arc<AtomicUsize>) {
        let recorder = Arc::new(Recorder::default());
        let router = Router::new(recorder.clone(), Bus::new(64));
        let stops = Arc::new(AtomicUsize::new(0));
        let agent = Agent::builder("name").build(Manual {
            stops: stops.clone(),
        });
        router.register_agent(&agent, true).unwrap();
        (agent, router, recorder, stops)
    }

    #[test]
    fn test_status_is_init_after_setup() {
        let (agent, _router, _rec, _stops) = fixture();
        agent.setup().unwrap();
        assert_eq!(agent.status(), AgentStatus::Init);
        assert_eq!(agent.published_status(), AgentStatus::Init);
        assert!(agent.error().is_none());
    }

    #[test]
    fn test_consume_integer_message() {
        let (agent, _router, rec, _stops) = fixture();
        let got = Arc::new(Mutex::new(Vec::new()));
        {
            let got = got.clone();
            agent
                .register_handler(move |_a, n: i32| {
                    got.lock().unwrap().push(n);
                    Ok(())
                })
                .unwrap();
        }

        agent.submit(3i32);
        agent.consume_message();

        assert_eq!(*got.lock().unwrap(), vec![3]);
        assert!(agent.error().is_none());
        assert!(rec.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_consume_fault_stops_and_signals_router() {
        let (agent, _router, rec, _stops) = fixture();
        agent.submit_fault(Fault::msg("error"));
        agent.consume_message();

        assert_eq!(agent.status(), AgentStatus::Stopped);
        let err = agent.error().expect("sticky error");
        assert!(matches!(&err, AgentError::Fault(f) if f.to_string() == "error"));
        assert_eq!(
            *rec.seen.lock().unwrap(),
            vec![("name".to_string(), "agent_fault")]
        );
    }

    #[test]
    fn test_init_then_stop_flow() {
        let (agent, _router, _rec, stops) = fixture();
        let inits = Arc::new(AtomicUsize::new(0));
        let exits = Arc::new(Mutex::new(Vec::new()));
        {
            let inits = inits.clone();
            agent
                .register_init_handler(move |_a, _m| {
                    inits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        {
            let exits = exits.clone();
            agent
                .register_exit_handler(move |_a, m| {
                    exits.lock().unwrap().push(m.cause().to_string());
                    Ok(())
                })
                .unwrap();
        }
        agent.setup().unwrap();

        agent.submit(InitAgent);
        agent.consume_message();
        assert_eq!(agent.status(), AgentStatus::Running);
        assert_eq!(inits.load(Ordering::SeqCst), 1);

        agent.submit(StopAgent::new(""));
        agent.consume_message();
        assert_eq!(agent.status(), AgentStatus::Stopped);
        assert_eq!(agent.published_status(), AgentStatus::Stopped);
        assert_eq!(exits.lock().unwrap().len(), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(agent.error().is_none());
    }

    #[test]
    fn test_messages_after_stop_are_dropped_silently() {
        let (agent, _router, rec, _stops) = fixture();
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = calls.clone();
            agent
                .register_handler(move |_a, _n: u8| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        agent.setup().unwrap();
        agent.submit(StopAgent::new("done"));
        agent.consume_message();

        agent.submit(1u8);
        agent.consume_message();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(agent.pending(), 0);
        assert!(agent.error().is_none());
        assert!(rec.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fault_keeps_published_status_and_later_messages_fail_again() {
        let (agent, _router, rec, _stops) = fixture();
        agent.setup().unwrap();
        agent.submit(InitAgent);
        agent.consume_message();

        agent.submit_fault(Fault::msg("first"));
        agent.consume_message();
        assert_eq!(agent.status(), AgentStatus::Stopped);
        assert_eq!(agent.published_status(), AgentStatus::Running);

        agent.submit(7u64);
        agent.consume_message();

        assert!(matches!(agent.error(), Some(AgentError::Fault(_))));
        assert_eq!(
            *rec.seen.lock().unwrap(),
            vec![
                ("name".to_string(), "agent_fault"),
                ("name".to_string(), "agent_already_failed"),
            ]
        );
    }

    #[test]
    fn test_unknown_message_type_fails() {
        let (agent, _router, rec, _stops) = fixture();
        agent.register_handler(|_a, _n: u32| Ok(())).unwrap();

        agent.submit(5u64);
        agent.consume_message();

        assert_eq!(agent.status(), AgentStatus::Stopped);
        assert!(matches!(
            agent.error(),
            Some(AgentError::UnknownMessage { message_type: "u64" })
        ));
        assert_eq!(rec.seen.lock().unwrap()[0].1, "agent_unknown_message");
    }

    #[test]
    fn test_handler_matches_exact_type_only() {
        #[derive(Debug)]
        struct Meters(#[allow(dead_code)] f64);

        let (agent, _router, _rec, _stops) = fixture();
        agent.register_handler(|_a, _n: f64| Ok(())).unwrap();

        agent.submit(Meters(1.0));
        agent.consume_message();
        assert!(matches!(agent.error(), Some(AgentError::UnknownMessage { .. })));
    }

    #[test]
    fn test_handler_error_is_recorded() {
        let (agent, _router, rec, _stops) = fixture();
        agent
            .register_handler(|_a, _s: String| Err("bad input".into()))
            .unwrap();

        agent.submit(String::from("x"));
        agent.consume_message();

        let err = agent.error().unwrap();
        assert_eq!(err.as_label(), "agent_handler_failed");
        assert!(err.to_string().contains("bad input"));
        assert_eq!(rec.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_first_error_wins() {
        let (agent, _router, _rec, _stops) = fixture();
        agent.submit_fault(Fault::msg("first"));
        agent.submit_fault(Fault::msg("second"));
        agent.consume_message();
        agent.consume_message();

        match agent.error() {
            Some(AgentError::Fault(f)) => assert_eq!(f.to_string(), "first"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_registrations_fail() {
        let (agent, _router, _rec, _stops) = fixture();
        agent.register_handler(|_a, _n: i64| Ok(())).unwrap();
        assert!(matches!(
            agent.register_handler(|_a, _n: i64| Ok(())),
            Err(AgentError::DuplicateHandler { .. })
        ));

        agent.register_init_handler(|_a, _m| Ok(())).unwrap();
        assert!(matches!(
            agent.register_init_handler(|_a, _m| Ok(())),
            Err(AgentError::InitHandlerExists)
        ));

        agent.register_exit_handler(|_a, _m| Ok(())).unwrap();
        assert!(matches!(
            agent.register_exit_handler(|_a, _m| Ok(())),
            Err(AgentError::ExitHandlerExists)
        ));
    }

    #[test]
    fn test_builtin_types_are_reserved_after_setup() {
        let (agent, _router, _rec, _stops) = fixture();
        agent.setup().unwrap();
        assert!(agent.register_handler(|_a, _m: InitAgent| Ok(())).is_err());
        assert!(agent.register_handler(|_a, _m: StopAgent| Ok(())).is_err());
        assert!(matches!(agent.setup(), Err(AgentError::AlreadySetup)));
    }

    #[test]
    fn test_lifecycle_misuse() {
        let (agent, router, _rec, _stops) = fixture();
        assert!(matches!(agent.start(), Err(AgentError::NotSetup)));
        assert!(matches!(agent.stop(), Err(AgentError::NotStarted)));
        assert_eq!(router.running(), 0);
        assert!(!agent.is_started());
    }

    #[test]
    fn test_start_and_stop_signal_router_once() {
        let (agent, router, _rec, _stops) = fixture();
        agent.setup().unwrap();

        agent.start().unwrap();
        agent.start().unwrap();
        assert_eq!(router.running(), 1);
        assert_eq!(agent.pending(), 1);

        agent.stop().unwrap();
        agent.stop().unwrap();
        assert_eq!(router.running(), 0);
        assert!(!router.is_up());
        assert_eq!(agent.pending(), 2);
    }

    #[test]
    fn test_start_without_router_fails() {
        let agent = Agent::builder("loner").build(Manual::default());
        agent.setup().unwrap();
        assert!(matches!(agent.start(), Err(AgentError::NotRegistered { .. })));
        assert!(!agent.is_started());
    }

    #[test]
    fn test_route_to_peer() {
        let (agent, router, _rec, _stops) = fixture();
        let peer = Agent::builder("peer").build(Manual::default());
        router.register_agent(&peer, false).unwrap();

        agent.route_first("peer", 42u32).unwrap();
        assert_eq!(peer.pending(), 1);

        assert!(matches!(
            agent.route("peer", 1, 1u32),
            Err(AgentError::NoSuchPeer { index: 1, .. })
        ));
        assert!(matches!(
            agent.route_first("missing", 1u32),
            Err(AgentError::NoSuchPeer { .. })
        ));
    }

    #[test]
    fn test_bounded_mailbox_capacity() {
        let agent = Agent::builder("small").capacity(2).build(Manual::default());
        assert_eq!(agent.capacity(), Some(2));
        agent.submit(1u8);
        agent.submit(2u8);
        assert_eq!(agent.pending(), 2);
    }
}
