//! # agentvisor
//!
//! **Agentvisor** is a lightweight actor runtime for Rust.
//!
//! Agents are independent units of execution, each with a private FIFO
//! mailbox and a table of handlers keyed by message type. A [`Router`] keeps
//! them by name, counts how many are running and takes everybody down when a
//! fatal error is reported. Agents run either on a thread of their own
//! ([`Dedicated`]) or on a shared fixed-size worker pool ([`Pooled`]) driven
//! by the [`Scheduler`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    Agent     │   │    Agent     │   │    Agent     │
//!     │  (Dedicated) │   │   (Pooled)   │   │   (Pooled)   │
//!     │ own thread   │   │   mailbox    │   │   mailbox    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │                  │ submit ─► Slot   │
//!            │                  ▼                  ▼
//!            │          ┌─────────────────────────────────┐
//!            │          │ Scheduler                       │
//!            │          │ - WorkQueue (Slots + sentinels) │
//!            │          │ - N workers (one OS thread each)│
//!            │          └─────────────────────────────────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Router                                                           │
//! │  - groups by name (unique or indexed instances)                   │
//! │  - running-count barrier (all stopped ─► completion signal)       │
//! │  - signal_error ─► ErrorPolicy ─► stop every agent if fatal       │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │              (capacity: RuntimeConfig::bus_capacity)              │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//!                    ┌────────────────────────┐
//!                    │  subscriber_listener   │
//!                    │     (in Runtime)       │
//!                    └───────────┬────────────┘
//!                                ▼
//!                          SubscriberSet
//!                        (per-sub queues)
//! ```
//!
//! ### Agent lifecycle
//! ```text
//! Agent::builder(name).pooled()
//!   ├─► register_handler::<M>(..)*      (exact-type dispatch)
//!   ├─► setup()                         (installs Init/Stop/Fault handlers)
//!   ├─► Runtime::register(&agent, unique)
//!   └─► Runtime::run()
//!         ├─ start(): count++, submit(InitAgent)  ──► status RUNNING
//!         ├─ ... handlers ...
//!         └─ stop():  count--, submit(StopAgent)  ──► status STOPPED
//!
//! A handler error, an unknown message type or a submitted Fault moves the
//! agent to STOPPED and reports to the router, which consults the ErrorPolicy.
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                         |
//! |-------------------|-------------------------------------------------------------|--------------------------------------------|
//! | **Agents**        | Mailboxes, typed handlers and the lifecycle state machine.  | [`Agent`], [`AgentStatus`], [`Execution`]  |
//! | **Routing**       | Lookup by name and index, running count, fatal broadcast.   | [`Router`], [`AgentGroup`]                 |
//! | **Scheduling**    | Shared worker pool for pooled agents.                       | [`Scheduler`], [`Worker`], [`Slot`]        |
//! | **Policies**      | Decide which failures stop the whole system.                | [`ErrorPolicy`], [`AlwaysFatal`]           |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom).        | [`Subscribe`], [`Event`]                   |
//! | **Errors**        | Typed errors for agents, routing, config and the runtime.   | [`AgentError`], [`RuntimeError`]           |
//! | **Configuration** | Centralize runtime settings.                                | [`RuntimeConfig`]                          |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use agentvisor::{Agent, Runtime, RuntimeConfig};
//!
//! #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = RuntimeConfig { worker_threads: 2, handle_signals: false, ..RuntimeConfig::default() };
//!
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn agentvisor::Subscribe>> = vec![Arc::new(agentvisor::LogWriter)];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn agentvisor::Subscribe>> = Vec::new();
//!
//!     let runtime = Runtime::builder(cfg).with_subscribers(subs).build()?;
//!
//!     // An agent that sums numbers and stops itself at zero.
//!     let summer = Agent::builder("summer").pooled();
//!     let mut total = 0u64;
//!     summer.register_handler(move |agent, n: u64| {
//!         total += n;
//!         if n == 0 {
//!             println!("total = {total}");
//!             agent.stop()?;
//!         }
//!         Ok(())
//!     })?;
//!     summer.setup()?;
//!     runtime.register(&summer, true)?;
//!
//!     for n in [1u64, 2, 3, 0] {
//!         summer.submit(n);
//!     }
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
mod agents;
mod core;
mod error;
mod events;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use agents::{
    Agent, AgentBuilder, AgentRef, AgentStatus, Dedicated, Execution, InitAgent, Pooled, StopAgent,
};
pub use core::{
    AgentGroup, BlockingQueue, ConfigSource, KEY_BUS_CAPACITY, KEY_GRACE_MS, KEY_HANDLE_SIGNALS,
    KEY_WORKER_THREADS, QueueClosed, Router, Runtime, RuntimeBuilder, RuntimeConfig, RuntimeState,
    Scheduler, Slot, ThreadWorker, ThreadWorkerFactory, WorkQueue, Worker, WorkerFactory,
    WorkerFault,
};
pub use error::{AgentError, BoxError, ConfigError, Fault, RouterError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use policies::{AlwaysFatal, ErrorPolicy, NeverFatal};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
