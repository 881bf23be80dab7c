//! Runtime core: routing, scheduling and the run loop.
//!
//! Internal modules:
//! - [`queue`]: blocking FIFO used for mailboxes and the work queue;
//! - [`group`]: agents sharing one name, in registration order;
//! - [`router`]: agent directory, running-count barrier and fatal broadcast;
//! - [`slot`]: unit of work handed to the pool;
//! - [`worker`]: pool members and their factory;
//! - [`scheduler`]: fixed-size worker pool over the shared work queue;
//! - [`config`]: runtime settings and the properties loader;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`runtime`] / [`builder`]: bootstrap facade tying everything together.

mod builder;
mod config;
mod group;
mod queue;
mod router;
mod runtime;
mod scheduler;
mod shutdown;
mod slot;
mod worker;

pub use builder::RuntimeBuilder;
pub use config::{
    ConfigSource, KEY_BUS_CAPACITY, KEY_GRACE_MS, KEY_HANDLE_SIGNALS, KEY_WORKER_THREADS,
    RuntimeConfig,
};
pub use group::AgentGroup;
pub use queue::{BlockingQueue, QueueClosed};
pub use router::Router;
pub use runtime::{Runtime, RuntimeState};
pub use scheduler::{Scheduler, WorkQueue, WorkerFault};
pub use slot::Slot;
pub use worker::{ThreadWorker, ThreadWorkerFactory, Worker, WorkerFactory};
