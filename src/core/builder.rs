use std::sync::Arc;

use crate::core::config::RuntimeConfig;
use crate::core::router::Router;
use crate::core::runtime::Runtime;
use crate::core::scheduler::Scheduler;
use crate::core::worker::{ThreadWorkerFactory, WorkerFactory};
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::policies::{AlwaysFatal, ErrorPolicy};
use crate::subscribers::Subscribe;

/// Builder for constructing a [`Runtime`] with optional components.
pub struct RuntimeBuilder {
    cfg: RuntimeConfig,
    policy: Arc<dyn ErrorPolicy>,
    factory: Box<dyn WorkerFactory>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl RuntimeBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: RuntimeConfig) -> Self {
        Self {
            cfg,
            policy: Arc::new(AlwaysFatal),
            factory: Box::new(ThreadWorkerFactory),
            subscribers: Vec::new(),
        }
    }

    /// Sets the policy deciding which agent failures stop every agent.
    ///
    /// Defaults to [`AlwaysFatal`].
    pub fn with_error_policy(mut self, policy: impl ErrorPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Replaces the pool's worker implementation.
    ///
    /// Defaults to [`ThreadWorkerFactory`].
    pub fn with_worker_factory(mut self, factory: impl WorkerFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (registration, start/stop, failures)
    /// through dedicated workers with bounded queues, once `run()` is called.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the runtime: event bus, router and (not yet started) worker pool.
    ///
    /// Fails with [`RuntimeError::Config`] if the pool size is invalid.
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let events = bus.subscribe();
        let router = Router::new(self.policy, bus.clone());
        let scheduler = Scheduler::new(self.factory.as_ref(), &self.cfg, bus.clone())?;

        Ok(Runtime::new_internal(
            self.cfg,
            bus,
            events,
            router,
            scheduler,
            self.subscribers,
        ))
    }
}
