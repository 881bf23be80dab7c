//! # Global runtime configuration.
//!
//! Provides [`RuntimeConfig`], the settings read once when a
//! [`Runtime`](crate::Runtime) is built, and [`ConfigSource`], the narrow view
//! the [`Scheduler`](crate::Scheduler) needs.
//!
//! ## Properties format
//! [`RuntimeConfig::from_properties`] reads `key=value` lines:
//! ```text
//! # worker pool size (must be > 0)
//! scheduler.threads = 8
//! ! event bus ring buffer
//! bus.capacity = 2048
//! runtime.signals = false
//! # how long run() waits for agents to consume their Stop message
//! runtime.grace_ms = 2000
//! ```
//! Blank lines and lines starting with `#` or `!` are ignored, as are unknown keys.

use std::time::Duration;

use crate::error::ConfigError;

/// Key for the worker pool size.
pub const KEY_WORKER_THREADS: &str = "scheduler.threads";
/// Key for the event bus capacity.
pub const KEY_BUS_CAPACITY: &str = "bus.capacity";
/// Key for OS signal handling in `Runtime::run`.
pub const KEY_HANDLE_SIGNALS: &str = "runtime.signals";
/// Key for the termination grace period, in milliseconds.
pub const KEY_GRACE_MS: &str = "runtime.grace_ms";

/// Source of the scheduler's settings.
pub trait ConfigSource {
    /// Requested worker pool size. Values `<= 0` are rejected by the scheduler.
    fn worker_threads(&self) -> i64;
}

/// Global configuration for the runtime.
///
/// ## Field semantics
/// - `worker_threads`: pool size shared by all pooled agents (must be `> 0`)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `handle_signals`: `run()` stops all agents on SIGINT/SIGTERM/Ctrl-C
/// - `grace`: after all agents stopped, how long `run()` waits for each of them
///   to terminate before it shuts the pool down (`0s` = don't wait)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Number of worker threads in the pool.
    pub worker_threads: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// skip older items.
    pub bus_capacity: usize,

    /// Whether `run()` listens for OS termination signals.
    pub handle_signals: bool,

    /// Maximum wait for stopped agents to terminate.
    pub grace: Duration,
}

impl RuntimeConfig {
    /// Parses a properties document on top of the defaults.
    ///
    /// ```
    /// use agentvisor::RuntimeConfig;
    ///
    /// let cfg = RuntimeConfig::from_properties("scheduler.threads = 2\n# comment\n").unwrap();
    /// assert_eq!(cfg.worker_threads, 2);
    /// assert_eq!(cfg.bus_capacity, 1024);
    /// ```
    pub fn from_properties(text: &str) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once(['=', ':']) else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                KEY_WORKER_THREADS => {
                    let n: i64 = parse(key, value)?;
                    cfg.worker_threads = usize::try_from(n)
                        .ok()
                        .filter(|threads| *threads > 0)
                        .ok_or(ConfigError::InvalidWorkerThreads(n))?;
                }
                KEY_BUS_CAPACITY => cfg.bus_capacity = parse(key, value)?,
                KEY_HANDLE_SIGNALS => cfg.handle_signals = parse(key, value)?,
                KEY_GRACE_MS => cfg.grace = Duration::from_millis(parse(key, value)?),
                _ => {}
            }
        }
        Ok(cfg)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl Default for RuntimeConfig {
    /// Default configuration:
    ///
    /// - `worker_threads = 5`
    /// - `bus_capacity = 1024`
    /// - `handle_signals = true`
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            worker_threads: 5,
            bus_capacity: 1024,
            handle_signals: true,
            grace: Duration::from_secs(5),
        }
    }
}

impl ConfigSource for RuntimeConfig {
    fn worker_threads(&self) -> i64 {
        i64::try_from(self.worker_threads).unwrap_or(i64::MAX)
    }
}

impl ConfigSource for i64 {
    fn worker_threads(&self) -> i64 {
        *self
    }
}
