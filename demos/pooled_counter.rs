//! # Example: pooled_counter
//!
//! A group of identical pooled agents shares the work of counting, while a
//! unique collector agent sums their partial results and ends the run.
//!
//! Demonstrates how to:
//! - Register several instances under one name with `register_instances`.
//! - Address an instance by index with `route`.
//! - Use an exit handler to report on stop.
//! - Keep the system alive after a failure with [`NeverFatal`].
//!
//! ## Flow
//! ```text
//! main ──► counter[i % N].submit(Work(i))        (ITEMS messages)
//! main ──► counter[i].submit(Flush)              (one per instance)
//! counter(Flush) ──► route_first("collector", Partial(sum)), stop()
//! collector(Partial) ──► after N partials: print total, stop()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example pooled_counter
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use agentvisor::{Agent, NeverFatal, Runtime, RuntimeConfig};

const INSTANCES: usize = 4;
const ITEMS: u64 = 1_000;

struct Work(u64);
struct Flush;
struct Partial(u64);

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Properties-style configuration
    let cfg = RuntimeConfig::from_properties(
        "scheduler.threads = 3\nruntime.signals = false\nruntime.grace_ms = 1000\n",
    )?;
    let runtime = Runtime::builder(cfg).with_error_policy(NeverFatal).build()?;

    // 2. N counters sharing the name "counter"
    let counters = runtime.register_instances(INSTANCES, |i| {
        let agent = Agent::builder("counter").capacity(256).pooled();
        let sum = Arc::new(AtomicU64::new(0));
        let acc = Arc::clone(&sum);
        agent.register_handler(move |_agent, Work(n): Work| {
            acc.fetch_add(n, Ordering::Relaxed);
            Ok(())
        })?;
        agent.register_handler(move |agent, _flush: Flush| {
            let partial = sum.load(Ordering::Relaxed);
            agent.route_first("collector", Partial(partial))?;
            agent.stop()?;
            Ok(())
        })?;
        agent.register_exit_handler(move |agent, stop| {
            println!("[counter #{i}] stopped ({}) index={}", stop.cause(), agent.index());
            Ok(())
        })?;
        Ok(agent)
    })?;

    // 3. The collector
    let collector = Agent::builder("collector").pooled();
    let mut received = 0usize;
    let mut total = 0u64;
    collector.register_handler(move |agent, Partial(n): Partial| {
        received += 1;
        total += n;
        if received == INSTANCES {
            println!("[collector] total = {total} (expected {})", ITEMS * (ITEMS - 1) / 2);
            agent.stop()?;
        }
        Ok(())
    })?;
    collector.setup()?;
    runtime.register(&collector, true)?;

    // 4. Queue the work, then the flushes
    for i in 0..ITEMS {
        counters[i as usize % INSTANCES].submit(Work(i));
    }
    for counter in &counters {
        counter.submit(Flush);
    }

    tokio::time::timeout(Duration::from_secs(10), runtime.run()).await??;
    println!("[main] runtime state: {}", runtime.state().as_str());
    Ok(())
}
