//! # Example: ping_pong
//!
//! Two agents bounce a counter back and forth, then shut the system down.
//!
//! Demonstrates how to:
//! - Run one agent on its own thread ([`Agent::builder`]`.dedicated()`) and one
//!   on the worker pool (`.pooled()`).
//! - Address agents by name with `route_first`.
//! - Watch runtime events through the built-in [`LogWriter`].
//!
//! ## Flow
//! ```text
//! main ──► ponger.submit(0)
//! ponger(n) ──► route_first("pinger", n)
//! pinger(n) ──► n < ROUNDS ? route_first("ponger", n + 1) : router.stop_all()
//! all stopped ──► Runtime::run() returns
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example ping_pong --features logging
//! ```

use std::sync::Arc;

use agentvisor::{Agent, LogWriter, Runtime, RuntimeConfig, Subscribe};
use tracing_subscriber::EnvFilter;

const ROUNDS: u32 = 5;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Runtime with a small pool and the log subscriber
    let cfg = RuntimeConfig {
        worker_threads: 2,
        ..RuntimeConfig::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let runtime = Runtime::builder(cfg).with_subscribers(subs).build()?;

    // 2. Ponger: its own thread, echoes every ball back
    let ponger = Agent::builder("ponger").dedicated();
    ponger.register_handler(|agent, n: u32| {
        println!("[ponger] pong {n}");
        agent.route_first("pinger", n)?;
        Ok(())
    })?;
    ponger.setup()?;

    // 3. Pinger: on the pool, serves the next ball or ends the game
    let pinger = Agent::builder("pinger").pooled();
    pinger.register_init_handler(|agent, _init| {
        println!("[pinger] ready on {}", agent.execution().kind());
        Ok(())
    })?;
    pinger.register_handler(|agent, n: u32| {
        if n < ROUNDS {
            println!("[pinger] ping {}", n + 1);
            agent.route_first("ponger", n + 1)?;
        } else if let Some(router) = agent.router() {
            println!("[pinger] game over after {n} rounds");
            router.stop_all();
        }
        Ok(())
    })?;
    pinger.setup()?;

    runtime.register(&ponger, true)?;
    runtime.register(&pinger, true)?;

    // 4. Serve and run until everybody stopped
    ponger.submit(0u32);
    runtime.run().await?;
    Ok(())
}
