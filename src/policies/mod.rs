//! Error policies.
//!
//! This module holds the knob that decides whether an agent failure takes the
//! whole system down.
//!
//! ## Contents
//! - [`ErrorPolicy`] consulted by the router on every reported failure
//! - [`AlwaysFatal`] every failure stops every agent (default)
//! - [`NeverFatal`] failures only stop the failing agent
//!
//! ## Quick wiring
//! ```text
//! Agent::consume_message() ──fault──► Router::signal_error(name, err)
//!                                          └─► policy.is_fatal(name, err)?
//!                                               ├─ true  → stop every agent in every group
//!                                               └─ false → failing agent stays stopped alone
//! ```

mod fatal;

pub use fatal::{AlwaysFatal, ErrorPolicy, NeverFatal};
