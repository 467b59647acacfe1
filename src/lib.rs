//! # Resource Arbiter
//!
//! A virtual-time simulator of a fixed-resource operating system: a single
//! coordinator arbitrates request/release traffic from a population of
//! worker threads, detects deadlock periodically, and breaks it by victim
//! termination.
//!
//! ## How it works
//!
//! The **coordinator** owns a simulated clock and advances it in fixed ticks,
//! never sleeping. Each tick it may spawn a worker, reaps exited workers,
//! pumps one message off its inbox, hands out permission tokens, and once per
//! simulated second runs a **deadlock detection** sweep: first granting every
//! request made satisfiable by earlier releases, then killing the
//! highest-indexed waiter while more than one worker waits.
//!
//! **Workers** pace themselves against a shared read-only clock view and
//! generate a seeded stochastic stream of request, release, and
//! self-termination events. A worker whose request cannot be satisfied stays
//! parked on its mailbox until a sweep frees it or it is chosen as a victim.
//!
//! Ten resource classes with twenty instances each; at most eighteen workers
//! per run. The allocation and outstanding-request matrices live in a ledger
//! mutated only by the coordinator, so every sweep observes a consistent
//! snapshot.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use resource_arbiter::builders::SimulationBuilder;
//! use resource_arbiter::config::SimConfig;
//!
//! let config = SimConfig::new(4, 2, 5_000_000).with_seed(42);
//! let mut coordinator = SimulationBuilder::new(config).build()?;
//! let summary = coordinator.run()?;
//! println!("terminated {} of {}", summary.terminated, summary.launched);
//! # Ok::<(), resource_arbiter::core::SimError>(())
//! ```
//!
//! For complete examples, see:
//! - `tests/simulation_test.rs` - End-to-end seeded runs
//! - `src/core/coordinator.rs` - Detection scenario tests

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core simulation components and capacity accounting.
pub mod core;
/// Configuration models for simulation runs.
pub mod config;
/// Builders to construct the coordinator from configuration.
pub mod builders;
/// Infrastructure adapters for the message transport.
pub mod infra;
/// Shared utilities.
pub mod util;
