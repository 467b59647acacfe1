//! Core simulation components: clock, ledger, process table, coordinator,
//! worker engine, and the event journal.

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod process_table;
pub mod worker;

pub use clock::{ClockValue, ClockView, VirtualClock};
pub use coordinator::{Coordinator, RunOutcome, SimSummary};
pub use error::{AppResult, SimError};
pub use journal::{EventKind, EventSink, FileEventSink, InMemoryEventSink, NullEventSink, SimEvent};
pub use ledger::{GrantOutcome, ResourceLedger};
pub use process_table::{ProcessTable, WorkerSlot};
pub use worker::{run_worker, Decision, DecisionEngine};

/// Number of resource classes.
pub const RESOURCE_CLASSES: usize = 10;
/// Worker slot capacity; also the cap on `process_count`.
pub const MAX_WORKERS: usize = 18;
/// Instances per resource class, uniform across classes.
pub const RESOURCE_CAP: u32 = 20;
/// Simulated nanoseconds the coordinator advances per iteration.
pub const TICK_NS: u64 = 100_000;
/// Simulated nanoseconds between worker decisions.
pub const DECISION_INTERVAL_NS: u64 = 1_000_000;
/// Simulated nanoseconds between worker self-termination checks.
pub const TERMINATION_CHECK_INTERVAL_NS: u64 = 250_000_000;
/// Simulated seconds between deadlock detection sweeps.
pub const DETECT_INTERVAL_S: u64 = 1;
/// Simulated nanoseconds between periodic reports.
pub const REPORT_INTERVAL_NS: u64 = 500_000_000;
/// Probability a worker exits at a termination check.
pub const TERMINATION_PROB: f64 = 0.10;
/// Probability a worker decision is a release rather than a request.
pub const RELEASE_PROB: f64 = 0.10;
