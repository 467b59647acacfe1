//! Simulated clock owned by the coordinator, published to workers.
//!
//! The coordinator is the only writer; workers observe the clock through a
//! shared [`ClockView`] backed by atomics. A worker may see a torn
//! seconds/nanos pair across an advance; that is acceptable because workers
//! only compare against values they have already observed and the clock never
//! regresses.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Nanoseconds per simulated second.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// A point in simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ClockValue {
    /// Whole simulated seconds.
    pub seconds: u64,
    /// Nanoseconds into the current second, always below one billion.
    pub nanos: u32,
}

impl ClockValue {
    /// Total simulated nanoseconds since the start of the run.
    #[must_use]
    pub fn total_nanos(self) -> u64 {
        self.seconds * NANOS_PER_SECOND + u64::from(self.nanos)
    }
}

impl fmt::Display for ClockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seconds, self.nanos)
    }
}

/// Read-only clock state shared with worker threads.
///
/// Stores are release-ordered so a worker that observes a new value also
/// observes every coordinator write that preceded the advance.
#[derive(Debug, Default)]
pub struct ClockView {
    seconds: AtomicU64,
    nanos: AtomicU32,
    halted: AtomicBool,
}

impl ClockView {
    /// Current simulated time as last published by the coordinator.
    #[must_use]
    pub fn now(&self) -> ClockValue {
        ClockValue {
            seconds: self.seconds.load(Ordering::Acquire),
            nanos: self.nanos.load(Ordering::Acquire),
        }
    }

    /// True once the coordinator has begun teardown. Busy-polling workers
    /// check this to stop spinning when time will no longer advance.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

/// The coordinator-owned simulated clock.
#[derive(Debug)]
pub struct VirtualClock {
    current: ClockValue,
    view: Arc<ClockView>,
}

impl VirtualClock {
    /// New clock at `0:0` with a fresh shared view.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ClockValue::default(),
            view: Arc::new(ClockView::default()),
        }
    }

    /// Advance by `delta_ns`, carrying overflow into seconds, and publish the
    /// new value to the shared view before returning.
    pub fn advance(&mut self, delta_ns: u64) -> ClockValue {
        let mut nanos = u64::from(self.current.nanos) + delta_ns;
        if nanos >= NANOS_PER_SECOND {
            self.current.seconds += nanos / NANOS_PER_SECOND;
            nanos %= NANOS_PER_SECOND;
        }
        // nanos < NANOS_PER_SECOND < u32::MAX here
        self.current.nanos = u32::try_from(nanos).unwrap_or(0);
        self.view
            .seconds
            .store(self.current.seconds, Ordering::Release);
        self.view.nanos.store(self.current.nanos, Ordering::Release);
        self.current
    }

    /// Current value without advancing.
    #[must_use]
    pub fn read(&self) -> ClockValue {
        self.current
    }

    /// Handle to the worker-visible view.
    #[must_use]
    pub fn view(&self) -> Arc<ClockView> {
        Arc::clone(&self.view)
    }

    /// Mark the view halted. Idempotent; called once teardown begins.
    pub fn halt(&self) {
        self.view.halted.store(true, Ordering::Release);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}
