//! Fixed-capacity table of worker slots.
//!
//! Slots are assigned in increasing index order as workers launch, and an
//! index is never recycled within a run: once a worker terminates its slot
//! goes unoccupied but keeps its historic identity for reports.

use crate::core::clock::ClockValue;
use crate::core::MAX_WORKERS;

/// One worker slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerSlot {
    /// Whether a live worker occupies this slot.
    pub occupied: bool,
    /// Simulated time at which the worker was launched.
    pub started_at: ClockValue,
    /// True while the coordinator owes this worker a reply, from the
    /// permission token onward until the reply for the worker's next
    /// decision has been delivered.
    pub awaiting_reply: bool,
}

/// The process table. Slot index doubles as the worker's address on the
/// message channel.
#[derive(Debug)]
pub struct ProcessTable {
    slots: [WorkerSlot; MAX_WORKERS],
}

impl ProcessTable {
    /// Table with every slot vacant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [WorkerSlot::default(); MAX_WORKERS],
        }
    }

    /// Occupy `slot` for a worker launched at `started_at`.
    pub fn occupy(&mut self, slot: usize, started_at: ClockValue) {
        self.slots[slot] = WorkerSlot {
            occupied: true,
            started_at,
            awaiting_reply: false,
        };
    }

    /// Clear `slot` after its worker has been reaped. The start time is kept
    /// for reports.
    pub fn vacate(&mut self, slot: usize) {
        self.slots[slot].occupied = false;
        self.slots[slot].awaiting_reply = false;
    }

    /// Slot contents.
    #[must_use]
    pub fn slot(&self, index: usize) -> &WorkerSlot {
        &self.slots[index]
    }

    /// Whether `slot` currently holds a live worker.
    #[must_use]
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.slots[slot].occupied
    }

    /// Reply-owed flag for `slot`.
    #[must_use]
    pub fn awaiting_reply(&self, slot: usize) -> bool {
        self.slots[slot].awaiting_reply
    }

    /// Set the reply-owed flag for `slot`.
    pub fn set_awaiting_reply(&mut self, slot: usize, awaiting: bool) {
        self.slots[slot].awaiting_reply = awaiting;
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.occupied).count()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
