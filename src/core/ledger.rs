//! Allocation and outstanding-request bookkeeping.
//!
//! The ledger holds the allocation matrix, the pending-request matrix, and
//! the derived per-class availability. It is plain matrix state with no
//! channel or table coupling, so the coordinator owns the reply-flag side of
//! every transition and the ledger stays directly unit-testable.

use tracing::warn;

use crate::core::{MAX_WORKERS, RESOURCE_CAP, RESOURCE_CLASSES};

/// Outcome of a grant attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// The instance was allocated immediately.
    Granted,
    /// The class is saturated; the request was recorded as pending.
    Queued,
}

/// Allocation matrix `allocated[r][p]`, pending matrix `requested[r][p]`, and
/// derived availability. Mutated only by the coordinator.
#[derive(Debug)]
pub struct ResourceLedger {
    allocated: [[u32; MAX_WORKERS]; RESOURCE_CLASSES],
    requested: [[bool; MAX_WORKERS]; RESOURCE_CLASSES],
}

impl ResourceLedger {
    /// Empty ledger: nothing allocated, nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocated: [[0; MAX_WORKERS]; RESOURCE_CLASSES],
            requested: [[false; MAX_WORKERS]; RESOURCE_CLASSES],
        }
    }

    /// Instances of class `resource` currently allocated across all workers.
    #[must_use]
    pub fn held(&self, resource: usize) -> u32 {
        self.allocated[resource].iter().sum()
    }

    /// Instances of class `resource` still available under the cap.
    #[must_use]
    pub fn available(&self, resource: usize) -> u32 {
        RESOURCE_CAP - self.held(resource)
    }

    /// Instances of `resource` held by `worker`.
    #[must_use]
    pub fn allocation(&self, resource: usize, worker: usize) -> u32 {
        self.allocated[resource][worker]
    }

    /// Whether `worker` has a pending request for `resource`.
    #[must_use]
    pub fn is_pending(&self, resource: usize, worker: usize) -> bool {
        self.requested[resource][worker]
    }

    /// Whether `worker` has any pending request.
    #[must_use]
    pub fn has_pending(&self, worker: usize) -> bool {
        (0..RESOURCE_CLASSES).any(|r| self.requested[r][worker])
    }

    /// Attempt to allocate one instance of `resource` to `worker`. Saturated
    /// classes record the request as pending instead; the worker stays
    /// blocked until a detection sweep can satisfy it.
    pub fn try_grant(&mut self, resource: usize, worker: usize) -> GrantOutcome {
        if self.held(resource) < RESOURCE_CAP {
            self.allocated[resource][worker] += 1;
            GrantOutcome::Granted
        } else {
            self.requested[resource][worker] = true;
            GrantOutcome::Queued
        }
    }

    /// Return one instance of `resource` from `worker`. A release of a class
    /// the worker does not hold clamps at zero rather than underflowing; the
    /// caller still acknowledges it.
    pub fn release(&mut self, resource: usize, worker: usize) {
        if self.allocated[resource][worker] == 0 {
            warn!(resource, worker, "release of unheld resource class, clamping at zero");
            return;
        }
        self.allocated[resource][worker] -= 1;
    }

    /// Drop everything `worker` holds or waits on, returning the released
    /// count per class for the journal.
    pub fn cleanup(&mut self, worker: usize) -> [u32; RESOURCE_CLASSES] {
        let mut released = [0; RESOURCE_CLASSES];
        for resource in 0..RESOURCE_CLASSES {
            released[resource] = self.allocated[resource][worker];
            self.allocated[resource][worker] = 0;
            self.requested[resource][worker] = false;
        }
        released
    }

    /// Grant every pending request whose class has availability again.
    ///
    /// Scans workers in slot order with classes inner, granting at most one
    /// request per worker per sweep. Returns the `(resource, worker)` pairs
    /// granted so the coordinator can send the deferred replies.
    pub fn satisfy_pending(&mut self) -> Vec<(usize, usize)> {
        let mut granted = Vec::new();
        for worker in 0..MAX_WORKERS {
            for resource in 0..RESOURCE_CLASSES {
                if self.requested[resource][worker] && self.held(resource) < RESOURCE_CAP {
                    self.requested[resource][worker] = false;
                    self.allocated[resource][worker] += 1;
                    granted.push((resource, worker));
                    break;
                }
            }
        }
        granted
    }

    /// Workers with at least one pending request, in slot order.
    #[must_use]
    pub fn waiting_workers(&self) -> Vec<usize> {
        (0..MAX_WORKERS).filter(|&p| self.has_pending(p)).collect()
    }
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new()
    }
}
