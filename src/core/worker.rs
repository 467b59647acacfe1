//! Worker decision engine and worker thread body.
//!
//! Each worker owns a seeded RNG and a shadow copy of its holdings. The
//! shadow is updated only on replies from the coordinator, so it cannot
//! drift: a queued request produces no reply until it is actually granted.
//!
//! The worker paces itself against the shared clock view, never against wall
//! time. One decision per [`DECISION_INTERVAL_NS`] of simulated time; a
//! self-termination check every [`TERMINATION_CHECK_INTERVAL_NS`] once the
//! clock has passed one simulated second.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::core::clock::{ClockValue, ClockView};
use crate::core::{
    DECISION_INTERVAL_NS, RELEASE_PROB, RESOURCE_CAP, RESOURCE_CLASSES,
    TERMINATION_CHECK_INTERVAL_NS, TERMINATION_PROB,
};
use crate::infra::channel::{Message, MessageKind, WorkerEndpoint};

/// What the worker chose to do this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Exit cleanly, abandoning current holdings to the reap path.
    Terminate,
    /// Ask for one instance of the class.
    Request(usize),
    /// Return one instance of the class.
    Release(usize),
}

/// Stochastic request/release/termination generator.
#[derive(Debug)]
pub struct DecisionEngine {
    rng: StdRng,
    shadow: [u32; RESOURCE_CLASSES],
    last_termination_check_ns: u64,
}

impl DecisionEngine {
    /// Engine seeded deterministically; holdings start empty.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            shadow: [0; RESOURCE_CLASSES],
            last_termination_check_ns: 0,
        }
    }

    /// Draw the next decision at simulated time `now`.
    ///
    /// The release-vs-request draw is corrected against the shadow holdings:
    /// a release with nothing held becomes a request, and a request with
    /// every class saturated becomes a release.
    pub fn next(&mut self, now: ClockValue) -> Decision {
        if now.seconds >= 1
            && now.total_nanos() >= self.last_termination_check_ns + TERMINATION_CHECK_INTERVAL_NS
        {
            self.last_termination_check_ns = now.total_nanos();
            if self.rng.random_bool(TERMINATION_PROB) {
                return Decision::Terminate;
            }
        }

        let wants_release = self.rng.random_bool(RELEASE_PROB);
        let holds_any = self.shadow.iter().any(|&held| held > 0);
        let all_saturated = self.shadow.iter().all(|&held| held >= RESOURCE_CAP);

        if (wants_release && holds_any) || all_saturated {
            Decision::Release(self.pick_class(|held| held > 0))
        } else {
            Decision::Request(self.pick_class(|held| held < RESOURCE_CAP))
        }
    }

    /// A granted request reply: one more instance held.
    pub fn confirm_grant(&mut self, resource: usize) {
        self.shadow[resource] += 1;
    }

    /// A release acknowledgement: one fewer instance held.
    pub fn confirm_release(&mut self, resource: usize) {
        self.shadow[resource] = self.shadow[resource].saturating_sub(1);
    }

    /// Shadow holdings of `resource`.
    #[must_use]
    pub fn holdings(&self, resource: usize) -> u32 {
        self.shadow[resource]
    }

    fn pick_class(&mut self, eligible: impl Fn(u32) -> bool) -> usize {
        let classes: Vec<usize> = (0..RESOURCE_CLASSES)
            .filter(|&r| eligible(self.shadow[r]))
            .collect();
        classes[self.rng.random_range(0..classes.len())]
    }
}

/// Worker thread body.
///
/// Protocol, per cycle: block for the permission token; pace against the
/// clock view; decide; for a request or release, send it and block for the
/// reply, then update the shadow. Any channel disconnect means the worker was
/// killed as a deadlock victim or the run is tearing down, and the thread
/// exits without further ceremony.
pub fn run_worker(endpoint: &WorkerEndpoint, clock: &Arc<ClockView>, seed: u64) {
    let mut engine = DecisionEngine::new(seed);
    let mut last_decision_ns = clock.now().total_nanos();

    loop {
        // Permission token from the coordinator.
        if endpoint.receive().is_err() {
            debug!(worker = endpoint.id(), "mailbox revoked, exiting");
            return;
        }

        let Some(now) = pace(clock, last_decision_ns) else {
            debug!(worker = endpoint.id(), "clock halted, exiting");
            return;
        };
        last_decision_ns = now.total_nanos();

        let (kind, resource) = match engine.next(now) {
            Decision::Terminate => {
                debug!(worker = endpoint.id(), at = %now, "self-terminating");
                return;
            }
            Decision::Request(resource) => (MessageKind::Request, resource),
            Decision::Release(resource) => (MessageKind::Release, resource),
        };

        let msg = Message {
            kind,
            resource,
            worker: endpoint.id(),
        };
        if endpoint.send(msg).is_err() {
            return;
        }

        // Blocks until granted or acknowledged; a queued request keeps the
        // worker parked right here until a detection sweep frees it.
        if endpoint.receive().is_err() {
            return;
        }
        match kind {
            MessageKind::Request => engine.confirm_grant(resource),
            MessageKind::Release => engine.confirm_release(resource),
            MessageKind::Reply => {}
        }
    }
}

/// Busy-poll the clock view until one decision interval has elapsed since
/// `since_ns`. Returns `None` if the clock halts first.
fn pace(clock: &Arc<ClockView>, since_ns: u64) -> Option<ClockValue> {
    loop {
        if clock.is_halted() {
            return None;
        }
        let now = clock.now();
        if now.total_nanos() >= since_ns + DECISION_INTERVAL_NS {
            return Some(now);
        }
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: u64, nanos: u32) -> ClockValue {
        ClockValue { seconds, nanos }
    }

    #[test]
    fn empty_handed_worker_always_requests() {
        // With nothing held, every release draw must fall back to a request,
        // whatever the seed produces.
        for seed in 0..64 {
            let mut engine = DecisionEngine::new(seed);
            match engine.next(at(0, 500_000)) {
                Decision::Request(r) => assert!(r < RESOURCE_CLASSES),
                other => panic!("expected a request, got {other:?}"),
            }
        }
    }

    #[test]
    fn saturated_worker_always_releases() {
        for seed in 0..64 {
            let mut engine = DecisionEngine::new(seed);
            for r in 0..RESOURCE_CLASSES {
                for _ in 0..RESOURCE_CAP {
                    engine.confirm_grant(r);
                }
            }
            match engine.next(at(0, 500_000)) {
                Decision::Release(r) => assert!(r < RESOURCE_CLASSES),
                other => panic!("expected a release, got {other:?}"),
            }
        }
    }

    #[test]
    fn no_termination_before_one_second() {
        let mut engine = DecisionEngine::new(7);
        for step in 0..500 {
            let decision = engine.next(at(0, step * 1_000_000));
            assert_ne!(decision, Decision::Terminate);
        }
    }

    #[test]
    fn release_targets_a_held_class() {
        // Hold exactly one class; any release must name it.
        for seed in 0..256 {
            let mut engine = DecisionEngine::new(seed);
            engine.confirm_grant(4);
            if let Decision::Release(r) = engine.next(at(0, 500_000)) {
                assert_eq!(r, 4);
            }
        }
    }

    #[test]
    fn shadow_follows_replies() {
        let mut engine = DecisionEngine::new(1);
        engine.confirm_grant(2);
        engine.confirm_grant(2);
        assert_eq!(engine.holdings(2), 2);
        engine.confirm_release(2);
        assert_eq!(engine.holdings(2), 1);
        // Underflow clamps rather than wrapping.
        engine.confirm_release(2);
        engine.confirm_release(2);
        assert_eq!(engine.holdings(2), 0);
    }

    #[test]
    fn identical_seeds_replay_identically() {
        let mut a = DecisionEngine::new(42);
        let mut b = DecisionEngine::new(42);
        for step in 1u64..200 {
            let now = at(step / 900, u32::try_from(step % 900).unwrap() * 1_000_000);
            assert_eq!(a.next(now), b.next(now));
        }
    }

    #[test]
    fn termination_eventually_fires_past_one_second() {
        // Probability 0.1 per 250ms check; 400 checks without a single
        // termination would mean a broken draw.
        let mut engine = DecisionEngine::new(9);
        let mut terminated = false;
        for step in 0..400u64 {
            let now = at(1 + step / 4, (step % 4) as u32 * 250_000_000);
            if engine.next(now) == Decision::Terminate {
                terminated = true;
                break;
            }
        }
        assert!(terminated);
    }
}
