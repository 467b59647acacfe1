//! The coordinator: virtual-time driver, message pump, allocator, deadlock
//! detector, and teardown.
//!
//! Single-threaded cooperative loop. Every iteration advances the clock by
//! one tick and performs, in order: spawn check, reap, terminal check, inbox
//! drain, permission tokens, detection sweep, periodic report. Nothing in an
//! iteration blocks; workers are the only parallel element and they interact
//! solely through the message channel and the read-only clock view.
//!
//! The outbound `Reply` at the permission step is the token that re-enables
//! a worker's next decision, which serializes per-worker activity without a
//! lock: the coordinator never owes a worker more than one reply.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::core::clock::{ClockValue, VirtualClock};
use crate::core::journal::{EventKind, EventSink, SimEvent};
use crate::core::ledger::{GrantOutcome, ResourceLedger};
use crate::core::process_table::ProcessTable;
use crate::core::worker::run_worker;
use crate::core::{SimError, DETECT_INTERVAL_S, MAX_WORKERS, REPORT_INTERVAL_NS, RESOURCE_CLASSES, TICK_NS};
use crate::infra::channel::{CoordinatorHub, Message, MessageKind};
use crate::util::report;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every worker terminated; the run drained naturally.
    Completed,
    /// The wall-clock watchdog expired first.
    WatchdogExpired,
    /// The shutdown flag (SIGINT) was observed.
    Interrupted,
}

/// Counters and final state of a finished run.
#[derive(Debug, Clone)]
pub struct SimSummary {
    /// Workers ever launched.
    pub launched: usize,
    /// Workers terminated, including deadlock victims.
    pub terminated: usize,
    /// Workers killed to break deadlocks.
    pub victims: usize,
    /// Detection sweeps executed, counting re-entrant passes.
    pub detection_sweeps: usize,
    /// Peak concurrent worker population.
    pub max_concurrent: usize,
    /// Clock value at teardown.
    pub final_clock: ClockValue,
    /// Per-class held counts at teardown.
    pub final_held: [u32; RESOURCE_CLASSES],
    /// Why the run ended.
    pub outcome: RunOutcome,
}

/// The simulation driver. Owns the clock, the ledger, the process table, and
/// the coordinator side of the message channel.
pub struct Coordinator {
    config: SimConfig,
    clock: VirtualClock,
    ledger: ResourceLedger,
    table: ProcessTable,
    hub: CoordinatorHub,
    sink: Box<dyn EventSink>,
    handles: Vec<Option<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    total_launched: usize,
    total_terminated: usize,
    victims: usize,
    detection_sweeps: usize,
    max_concurrent: usize,
    launch_elapsed_ns: u64,
    last_detect_s: u64,
    last_report_ns: u64,
    torn_down: bool,
}

impl Coordinator {
    /// Build a coordinator from a validated configuration and a journal sink.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] when the configuration fails validation.
    pub fn new(config: SimConfig, sink: Box<dyn EventSink>) -> Result<Self, SimError> {
        config.validate().map_err(SimError::Config)?;
        Ok(Self {
            config,
            clock: VirtualClock::new(),
            ledger: ResourceLedger::new(),
            table: ProcessTable::new(),
            hub: CoordinatorHub::new(),
            sink,
            handles: Vec::with_capacity(MAX_WORKERS),
            shutdown: Arc::new(AtomicBool::new(false)),
            total_launched: 0,
            total_terminated: 0,
            victims: 0,
            detection_sweeps: 0,
            max_concurrent: 0,
            launch_elapsed_ns: 0,
            last_detect_s: 0,
            last_report_ns: 0,
            torn_down: false,
        })
    }

    /// Flag observed once per iteration; setting it routes the loop into
    /// teardown. Wire this to a SIGINT handler.
    #[must_use]
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Drive the loop until every worker has terminated, the watchdog
    /// expires, or the shutdown flag is set; then tear down and summarize.
    ///
    /// # Errors
    ///
    /// Currently infallible after construction; the `Result` is the seam for
    /// fatal transport faults.
    pub fn run(&mut self) -> Result<SimSummary, SimError> {
        let started = Instant::now();
        let watchdog = self.config.watchdog();
        info!(
            processes = self.config.process_count,
            simultaneous = self.config.simultaneous_count,
            spawn_interval_ns = self.config.spawn_interval_ns,
            seed = self.config.seed,
            "starting simulation"
        );

        let outcome = loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("shutdown flag observed");
                break RunOutcome::Interrupted;
            }
            if started.elapsed() >= watchdog {
                warn!("wall-clock watchdog expired");
                break RunOutcome::WatchdogExpired;
            }
            if self.step() {
                break RunOutcome::Completed;
            }
        };

        self.teardown();
        Ok(self.summary(outcome))
    }

    /// One loop iteration. Returns true once every worker has terminated.
    fn step(&mut self) -> bool {
        let now = self.clock.advance(TICK_NS);
        self.launch_elapsed_ns += TICK_NS;

        self.maybe_spawn(now);
        self.reap_finished(now);
        if self.total_terminated == self.config.process_count {
            return true;
        }
        self.drain_inbox(now);
        self.grant_permissions();
        if now.seconds >= self.last_detect_s + DETECT_INTERVAL_S {
            self.run_detection(now);
        }
        self.maybe_report(now);
        false
    }

    /// Spawn one worker when the spawn interval has elapsed (or nothing has
    /// launched yet) and both population gates allow it. The slot index is
    /// `total_launched`; slots are never recycled.
    fn maybe_spawn(&mut self, now: ClockValue) {
        if self.launch_elapsed_ns < self.config.spawn_interval_ns && self.total_launched != 0 {
            return;
        }
        if self.total_launched >= self.config.process_count {
            return;
        }
        if self.total_launched - self.total_terminated >= self.config.simultaneous_count {
            return;
        }

        let slot = self.total_launched;
        let endpoint = self.hub.register(slot);
        let view = self.clock.view();
        let seed = self.config.seed.wrapping_add(slot as u64);
        let handle = thread::Builder::new()
            .name(format!("arb-worker-{slot}"))
            .spawn(move || run_worker(&endpoint, &view, seed))
            .expect("failed to spawn worker thread");

        self.table.occupy(slot, now);
        self.handles.push(Some(handle));
        self.total_launched += 1;
        self.max_concurrent = self
            .max_concurrent
            .max(self.total_launched - self.total_terminated);
        self.launch_elapsed_ns = 0;
        self.journal(now, EventKind::Spawn, Some(slot), None, format!("launching worker P{slot}"));
    }

    /// Non-blocking check of every occupied slot for an exited worker
    /// thread. Exited workers are joined, their resources reclaimed, and the
    /// slot vacated. This also covers workers that died holding resources.
    fn reap_finished(&mut self, now: ClockValue) {
        for slot in 0..self.total_launched {
            if !self.table.is_occupied(slot) {
                continue;
            }
            let finished = self.handles[slot]
                .as_ref()
                .is_some_and(JoinHandle::is_finished);
            if !finished {
                continue;
            }
            if let Some(handle) = self.handles[slot].take() {
                if handle.join().is_err() {
                    warn!(worker = slot, "worker thread panicked");
                }
            }
            let released = self.retire(slot);
            self.journal(
                now,
                EventKind::Reap,
                Some(slot),
                None,
                format!(
                    "worker P{slot} terminated, releasing: {}",
                    report::released_list(&released)
                ),
            );
        }
    }

    /// Pull at most one message from the inbox and resolve it.
    fn drain_inbox(&mut self, now: ClockValue) {
        let Some(msg) = self.hub.try_receive() else {
            return;
        };
        let slot = msg.worker;
        if slot >= self.total_launched || !self.table.is_occupied(slot) {
            debug!(worker = slot, "message from a departed worker, dropping");
            return;
        }

        match msg.kind {
            MessageKind::Release => {
                self.ledger.release(msg.resource, slot);
                self.table.set_awaiting_reply(slot, false);
                self.reply(slot, msg.resource);
                self.journal(
                    now,
                    EventKind::Release,
                    Some(slot),
                    Some(msg.resource),
                    format!("acknowledged P{slot} releasing R{}", msg.resource),
                );
            }
            MessageKind::Request => {
                self.journal(
                    now,
                    EventKind::Request,
                    Some(slot),
                    Some(msg.resource),
                    format!("P{slot} requesting R{}", msg.resource),
                );
                match self.ledger.try_grant(msg.resource, slot) {
                    GrantOutcome::Granted => {
                        self.table.set_awaiting_reply(slot, false);
                        self.reply(slot, msg.resource);
                        self.journal(
                            now,
                            EventKind::Grant,
                            Some(slot),
                            Some(msg.resource),
                            format!("granting P{slot} request R{}", msg.resource),
                        );
                    }
                    GrantOutcome::Queued => {
                        // No reply; the worker stays parked until a sweep
                        // can satisfy it.
                        self.journal(
                            now,
                            EventKind::Queue,
                            Some(slot),
                            Some(msg.resource),
                            format!(
                                "no instances of R{} available, P{slot} added to wait queue",
                                msg.resource
                            ),
                        );
                    }
                }
            }
            MessageKind::Reply => {
                debug!(worker = slot, "unexpected reply in coordinator inbox, dropping");
            }
        }
    }

    /// Hand a permission token to every occupied worker the coordinator owes
    /// nothing to, re-enabling its next decision.
    fn grant_permissions(&mut self) {
        for slot in 0..self.total_launched {
            if !self.table.is_occupied(slot)
                || self.table.awaiting_reply(slot)
                || self.ledger.has_pending(slot)
            {
                continue;
            }
            if self.hub.send(
                slot,
                Message {
                    kind: MessageKind::Reply,
                    resource: 0,
                    worker: slot,
                },
            ) {
                self.table.set_awaiting_reply(slot, true);
            }
        }
    }

    /// Deadlock detection sweep, re-run until no deadlock remains.
    ///
    /// Phase one grants every pending request made satisfiable by earlier
    /// releases and sends the deferred replies; this alone clears "false"
    /// deadlocks from momentary saturation. Phase two counts waiters: more
    /// than one means the wait graph can hold a cycle, so the
    /// highest-indexed waiter is killed and the sweep repeats on the freed
    /// state. A single waiter is merely starved, not deadlocked.
    fn run_detection(&mut self, now: ClockValue) {
        self.last_detect_s = now.seconds;
        loop {
            self.detection_sweeps += 1;
            self.journal(now, EventKind::Sweep, None, None, "running deadlock detection".into());

            for (resource, slot) in self.ledger.satisfy_pending() {
                self.table.set_awaiting_reply(slot, false);
                self.reply(slot, resource);
                self.journal(
                    now,
                    EventKind::Grant,
                    Some(slot),
                    Some(resource),
                    format!("R{resource} available again, granting it to waiting P{slot}"),
                );
            }

            let waiting = self.ledger.waiting_workers();
            if waiting.len() <= 1 {
                self.journal(now, EventKind::NoDeadlock, None, None, "no deadlocks detected".into());
                return;
            }
            let victim = waiting[waiting.len() - 1];

            let set = waiting
                .iter()
                .map(|p| format!("P{p}"))
                .collect::<Vec<_>>()
                .join(" ");
            self.hub.revoke(victim);
            if let Some(handle) = self.handles[victim].take() {
                if handle.join().is_err() {
                    warn!(worker = victim, "victim thread panicked");
                }
            }
            let released = self.retire(victim);
            self.victims += 1;
            self.journal(
                now,
                EventKind::Victim,
                Some(victim),
                None,
                format!(
                    "processes {set} are deadlocked, terminated P{victim}, releasing: {}",
                    report::released_list(&released)
                ),
            );
        }
    }

    /// Emit the process table and matrices once per report interval.
    fn maybe_report(&mut self, now: ClockValue) {
        if now.total_nanos() < self.last_report_ns + REPORT_INTERVAL_NS {
            return;
        }
        self.last_report_ns = now.total_nanos();
        self.emit_report(now);
    }

    fn emit_report(&mut self, now: ClockValue) {
        let text = format!(
            "{}\n{}",
            report::process_table_report(now, &self.table, self.total_launched),
            report::matrices_report(&self.ledger, self.total_launched)
        );
        self.journal(now, EventKind::Report, None, None, text);
    }

    /// Common retirement path for reaped workers and victims: revoke the
    /// mailbox, reclaim resources, vacate the slot.
    fn retire(&mut self, slot: usize) -> [u32; RESOURCE_CLASSES] {
        self.hub.revoke(slot);
        let released = self.ledger.cleanup(slot);
        self.table.vacate(slot);
        self.total_terminated += 1;
        released
    }

    /// Halt the clock, revoke every mailbox, join every live worker, emit
    /// the final report. Idempotent.
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.clock.halt();
        self.hub.revoke_all();
        for slot in 0..self.handles.len() {
            if let Some(handle) = self.handles[slot].take() {
                if handle.join().is_err() {
                    warn!(worker = slot, "worker thread panicked");
                }
            }
        }
        self.emit_report(self.clock.read());
        info!(
            launched = self.total_launched,
            terminated = self.total_terminated,
            victims = self.victims,
            "simulation torn down"
        );
    }

    fn summary(&self, outcome: RunOutcome) -> SimSummary {
        SimSummary {
            launched: self.total_launched,
            terminated: self.total_terminated,
            victims: self.victims,
            detection_sweeps: self.detection_sweeps,
            max_concurrent: self.max_concurrent,
            final_clock: self.clock.read(),
            final_held: std::array::from_fn(|r| self.ledger.held(r)),
            outcome,
        }
    }

    fn reply(&self, slot: usize, resource: usize) {
        self.hub.send(
            slot,
            Message {
                kind: MessageKind::Reply,
                resource,
                worker: slot,
            },
        );
    }

    fn journal(
        &mut self,
        at: ClockValue,
        kind: EventKind,
        worker: Option<usize>,
        resource: Option<usize>,
        text: String,
    ) {
        self.sink.record(SimEvent {
            at,
            kind,
            worker,
            resource,
            text,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::journal::InMemoryEventSink;
    use crate::core::RESOURCE_CAP;
    use crate::infra::channel::WorkerEndpoint;

    /// Coordinator with `n` occupied slots wired to test-held endpoints and
    /// no backing threads, so matrix state can be staged directly.
    fn staged_coordinator(n: usize) -> (Coordinator, Vec<WorkerEndpoint>) {
        let config = SimConfig::new(n, n, 1_000_000);
        let mut c = Coordinator::new(config, Box::new(InMemoryEventSink::new(4096))).unwrap();
        let mut endpoints = Vec::new();
        for slot in 0..n {
            let endpoint = c.hub.register(slot);
            c.table.occupy(slot, ClockValue::default());
            c.handles.push(None);
            c.total_launched += 1;
            endpoints.push(endpoint);
        }
        (c, endpoints)
    }

    fn saturate(c: &mut Coordinator, resource: usize, holder: usize) {
        for _ in 0..RESOURCE_CAP {
            assert_eq!(c.ledger.try_grant(resource, holder), GrantOutcome::Granted);
        }
    }

    fn queue_request(c: &mut Coordinator, resource: usize, slot: usize) {
        assert_eq!(c.ledger.try_grant(resource, slot), GrantOutcome::Queued);
        c.table.set_awaiting_reply(slot, true);
    }

    #[test]
    fn request_is_granted_and_replied() {
        let (mut c, endpoints) = staged_coordinator(1);
        endpoints[0]
            .send(Message { kind: MessageKind::Request, resource: 2, worker: 0 })
            .unwrap();
        c.table.set_awaiting_reply(0, true);

        c.drain_inbox(ClockValue::default());

        assert_eq!(c.ledger.allocation(2, 0), 1);
        assert!(!c.table.awaiting_reply(0));
        let reply = endpoints[0].receive().unwrap();
        assert_eq!(reply.kind, MessageKind::Reply);
        assert_eq!(reply.resource, 2);
    }

    #[test]
    fn queued_request_gets_no_reply() {
        let (mut c, endpoints) = staged_coordinator(2);
        saturate(&mut c, 5, 0);
        endpoints[1]
            .send(Message { kind: MessageKind::Request, resource: 5, worker: 1 })
            .unwrap();
        c.table.set_awaiting_reply(1, true);

        c.drain_inbox(ClockValue::default());

        assert!(c.ledger.is_pending(5, 1));
        // Still awaiting: the coordinator owes the reply until the grant.
        assert!(c.table.awaiting_reply(1));
        assert_eq!(endpoints[1].try_receive(), None);
    }

    #[test]
    fn release_of_unheld_class_is_still_acknowledged() {
        let (mut c, endpoints) = staged_coordinator(1);
        endpoints[0]
            .send(Message { kind: MessageKind::Release, resource: 3, worker: 0 })
            .unwrap();
        c.table.set_awaiting_reply(0, true);

        c.drain_inbox(ClockValue::default());

        assert_eq!(c.ledger.allocation(3, 0), 0);
        assert!(!c.table.awaiting_reply(0));
        assert_eq!(endpoints[0].receive().unwrap().kind, MessageKind::Reply);
    }

    #[test]
    fn permission_tokens_go_to_idle_workers_only() {
        let (mut c, endpoints) = staged_coordinator(3);
        // Slot 1 already holds a token; slot 2 is parked on a queued request.
        c.table.set_awaiting_reply(1, true);
        saturate(&mut c, 0, 0);
        queue_request(&mut c, 0, 2);

        c.grant_permissions();

        assert!(c.table.awaiting_reply(0));
        assert_eq!(endpoints[0].receive().unwrap().kind, MessageKind::Reply);
        // No fresh token for the worker that already holds one, nor for the
        // parked worker.
        assert_eq!(endpoints[1].try_receive(), None);
        assert_eq!(endpoints[2].try_receive(), None);
    }

    #[test]
    fn detection_kills_highest_indexed_waiter_and_reenters() {
        // Three workers each saturate one class and wait on another: a
        // textbook cycle. The detector must kill P2, then the re-entrant
        // pass grants P1 from the freed class and the remaining lone waiter
        // survives.
        let (mut c, endpoints) = staged_coordinator(3);
        saturate(&mut c, 0, 0);
        saturate(&mut c, 1, 1);
        saturate(&mut c, 2, 2);
        queue_request(&mut c, 1, 0);
        queue_request(&mut c, 2, 1);
        queue_request(&mut c, 0, 2);

        c.run_detection(ClockValue { seconds: 1, nanos: 0 });

        assert_eq!(c.total_terminated, 1);
        assert_eq!(c.victims, 1);
        assert!(!c.table.is_occupied(2));
        // P2's saturated class was freed and P1's wait satisfied from it.
        assert!(!c.ledger.has_pending(1));
        assert_eq!(c.ledger.allocation(2, 1), 1);
        let reply = endpoints[1].receive().unwrap();
        assert_eq!(reply.kind, MessageKind::Reply);
        assert_eq!(reply.resource, 2);
        // P0 is a lone waiter now: starved, not deadlocked, not killed.
        assert!(c.ledger.is_pending(1, 0));
        assert!(c.table.is_occupied(0));
        // The victim's mailbox was revoked.
        assert!(endpoints[2].receive().is_err());
    }

    #[test]
    fn satisfy_pending_sends_deferred_reply_after_release() {
        // Saturate R5, park a waiter, then release one instance: the next
        // sweep must grant the waiter and deliver the deferred reply.
        let (mut c, endpoints) = staged_coordinator(2);
        saturate(&mut c, 5, 0);
        queue_request(&mut c, 5, 1);

        c.run_detection(ClockValue { seconds: 1, nanos: 0 });
        assert!(c.ledger.is_pending(5, 1));

        c.ledger.release(5, 0);
        c.run_detection(ClockValue { seconds: 2, nanos: 0 });

        assert!(!c.ledger.is_pending(5, 1));
        assert_eq!(c.ledger.allocation(5, 1), 1);
        assert_eq!(c.ledger.held(5), RESOURCE_CAP);
        assert!(!c.table.awaiting_reply(1));
        let reply = endpoints[1].receive().unwrap();
        assert_eq!(reply.kind, MessageKind::Reply);
        assert_eq!(reply.resource, 5);
        // Both passes ran and neither killed anyone.
        assert_eq!(c.victims, 0);
        assert!(c.table.is_occupied(0));
        assert!(c.table.is_occupied(1));
    }

    #[test]
    fn reap_reclaims_resources_of_a_crashed_worker() {
        // A worker whose thread exits while holding two instances of R3:
        // the reap path must reclaim them and a parked waiter on R3 must be
        // granted by the next sweep.
        let (mut c, _endpoints) = staged_coordinator(3);
        assert_eq!(c.ledger.try_grant(3, 0), GrantOutcome::Granted);
        assert_eq!(c.ledger.try_grant(3, 0), GrantOutcome::Granted);
        for _ in 0..(RESOURCE_CAP - 2) {
            assert_eq!(c.ledger.try_grant(3, 1), GrantOutcome::Granted);
        }
        queue_request(&mut c, 3, 2);

        // Simulate the crash: a finished thread behind slot 0.
        c.handles[0] = Some(thread::spawn(|| {}));
        while !c.handles[0].as_ref().unwrap().is_finished() {
            thread::yield_now();
        }

        let held_before = c.ledger.held(3);
        c.reap_finished(ClockValue { seconds: 0, nanos: 500_000 });

        assert_eq!(c.total_terminated, 1);
        assert!(!c.table.is_occupied(0));
        assert_eq!(c.ledger.held(3), held_before - 2);

        c.run_detection(ClockValue { seconds: 1, nanos: 0 });
        assert!(!c.ledger.is_pending(3, 2));
        assert_eq!(c.ledger.allocation(3, 2), 1);
    }

    #[test]
    fn sweep_with_no_waiters_reports_no_deadlock() {
        let (mut c, _endpoints) = staged_coordinator(2);
        c.run_detection(ClockValue { seconds: 1, nanos: 0 });
        assert_eq!(c.victims, 0);
        assert_eq!(c.detection_sweeps, 1);
        assert_eq!(c.last_detect_s, 1);
    }

    #[test]
    fn message_from_departed_worker_is_dropped() {
        let (mut c, endpoints) = staged_coordinator(2);
        endpoints[1]
            .send(Message { kind: MessageKind::Request, resource: 0, worker: 1 })
            .unwrap();
        c.table.vacate(1);

        c.drain_inbox(ClockValue::default());
        assert_eq!(c.ledger.allocation(0, 1), 0);
        assert!(!c.ledger.has_pending(1));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimConfig::new(0, 1, 1000);
        let result = Coordinator::new(config, Box::new(InMemoryEventSink::new(8)));
        assert!(matches!(result, Err(SimError::Config(_))));
    }
}
