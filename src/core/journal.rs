//! Event journal sinks.
//!
//! Every observable simulation event flows through an [`EventSink`]: the file
//! sink appends each line to the run's log file and mirrors it to stdout,
//! while the in-memory sink keeps a bounded buffer for tests and dev runs.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;

use crate::core::clock::ClockValue;

/// Classification of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A worker was launched into a slot.
    Spawn,
    /// A request message arrived.
    Request,
    /// A request was granted, immediately or from the wait queue.
    Grant,
    /// A request could not be satisfied and was queued.
    Queue,
    /// A release was acknowledged.
    Release,
    /// A terminated worker was reaped and its resources reclaimed.
    Reap,
    /// A deadlock detection sweep started.
    Sweep,
    /// A sweep found no deadlock.
    NoDeadlock,
    /// A victim was terminated to break a deadlock.
    Victim,
    /// A periodic process-table / matrix report.
    Report,
}

/// One journal entry with its simulated timestamp.
#[derive(Debug, Clone)]
pub struct SimEvent {
    /// Simulated time of the event.
    pub at: ClockValue,
    /// Entry classification.
    pub kind: EventKind,
    /// Worker slot involved, if any.
    pub worker: Option<usize>,
    /// Resource class involved, if any.
    pub resource: Option<usize>,
    /// Formatted journal text; may span multiple lines for reports.
    pub text: String,
}

/// Sink abstraction for journal entries.
pub trait EventSink: Send {
    /// Record one event.
    fn record(&mut self, event: SimEvent);
}

/// In-memory sink with a bounded buffer, for tests and dev.
pub struct InMemoryEventSink {
    events: VecDeque<SimEvent>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// New sink retaining at most `max_events` entries.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(4096)),
            max_events,
        }
    }

    /// Snapshot of the stored events.
    #[must_use]
    pub fn events(&self) -> Vec<SimEvent> {
        self.events.iter().cloned().collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&mut self, event: SimEvent) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink that appends to the run's log file and mirrors every line to stdout.
pub struct FileEventSink {
    file: File,
    mirror_stdout: bool,
}

impl FileEventSink {
    /// Wrap an already-opened (append-mode) log file.
    #[must_use]
    pub fn new(file: File, mirror_stdout: bool) -> Self {
        Self { file, mirror_stdout }
    }
}

impl EventSink for FileEventSink {
    fn record(&mut self, event: SimEvent) {
        let line = format!("[{}] {}", event.at, event.text);
        if let Err(e) = writeln!(self.file, "{line}") {
            tracing::error!(error = %e, "journal write failed");
        }
        if self.mirror_stdout {
            println!("{line}");
        }
    }
}

/// Sink that discards everything. Useful for throughput benchmarks.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&mut self, _event: SimEvent) {}
}
