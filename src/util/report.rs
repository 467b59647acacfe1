//! Text reports for the process table and resource matrices.
//!
//! Layout follows the run log convention: the process table first, then the
//! Allocated and Requested matrices with one column per resource class and
//! one row per ever-launched worker slot.

use std::fmt::Write;

use crate::core::clock::ClockValue;
use crate::core::ledger::ResourceLedger;
use crate::core::process_table::ProcessTable;
use crate::core::RESOURCE_CLASSES;

/// Render the process table for every slot launched so far.
#[must_use]
pub fn process_table_report(now: ClockValue, table: &ProcessTable, launched: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Process table at {now}:");
    let _ = writeln!(
        out,
        "{:<6}{:<10}{:<12}{:<12}",
        "Entry", "Occupied", "StartS", "StartN"
    );
    for slot in 0..launched {
        let entry = table.slot(slot);
        let _ = writeln!(
            out,
            "{:<6}{:<10}{:<12}{:<12}",
            slot,
            u8::from(entry.occupied),
            entry.started_at.seconds,
            entry.started_at.nanos
        );
    }
    out
}

/// Render the Allocated and Requested matrices for every slot launched so
/// far.
#[must_use]
pub fn matrices_report(ledger: &ResourceLedger, launched: usize) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Allocated Matrix:");
    write_header(&mut out);
    for slot in 0..launched {
        let _ = write!(out, "P{slot:<4}");
        for resource in 0..RESOURCE_CLASSES {
            let _ = write!(out, " {:<3}", ledger.allocation(resource, slot));
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Requested Matrix:");
    write_header(&mut out);
    for slot in 0..launched {
        let _ = write!(out, "P{slot:<4}");
        for resource in 0..RESOURCE_CLASSES {
            let _ = write!(out, " {:<3}", u8::from(ledger.is_pending(resource, slot)));
        }
        let _ = writeln!(out);
    }

    out
}

/// Render a nonzero release vector as `R2:1 R7:3`, or `none` when empty.
#[must_use]
pub fn released_list(released: &[u32; RESOURCE_CLASSES]) -> String {
    let parts: Vec<String> = released
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(resource, count)| format!("R{resource}:{count}"))
        .collect();
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(" ")
    }
}

fn write_header(out: &mut String) {
    let _ = write!(out, "{:<5}", "");
    for resource in 0..RESOURCE_CLASSES {
        let _ = write!(out, " R{resource:<2}");
    }
    let _ = writeln!(out);
}
