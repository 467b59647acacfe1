//! Log file behavior: append-only journaling through a full run.

use std::io::Write;

use resource_arbiter::builders::SimulationBuilder;
use resource_arbiter::config::SimConfig;
use resource_arbiter::core::RunOutcome;

#[test]
fn run_appends_to_an_existing_log_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "pre-existing line").unwrap();
    file.flush().unwrap();

    let config = SimConfig::new(1, 1, 10_000_000).with_seed(4).with_watchdog_secs(30);
    let mut coordinator = SimulationBuilder::new(config)
        .with_log_file(file.path(), false)
        .unwrap()
        .build()
        .unwrap();
    let summary = coordinator.run().unwrap();
    assert_eq!(summary.outcome, RunOutcome::Completed);

    let contents = std::fs::read_to_string(file.path()).unwrap();
    // Appended, not truncated.
    assert!(contents.starts_with("pre-existing line"));
    assert!(contents.contains("launching worker P0"));
    assert!(contents.contains("worker P0 terminated"));
    // The final report includes both matrices.
    assert!(contents.contains("Allocated Matrix:"));
    assert!(contents.contains("Requested Matrix:"));
    // Every journal line carries a virtual timestamp prefix.
    assert!(contents.lines().skip(1).any(|line| line.starts_with('[')));
}

#[test]
fn missing_log_file_fails_before_the_run() {
    let config = SimConfig::new(1, 1, 10_000_000);
    let result =
        SimulationBuilder::new(config).with_log_file(std::path::Path::new("no-such.log"), false);
    assert!(result.is_err());
}
