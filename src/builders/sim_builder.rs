//! Coordinator construction from configuration.

use std::fs::OpenOptions;
use std::path::Path;

use crate::config::SimConfig;
use crate::core::{Coordinator, EventSink, FileEventSink, NullEventSink, SimError};

/// Assembles a [`Coordinator`] from a configuration and a journal sink.
///
/// Without an explicit sink the journal is discarded; the binary attaches a
/// [`FileEventSink`] via [`SimulationBuilder::with_log_file`], tests attach
/// an in-memory sink.
pub struct SimulationBuilder {
    config: SimConfig,
    sink: Option<Box<dyn EventSink>>,
}

impl SimulationBuilder {
    /// Builder over `config`.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self { config, sink: None }
    }

    /// Journal into `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Journal into `path`, opened for append. The file must already exist.
    ///
    /// # Errors
    ///
    /// [`SimError::Config`] when the file is missing, [`SimError::Io`] when
    /// it cannot be opened.
    pub fn with_log_file(self, path: &Path, mirror_stdout: bool) -> Result<Self, SimError> {
        if !path.is_file() {
            return Err(SimError::Config(format!(
                "log file {} does not exist",
                path.display()
            )));
        }
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(self.with_sink(Box::new(FileEventSink::new(file, mirror_stdout))))
    }

    /// Validate the configuration and build the coordinator.
    ///
    /// # Errors
    ///
    /// [`SimError::Config`] when validation fails.
    pub fn build(self) -> Result<Coordinator, SimError> {
        let sink = self.sink.unwrap_or_else(|| Box::new(NullEventSink));
        Coordinator::new(self.config, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_with_default_sink() {
        let builder = SimulationBuilder::new(SimConfig::new(1, 1, 1_000_000));
        assert!(builder.build().is_ok());
    }

    #[test]
    fn build_rejects_invalid_config() {
        let builder = SimulationBuilder::new(SimConfig::new(0, 1, 1_000_000));
        assert!(matches!(builder.build(), Err(SimError::Config(_))));
    }

    #[test]
    fn missing_log_file_is_a_config_error() {
        let builder = SimulationBuilder::new(SimConfig::new(1, 1, 1_000_000));
        let result = builder.with_log_file(Path::new("/definitely/not/here.log"), false);
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn existing_log_file_is_accepted() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let builder = SimulationBuilder::new(SimConfig::new(1, 1, 1_000_000));
        let result = builder.with_log_file(file.path(), false);
        assert!(result.is_ok());
    }
}
