//! Diagnostic channel for directive processing.
//!
//! Factories and the engine report user-facing diagnostics (unused directives,
//! failed variants) through a [`Logger`] rather than straight to `tracing`, so
//! a host tool can route them into its own output. [`TracingLogger`] is the
//! default; [`RecordingLogger`] keeps messages in memory.

use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Messages at one level, in the order they were logged.
    pub fn at(&self, level: Level) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    fn push(&self, level: Level, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_keeps_order_and_levels() {
        let logger = RecordingLogger::new();
        logger.warn("first");
        logger.info("second");
        logger.warn("third");

        assert_eq!(logger.at(Level::Warn), vec!["first", "third"]);
        assert_eq!(logger.messages().len(), 3);
        assert!(logger.at(Level::Error).is_empty());
    }
}
