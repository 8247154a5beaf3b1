//! # Diagnostics
//!
//! The task system never logs through a global logger directly. Every component
//! receives a [`Diagnostics`] handle at construction so hosts and tests can decide
//! where messages go.
//!
//! - [`LogDiagnostics`] forwards to the `log` facade (the default)
//! - [`NoopDiagnostics`] swallows everything
//! - [`RecordingDiagnostics`] keeps messages in memory for assertions

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::Level;

/// Default `log` target used by [`LogDiagnostics`].
pub const DEFAULT_LOG_TARGET: &str = "voxel_chunk_tasks";

/// Sink for the messages emitted by the worker pool and the task manager.
///
/// Implementations must be cheap and non-blocking: `warn` and `error` are called
/// from the authoritative thread inside the drain loop.
pub trait Diagnostics: Send + Sync {
    /// Lifecycle events.
    fn info(&self, message: &str);
    /// Dropped work, slow shutdowns.
    fn warn(&self, message: &str);
    /// Failed tasks and failed result callbacks.
    fn error(&self, message: &str);
    /// Per-task chatter. Ignored unless overridden.
    fn debug(&self, _message: &str) {}
}

/// Shared handle to a diagnostics sink.
pub type SharedDiagnostics = Arc<dyn Diagnostics>;

/// Forwards every message to the `log` crate under a fixed target.
#[derive(Debug, Clone)]
pub struct LogDiagnostics {
    target: String,
}

impl LogDiagnostics {
    /// Creates a sink logging under `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    fn emit(&self, level: Level, message: &str) {
        log::log!(target: &self.target, level, "{}", message);
    }
}

impl Default for LogDiagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_TARGET)
    }
}

impl Diagnostics for LogDiagnostics {
    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Severity attached to a [`RecordedMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// See [`Diagnostics::debug`].
    Debug,
    /// See [`Diagnostics::info`].
    Info,
    /// See [`Diagnostics::warn`].
    Warn,
    /// See [`Diagnostics::error`].
    Error,
}

/// One message captured by [`RecordingDiagnostics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    /// Severity the message was emitted with.
    pub severity: Severity,
    /// The message text.
    pub message: String,
}

/// Keeps every message in memory. Intended for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingDiagnostics {
    messages: Arc<Mutex<Vec<RecordedMessage>>>,
}

impl RecordingDiagnostics {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first.
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.lock().clone()
    }

    /// Number of recorded messages with `severity` containing `needle`.
    pub fn count(&self, severity: Severity, needle: &str) -> usize {
        self.lock()
            .iter()
            .filter(|recorded| recorded.severity == severity && recorded.message.contains(needle))
            .count()
    }

    fn push(&self, severity: Severity, message: &str) {
        self.lock().push(RecordedMessage {
            severity,
            message: message.to_string(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn info(&self, message: &str) {
        self.push(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(Severity::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Severity::Error, message);
    }

    fn debug(&self, message: &str) {
        self.push(Severity::Debug, message);
    }
}
