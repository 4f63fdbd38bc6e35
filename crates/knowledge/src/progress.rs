//! Progress reporting for index builds.
//!
//! The build emits one event per document loaded and chunked, per embedding
//! batch completed, and once when the index is written.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Stage of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Load,
    Chunk,
    Embed,
    Index,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Load => "load",
            BuildPhase::Chunk => "chunk",
            BuildPhase::Embed => "embed",
            BuildPhase::Index => "index",
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event emitted during a build.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: BuildPhase,

    /// Units done so far (documents, chunks embedded)
    pub current: u64,

    /// Total expected work, if known
    pub total: Option<u64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: BuildPhase,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Percentage complete (0.0 - 100.0), when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|t| {
            if t > 0 {
                (self.current as f64 / t as f64) * 100.0
            } else {
                0.0
            }
        })
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        let pct = self
            .percentage()
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Forwards build progress to a callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// A reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(callback) = &self.callback else {
            return;
        };
        let event = event.with_elapsed(self.start_time.elapsed().as_secs_f64());

        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            "Progress event"
        );
        callback(event);
    }

    pub fn load(&self, documents: u64, dir: &str) {
        self.emit(ProgressEvent::new(
            BuildPhase::Load,
            documents,
            Some(documents),
            format!("read {}", dir),
        ));
    }

    pub fn chunk(&self, current: u64, total: u64, chunks_so_far: usize) {
        self.emit(ProgressEvent::new(
            BuildPhase::Chunk,
            current,
            Some(total),
            format!("{} chunks created", chunks_so_far),
        ));
    }

    pub fn embed(&self, current: u64, total: u64, model: &str) {
        self.emit(ProgressEvent::new(
            BuildPhase::Embed,
            current,
            Some(total),
            format!("model={}", model),
        ));
    }

    pub fn index(&self, chunks: u64) {
        self.emit(ProgressEvent::new(
            BuildPhase::Index,
            chunks,
            Some(chunks),
            "writing to LanceDB",
        ));
    }
}
