//! Shared status of the batch run.
//!
//! One runner writes; any number of observers read. Scalars are atomics so a
//! status poll never waits on the runner. The log and the text fields sit
//! behind short-lived mutexes and are only appended to or overwritten.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Idle,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl BatchStatus {
    fn as_u8(self) -> u8 {
        match self {
            BatchStatus::Idle => 0,
            BatchStatus::Running => 1,
            BatchStatus::Completed => 2,
            BatchStatus::Error => 3,
            BatchStatus::Cancelled => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => BatchStatus::Running,
            2 => BatchStatus::Completed,
            3 => BatchStatus::Error,
            4 => BatchStatus::Cancelled,
            _ => BatchStatus::Idle,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Error | BatchStatus::Cancelled
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Idle => write!(f, "idle"),
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Error => write!(f, "error"),
            BatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: &str, target: &str, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.to_string(),
            target: target.to_string(),
            message: message.to_string(),
        }
    }
}

/// A point-in-time copy of the state for pollers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: BatchStatus,
    pub current_step: String,
    pub step: usize,
    pub total_steps: usize,
    pub students_done: usize,
    pub students_total: usize,
    pub cancel_requested: bool,
    pub logs: Vec<LogEvent>,
    pub error: Option<String>,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct PipelineState {
    status: AtomicU8,
    step: AtomicUsize,
    total_steps: AtomicUsize,
    students_done: AtomicUsize,
    students_total: AtomicUsize,
    cancel: AtomicBool,
    current_step: Mutex<String>,
    logs: Mutex<Vec<LogEvent>>,
    error: Mutex<Option<String>>,
    output_path: Mutex<Option<PathBuf>>,
}

impl PipelineState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn status(&self) -> BatchStatus {
        BatchStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.status() == BatchStatus::Running
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Asks the running batch to stop after the student in flight.
    pub fn request_cancel(&self) -> Result<(), PipelineError> {
        if !self.is_running() {
            return Err(PipelineError::NotRunning);
        }
        self.cancel.store(true, Ordering::SeqCst);
        self.log("WARN", "gradesheet::pipeline", "Cancellation requested");
        Ok(())
    }

    /// Back to idle with an empty log. Refused while a batch runs.
    pub fn reset(&self) -> Result<(), PipelineError> {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }
        self.status
            .store(BatchStatus::Idle.as_u8(), Ordering::SeqCst);
        self.step.store(0, Ordering::SeqCst);
        self.total_steps.store(0, Ordering::SeqCst);
        self.students_done.store(0, Ordering::SeqCst);
        self.students_total.store(0, Ordering::SeqCst);
        self.cancel.store(false, Ordering::SeqCst);
        set(&self.current_step, String::new());
        set(&self.error, None);
        set(&self.output_path, None);
        if let Ok(mut logs) = self.logs.lock() {
            logs.clear();
        }
        Ok(())
    }

    /// Moves from idle (or a finished run) to running.
    pub(crate) fn begin(&self, total_steps: usize) -> Result<(), PipelineError> {
        self.reset()?;
        self.total_steps.store(total_steps, Ordering::SeqCst);
        self.status
            .store(BatchStatus::Running.as_u8(), Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn set_step(&self, step: usize, name: &str) {
        self.step.store(step, Ordering::SeqCst);
        set(&self.current_step, name.to_string());
    }

    pub(crate) fn set_student_progress(&self, done: usize, total: usize) {
        self.students_total.store(total, Ordering::SeqCst);
        self.students_done.store(done, Ordering::SeqCst);
    }

    pub(crate) fn complete(&self, output_path: PathBuf) {
        set(&self.output_path, Some(output_path));
        self.status
            .store(BatchStatus::Completed.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn cancelled(&self, output_path: Option<PathBuf>) {
        set(&self.output_path, output_path);
        self.status
            .store(BatchStatus::Cancelled.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn fail(&self, error: &PipelineError) {
        let message = error.to_string();
        self.log("ERROR", "gradesheet::pipeline", &message);
        set(&self.error, Some(message));
        self.status
            .store(BatchStatus::Error.as_u8(), Ordering::SeqCst);
    }

    pub fn log(&self, level: &str, target: &str, message: &str) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(LogEvent::new(level, target, message));
        }
    }

    pub fn logs(&self) -> Vec<LogEvent> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn error(&self) -> Option<String> {
        self.error.lock().ok().and_then(|e| e.clone())
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        self.output_path.lock().ok().and_then(|p| p.clone())
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status(),
            current_step: self
                .current_step
                .lock()
                .map(|s| s.clone())
                .unwrap_or_default(),
            step: self.step.load(Ordering::SeqCst),
            total_steps: self.total_steps.load(Ordering::SeqCst),
            students_done: self.students_done.load(Ordering::SeqCst),
            students_total: self.students_total.load(Ordering::SeqCst),
            cancel_requested: self.is_cancel_requested(),
            logs: self.logs(),
            error: self.error(),
            output_path: self.output_path(),
        }
    }
}

fn set<T>(slot: &Mutex<T>, value: T) {
    if let Ok(mut guard) = slot.lock() {
        *guard = value;
    }
}
