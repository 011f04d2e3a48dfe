// Execution Events
// Progress reporting and event types for job dispatch

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted while jobs are dispatched
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// Dispatch started
    DispatchStarted {
        total_jobs: usize,
        stale_jobs: usize,
        workers: usize,
    },

    /// Dispatch finished, every job has reported
    DispatchCompleted { success: bool, duration: Duration },

    /// Job skipped because its report is up to date
    JobUnchanged { job_id: String },

    /// Job started grading (in-process or in a worker)
    JobStarted { job_id: String },

    /// Job finished grading
    JobCompleted {
        job_id: String,
        success: bool,
        duration: Duration,
        /// Worker exit code, when the job ran in a worker process
        exit_code: Option<i32>,
    },

    /// Log message (warning, error)
    Log {
        level: LogLevel,
        message: String,
        job_id: Option<String>,
    },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Warning,
    Error,
}

impl ExecutionEvent {
    /// Create a dispatch started event
    pub fn dispatch_started(total_jobs: usize, stale_jobs: usize, workers: usize) -> Self {
        Self::DispatchStarted {
            total_jobs,
            stale_jobs,
            workers,
        }
    }

    /// Create a job unchanged event
    pub fn job_unchanged(job_id: impl Into<String>) -> Self {
        Self::JobUnchanged {
            job_id: job_id.into(),
        }
    }

    /// Create a job started event
    pub fn job_started(job_id: impl Into<String>) -> Self {
        Self::JobStarted {
            job_id: job_id.into(),
        }
    }

    /// Create a job completed event
    pub fn job_completed(
        job_id: impl Into<String>,
        success: bool,
        duration: Duration,
        exit_code: Option<i32>,
    ) -> Self {
        Self::JobCompleted {
            job_id: job_id.into(),
            success,
            duration,
            exit_code,
        }
    }

    /// Create a warning log event
    pub fn warning(message: impl Into<String>, job_id: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
            job_id,
        }
    }

    /// Create an error log event
    pub fn error(message: impl Into<String>, job_id: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Error,
            message: message.into(),
            job_id,
        }
    }

    /// The job this event belongs to, if any
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::JobUnchanged { job_id }
            | Self::JobStarted { job_id }
            | Self::JobCompleted { job_id, .. } => Some(job_id),
            Self::Log { job_id, .. } => job_id.as_deref(),
            Self::DispatchStarted { .. } | Self::DispatchCompleted { .. } => None,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
