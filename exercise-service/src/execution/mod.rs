// Execution Module
// Job dispatch, worker re-entry, progress events and result aggregation

pub mod aggregate;
pub mod dispatcher;
pub mod events;
pub mod worker;

// Re-export key types
pub use aggregate::{aggregate, BuildSummary, EXIT_FAILURE, EXIT_SETUP_ERROR, EXIT_SUCCESS};
pub use dispatcher::{Dispatcher, DispatcherConfig, JobOutcome, JobStatus};
pub use events::{progress_channel, EventSender, ExecutionEvent, LogLevel, ProgressSender};
pub use worker::{is_worker_process, run_job, worker_args, WorkerCommand, WORKER_ENV};
