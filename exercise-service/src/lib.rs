// Exercise Service Library
// Exercise index builder and incremental grading orchestrator

pub mod build;
pub mod document;
pub mod error;
pub mod execution;
pub mod grading;
pub mod index;
pub mod jobs;
pub mod runners;
pub mod staleness;

// Re-export commonly used types
pub use error::{BuildError, BuildResult};

// Re-export orchestration types
pub use build::{BuildConfig, BuildOutcome, Orchestrator};

// Re-export document types
pub use document::{read_document, write_document, Document, DocumentError, SchemaError};

// Re-export index types
pub use index::{
    BuiltIndex, ExerciseGroup, ExerciseIndex, ExerciseKind, ExerciseMeta, ExerciseSummary, Group,
    Index, IndexBuilder, IndexOrigin,
};

// Re-export grading types
pub use grading::{
    ExerciseDefinition, ExerciseDescription, GradeReport, GradeRequest, Grader, GraderError,
    ScriptGrader,
};

// Re-export job and execution types
pub use execution::{
    aggregate, is_worker_process, progress_channel, run_job, BuildSummary, Dispatcher,
    DispatcherConfig, EventSender, ExecutionEvent, JobOutcome, JobStatus, LogLevel,
    ProgressSender, WorkerCommand, EXIT_FAILURE, EXIT_SETUP_ERROR, EXIT_SUCCESS, WORKER_ENV,
};
pub use jobs::{assemble, JobDescriptor, JobLayout};
pub use staleness::is_stale;
