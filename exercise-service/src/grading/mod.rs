// Grading Module
// Interface to the grading engine plus the script-based grader used by the CLI

pub mod report;
pub mod script;

// Re-export key types
pub use report::GradeReport;
pub use script::{ExerciseDefinition, ScriptGrader, DEFINITION_FILE};

use crate::document::DocumentError;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a grader
#[derive(Debug, Error)]
pub enum GraderError {
    #[error("exercise definition not found at {0}")]
    DefinitionNotFound(String),

    #[error("invalid exercise definition {path}: {message}")]
    InvalidDefinition { path: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// What the index needs to know about an exercise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseDescription {
    pub title: String,
    pub short_description: Option<String>,
}

/// A single grading job, self-contained so that it can be handed to a
/// worker process as an argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeRequest {
    /// Directory holding the exercise sources
    pub exercise_dir: PathBuf,
    /// Where the report document goes
    pub output_path: PathBuf,
    /// Where raw outputs are copied, if requested
    pub dump_outputs_dir: Option<PathBuf>,
    /// Where a copy of the report goes, if requested
    pub dump_reports_dir: Option<PathBuf>,
    /// Echo captured output after grading
    pub verbose: bool,
    /// Upper bound on the check's run time, on top of the exercise's own
    pub timeout: Option<Duration>,
}

impl GradeRequest {
    pub fn new(exercise_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            exercise_dir: exercise_dir.into(),
            output_path: output_path.into(),
            dump_outputs_dir: None,
            dump_reports_dir: None,
            verbose: false,
            timeout: None,
        }
    }

    pub fn with_dump_outputs(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_outputs_dir = dir;
        self
    }

    pub fn with_dump_reports(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_reports_dir = dir;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The grading engine.
///
/// `grade` must leave a parseable report at `request.output_path` when the
/// returned report says the exercise passed.
#[async_trait::async_trait]
pub trait Grader: Send + Sync {
    /// Read the exercise definition and describe it for the index
    fn describe(&self, exercise_dir: &Path) -> Result<ExerciseDescription, GraderError>;

    /// Grade one exercise
    async fn grade(&self, request: &GradeRequest) -> Result<GradeReport, GraderError>;
}
