// Script Grader
// Grades an exercise by running the check command from its exercise.yaml

use crate::document::write_document;
use crate::grading::{ExerciseDescription, GradeReport, GradeRequest, Grader, GraderError};
use crate::runners::{ShellConfig, ShellRunner};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// File name of the exercise definition inside each exercise directory
pub const DEFINITION_FILE: &str = "exercise.yaml";

/// File name used for report copies in the dump directory
const DUMPED_REPORT_FILE: &str = "report.json";

/// Exercise definition (exercise.yaml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDefinition {
    /// Display title
    pub title: String,

    /// One-line description shown in listings
    #[serde(default)]
    pub short_description: Option<String>,

    /// Shell command that exits 0 when the solution passes
    pub check: String,

    /// Time limit for the check command
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Extra environment for the check command
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl FromStr for ExerciseDefinition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let definition: ExerciseDefinition = serde_yaml::from_str(s).map_err(|e| e.to_string())?;

        if definition.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if definition.check.trim().is_empty() {
            return Err("check must not be empty".to_string());
        }

        Ok(definition)
    }
}

impl ExerciseDefinition {
    /// Load the definition stored in an exercise directory
    pub fn from_dir(exercise_dir: &Path) -> Result<Self, GraderError> {
        let path = exercise_dir.join(DEFINITION_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(GraderError::DefinitionNotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        content
            .parse()
            .map_err(|message| GraderError::InvalidDefinition {
                path: path.display().to_string(),
                message,
            })
    }

    /// Time limit as a duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Grader that runs each exercise's check command in its own directory
pub struct ScriptGrader {
    runner: ShellRunner,
    default_timeout: Option<Duration>,
}

impl ScriptGrader {
    pub fn new() -> Self {
        Self {
            runner: ShellRunner::new(),
            default_timeout: None,
        }
    }

    /// Time limit for exercises that do not declare one
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }
}

impl Default for ScriptGrader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Grader for ScriptGrader {
    fn describe(&self, exercise_dir: &Path) -> Result<ExerciseDescription, GraderError> {
        let definition = ExerciseDefinition::from_dir(exercise_dir)?;
        Ok(ExerciseDescription {
            title: definition.title,
            short_description: definition.short_description,
        })
    }

    async fn grade(&self, request: &GradeRequest) -> Result<GradeReport, GraderError> {
        let definition = ExerciseDefinition::from_dir(&request.exercise_dir)?;

        let mut env = definition.env.clone();
        env.insert(
            "EXERCISE_DIR".to_string(),
            request.exercise_dir.display().to_string(),
        );

        // The tighter of the exercise's own limit and the job's limit wins
        let config = ShellConfig {
            timeout: [definition.timeout().or(self.default_timeout), request.timeout]
                .into_iter()
                .flatten()
                .min(),
        };

        tracing::debug!(
            "Running check for {}: {}",
            request.exercise_dir.display(),
            definition.check
        );
        let output = self
            .runner
            .run_script(&definition.check, &env, &request.exercise_dir, &config)
            .await;

        let report = GradeReport {
            title: definition.title,
            success: output.succeeded(),
            exit_code: output.exit_code,
            timed_out: output.timed_out,
            duration_ms: output.duration.as_millis() as u64,
            stdout: output.stdout,
            stderr: output.stderr,
        };

        if let Some(dir) = &request.dump_outputs_dir {
            fs::create_dir_all(dir)?;
            fs::write(dir.join("stdout.txt"), &report.stdout)?;
            fs::write(dir.join("stderr.txt"), &report.stderr)?;
        }

        if let Some(dir) = &request.dump_reports_dir {
            write_document(dir.join(DUMPED_REPORT_FILE), &report)?;
        }

        if report.success {
            write_document(&request.output_path, &report)?;
        } else {
            // A failed exercise must stay stale for the next build
            match fs::remove_file(&request.output_path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(report)
    }
}
