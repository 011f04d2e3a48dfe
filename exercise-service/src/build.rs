// Build Orchestrator
// Index the corpus, publish the index, then grade every stale exercise

use crate::document::write_document;
use crate::error::BuildResult;
use crate::execution::{
    aggregate, BuildSummary, Dispatcher, DispatcherConfig, JobOutcome, ProgressSender,
    WorkerCommand,
};
use crate::grading::Grader;
use crate::index::{BuiltIndex, IndexBuilder, INDEX_FILE};
use crate::jobs::{assemble, JobLayout};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one build
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root of the exercise corpus
    pub corpus_root: PathBuf,
    /// Where the index and reports are written
    pub dest_root: PathBuf,
    /// Per-exercise copies of captured output
    pub dump_outputs_root: Option<PathBuf>,
    /// Per-exercise copies of reports
    pub dump_reports_root: Option<PathBuf>,
    /// Concurrent workers, 1 grades in-process
    pub workers: usize,
    /// Forwarded to every job
    pub verbose: bool,
    /// Regrade exercises whose reports are up to date
    pub force: bool,
    /// Time limit for a single job
    pub job_timeout: Option<Duration>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            corpus_root: PathBuf::from("."),
            dest_root: PathBuf::from("build"),
            dump_outputs_root: None,
            dump_reports_root: None,
            workers: 1,
            verbose: false,
            force: false,
            job_timeout: None,
        }
    }
}

impl BuildConfig {
    pub fn new(corpus_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            corpus_root: corpus_root.into(),
            dest_root: dest_root.into(),
            ..Default::default()
        }
    }

    pub fn with_dump_outputs(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_outputs_root = dir;
        self
    }

    pub fn with_dump_reports(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_reports_root = dir;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Path of the published index
    pub fn index_path(&self) -> PathBuf {
        self.dest_root.join(INDEX_FILE)
    }

    fn layout(&self) -> JobLayout {
        JobLayout {
            corpus_root: self.corpus_root.clone(),
            dest_root: self.dest_root.clone(),
            dump_outputs_root: self.dump_outputs_root.clone(),
            dump_reports_root: self.dump_reports_root.clone(),
            force: self.force,
        }
    }

    fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::default()
            .with_workers(self.workers)
            .with_verbose(self.verbose)
            .with_job_timeout(self.job_timeout)
    }
}

/// Result of a completed build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub index: BuiltIndex,
    /// One outcome per unique exercise, sorted by id
    pub outcomes: Vec<JobOutcome>,
    pub summary: BuildSummary,
}

impl BuildOutcome {
    pub fn exit_code(&self) -> i32 {
        aggregate(self.outcomes.iter().map(JobOutcome::success))
    }
}

/// Runs builds against a grader
pub struct Orchestrator {
    config: BuildConfig,
    grader: Arc<dyn Grader>,
    worker_command: Option<WorkerCommand>,
    event_tx: Option<ProgressSender>,
}

impl Orchestrator {
    pub fn new(config: BuildConfig, grader: Arc<dyn Grader>) -> Self {
        Self {
            config,
            grader,
            worker_command: None,
            event_tx: None,
        }
    }

    /// Override how pooled workers are started
    pub fn with_worker_command(mut self, command: WorkerCommand) -> Self {
        self.worker_command = Some(command);
        self
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the index without writing or grading anything
    pub fn validate(&self) -> BuildResult<BuiltIndex> {
        IndexBuilder::new(&self.config.corpus_root, self.grader.as_ref()).build()
    }

    /// Run a full build. Setup errors abort before the index is published
    /// or any job runs.
    pub async fn build(&self) -> BuildResult<BuildOutcome> {
        let index = self.validate()?;

        publish_index(&self.config.index_path(), &index)?;

        let jobs = assemble(&index.exercise_ids, &self.config.layout());
        tracing::info!(
            "Assembled {} jobs, {} stale",
            jobs.len(),
            jobs.iter().filter(|job| job.is_stale).count()
        );

        let mut dispatcher =
            Dispatcher::new(self.grader.clone()).with_config(self.config.dispatcher_config());
        if let Some(command) = &self.worker_command {
            dispatcher = dispatcher.with_worker_command(command.clone());
        }
        if let Some(tx) = &self.event_tx {
            dispatcher = dispatcher.with_progress(tx.clone());
        }

        let outcomes = dispatcher.dispatch(jobs).await;
        let summary = BuildSummary::from_outcomes(&outcomes);

        Ok(BuildOutcome {
            index,
            outcomes,
            summary,
        })
    }
}

fn publish_index(path: &Path, index: &BuiltIndex) -> BuildResult<()> {
    write_document(path, &index.exercise_index)?;
    tracing::info!("Published index to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::read_document;
    use crate::error::BuildError;
    use crate::execution::{JobStatus, EXIT_FAILURE, EXIT_SUCCESS};
    use crate::grading::{ExerciseDescription, GradeReport, GradeRequest, GraderError};
    use crate::index::ExerciseIndex;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Passes unless the exercise directory holds a `FAIL` marker; writes
    /// the report on success like a real grader
    struct MarkerGrader {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Grader for MarkerGrader {
        fn describe(&self, exercise_dir: &Path) -> Result<ExerciseDescription, GraderError> {
            let name = exercise_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_uppercase())
                .unwrap_or_default();
            Ok(ExerciseDescription {
                title: name,
                short_description: None,
            })
        }

        async fn grade(&self, request: &GradeRequest) -> Result<GradeReport, GraderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let success = !request.exercise_dir.join("FAIL").exists();
            let report = GradeReport {
                title: "marker".to_string(),
                success,
                exit_code: Some(if success { 0 } else { 1 }),
                timed_out: false,
                duration_ms: 0,
                stdout: String::new(),
                stderr: String::new(),
            };
            if success {
                write_document(&request.output_path, &report)?;
            }
            Ok(report)
        }
    }

    fn grader() -> Arc<MarkerGrader> {
        Arc::new(MarkerGrader {
            calls: AtomicUsize::new(0),
        })
    }

    fn add_exercise(corpus: &Path, id: &str) {
        let dir = corpus.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("meta.json"),
            r#"{"version":1,"data":{"kind":"exercise","stars":1.0}}"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_build_publishes_and_grades() {
        let root = tempfile::tempdir().unwrap();
        let corpus = root.path().join("corpus");
        let dest = root.path().join("dest");
        add_exercise(&corpus, "ex1");
        add_exercise(&corpus, "ex2");

        let grader = grader();
        let orchestrator = Orchestrator::new(BuildConfig::new(&corpus, &dest), grader.clone());
        let outcome = orchestrator.build().await.unwrap();

        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert_eq!(outcome.summary.passed, 2);
        assert_eq!(grader.calls.load(Ordering::SeqCst), 2);

        let published: ExerciseIndex = read_document(dest.join("index.json")).unwrap();
        assert_eq!(published, outcome.index.exercise_index);
        assert!(dest.join("ex1").join("report.json").exists());
    }

    #[tokio::test]
    async fn test_rebuild_skips_graded_exercises() {
        let root = tempfile::tempdir().unwrap();
        let corpus = root.path().join("corpus");
        let dest = root.path().join("dest");
        add_exercise(&corpus, "ex1");

        let grader = grader();
        let orchestrator = Orchestrator::new(BuildConfig::new(&corpus, &dest), grader.clone());
        orchestrator.build().await.unwrap();

        // Equal timestamps count as stale, so push the sources into the past
        let past = std::time::SystemTime::now() - Duration::from_secs(600);
        fs::File::options()
            .write(true)
            .open(corpus.join("ex1").join("meta.json"))
            .unwrap()
            .set_modified(past)
            .unwrap();

        let outcome = orchestrator.build().await.unwrap();
        assert_eq!(outcome.outcomes[0].status, JobStatus::Unchanged);
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert_eq!(grader.calls.load(Ordering::SeqCst), 1);

        let forced = Orchestrator::new(
            BuildConfig::new(&corpus, &dest).with_force(true),
            grader.clone(),
        );
        forced.build().await.unwrap();
        assert_eq!(grader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_exercise_fails_build() {
        let root = tempfile::tempdir().unwrap();
        let corpus = root.path().join("corpus");
        add_exercise(&corpus, "good");
        add_exercise(&corpus, "bad");
        fs::write(corpus.join("bad").join("FAIL"), "").unwrap();

        let outcome = Orchestrator::new(BuildConfig::new(&corpus, root.path().join("dest")), grader())
            .build()
            .await
            .unwrap();

        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
        assert_eq!(outcome.outcomes[0].id, "bad");
        assert_eq!(outcome.outcomes[0].status, JobStatus::Failed);
        assert_eq!(outcome.outcomes[1].status, JobStatus::Passed);
    }

    #[tokio::test]
    async fn test_fixed_exercise_clears_failure_on_rebuild() {
        let root = tempfile::tempdir().unwrap();
        let corpus = root.path().join("corpus");
        let dest = root.path().join("dest");
        add_exercise(&corpus, "good");
        add_exercise(&corpus, "bad");
        fs::write(corpus.join("bad").join("FAIL"), "").unwrap();

        let grader = grader();
        let first = Orchestrator::new(BuildConfig::new(&corpus, &dest), grader.clone())
            .build()
            .await
            .unwrap();
        assert_eq!(first.exit_code(), EXIT_FAILURE);

        let past = std::time::SystemTime::now() - Duration::from_secs(600);
        fs::File::options()
            .write(true)
            .open(corpus.join("good").join("meta.json"))
            .unwrap()
            .set_modified(past)
            .unwrap();

        // The failed exercise left no report, so only it is graded again
        fs::remove_file(corpus.join("bad").join("FAIL")).unwrap();
        let second = Orchestrator::new(BuildConfig::new(&corpus, &dest), grader.clone())
            .build()
            .await
            .unwrap();

        assert_eq!(second.outcomes[0].status, JobStatus::Passed);
        assert_eq!(second.outcomes[1].status, JobStatus::Unchanged);
        assert_eq!(second.exit_code(), EXIT_SUCCESS);
        assert_eq!(grader.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_setup_error_publishes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let corpus = root.path().join("corpus");
        let dest = root.path().join("dest");
        add_exercise(&corpus, "ex1");
        fs::write(
            corpus.join("index.json"),
            r#"{"version":1,"data":{"exercises":["ex1","ghost"]}}"#,
        )
        .unwrap();

        let grader = grader();
        let result = Orchestrator::new(BuildConfig::new(&corpus, &dest), grader.clone())
            .build()
            .await;

        assert!(matches!(result, Err(BuildError::MissingMetadata { ref id, .. }) if id == "ghost"));
        assert!(!dest.join("index.json").exists());
        assert_eq!(grader.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_validate_does_not_write() {
        let root = tempfile::tempdir().unwrap();
        let corpus = root.path().join("corpus");
        let dest = root.path().join("dest");
        add_exercise(&corpus, "ex1");

        let index = Orchestrator::new(BuildConfig::new(&corpus, &dest), grader())
            .validate()
            .unwrap();

        assert_eq!(index.exercise_ids, vec!["ex1".to_string()]);
        assert!(!dest.exists());
    }

    #[test]
    fn test_config_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.corpus_root, PathBuf::from("."));
        assert_eq!(config.dest_root, PathBuf::from("build"));
        assert_eq!(config.index_path(), PathBuf::from("build").join("index.json"));
        assert_eq!(config.with_workers(0).workers, 1);
    }
}
