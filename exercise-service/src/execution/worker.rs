// Worker Protocol
// Re-entry of the same binary as a single-job grading worker

use crate::grading::{GradeRequest, Grader};

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Environment variable that turns a process into a worker
pub const WORKER_ENV: &str = "GRADER_WORKER";

pub const ARG_EXERCISE_DIR: &str = "--exercise-dir";
pub const ARG_OUTPUT: &str = "--output";
pub const ARG_DUMP_OUTPUTS: &str = "--dump-outputs";
pub const ARG_DUMP_REPORTS: &str = "--dump-reports";
pub const ARG_VERBOSE: &str = "--verbose";
pub const ARG_TIMEOUT_MS: &str = "--timeout-ms";

/// Whether this process was started as a worker
pub fn is_worker_process() -> bool {
    std::env::var_os(WORKER_ENV).is_some()
}

/// The argument list that describes `request` to a worker
pub fn worker_args(request: &GradeRequest) -> Vec<OsString> {
    let mut args = vec![
        OsString::from(ARG_EXERCISE_DIR),
        request.exercise_dir.clone().into_os_string(),
        OsString::from(ARG_OUTPUT),
        request.output_path.clone().into_os_string(),
    ];

    if let Some(dir) = &request.dump_outputs_dir {
        args.push(OsString::from(ARG_DUMP_OUTPUTS));
        args.push(dir.clone().into_os_string());
    }
    if let Some(dir) = &request.dump_reports_dir {
        args.push(OsString::from(ARG_DUMP_REPORTS));
        args.push(dir.clone().into_os_string());
    }
    if request.verbose {
        args.push(OsString::from(ARG_VERBOSE));
    }
    // The worker enforces the limit itself so its check dies with it
    if let Some(timeout) = request.timeout {
        args.push(OsString::from(ARG_TIMEOUT_MS));
        args.push(OsString::from(timeout.as_millis().to_string()));
    }

    args
}

/// How to start a worker process
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl WorkerCommand {
    /// Workers run the current executable
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the job arguments
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Build the worker command for one job. Output streams are inherited
    /// so that verbose workers print straight to the terminal.
    pub fn command(&self, request: &GradeRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd.args(worker_args(request));
        cmd.env(WORKER_ENV, "1");
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Grade one job and report whether it passed.
///
/// This is the only place grading is invoked: the sequential dispatcher
/// calls it directly and worker processes call it from their entry point.
pub async fn run_job(grader: &dyn Grader, request: &GradeRequest) -> bool {
    match grader.grade(request).await {
        Ok(report) => {
            if request.verbose {
                for line in report.stdout.lines() {
                    eprintln!("        | {}", line);
                }
                for line in report.stderr.lines() {
                    eprintln!("\x1b[31m        | {}\x1b[0m", line);
                }
            }
            tracing::debug!(
                "Graded {}: success={} exit_code={:?}",
                request.exercise_dir.display(),
                report.success,
                report.exit_code
            );
            report.success
        }
        Err(e) => {
            tracing::error!("Grading {} failed: {}", request.exercise_dir.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{ExerciseDescription, GradeReport, GraderError};
    use std::path::Path;
    use std::time::Duration;

    struct FixedGrader {
        result: Option<bool>,
    }

    #[async_trait::async_trait]
    impl Grader for FixedGrader {
        fn describe(&self, _exercise_dir: &Path) -> Result<ExerciseDescription, GraderError> {
            Ok(ExerciseDescription {
                title: "Fixed".to_string(),
                short_description: None,
            })
        }

        async fn grade(&self, _request: &GradeRequest) -> Result<GradeReport, GraderError> {
            match self.result {
                Some(success) => Ok(GradeReport {
                    title: "Fixed".to_string(),
                    success,
                    exit_code: Some(if success { 0 } else { 1 }),
                    timed_out: false,
                    duration_ms: 0,
                    stdout: "line".to_string(),
                    stderr: String::new(),
                }),
                None => Err(GraderError::DefinitionNotFound("exercise.yaml".to_string())),
            }
        }
    }

    #[test]
    fn test_worker_args_minimal() {
        let request = GradeRequest::new("/corpus/ex1", "/dest/ex1/report.json");
        let args = worker_args(&request);
        assert_eq!(
            args,
            vec![
                OsString::from("--exercise-dir"),
                OsString::from("/corpus/ex1"),
                OsString::from("--output"),
                OsString::from("/dest/ex1/report.json"),
            ]
        );
    }

    #[test]
    fn test_worker_args_full() {
        let request = GradeRequest::new("/corpus/ex1", "/dest/ex1/report.json")
            .with_dump_outputs(Some(PathBuf::from("/out/ex1")))
            .with_dump_reports(Some(PathBuf::from("/rep/ex1")))
            .with_verbose(true)
            .with_timeout(Some(Duration::from_millis(1500)));

        let args: Vec<String> = worker_args(&request)
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();
        assert_eq!(
            &args[4..],
            &[
                "--dump-outputs",
                "/out/ex1",
                "--dump-reports",
                "/rep/ex1",
                "--verbose",
                "--timeout-ms",
                "1500"
            ]
        );
    }

    #[test]
    fn test_worker_command_sets_sentinel() {
        let command = WorkerCommand::new("/bin/grader").with_leading_args(["worker"]);
        let cmd = command.command(&GradeRequest::new("/c/ex", "/d/ex/report.json"));
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_program(), "/bin/grader");
        assert_eq!(std_cmd.get_args().next().unwrap(), "worker");
        assert!(std_cmd
            .get_envs()
            .any(|(key, value)| key == WORKER_ENV && value.is_some()));
    }

    #[tokio::test]
    async fn test_run_job_outcomes() {
        let request = GradeRequest::new("/c/ex", "/d/ex/report.json");

        assert!(run_job(&FixedGrader { result: Some(true) }, &request).await);
        assert!(!run_job(&FixedGrader { result: Some(false) }, &request).await);
        assert!(!run_job(&FixedGrader { result: None }, &request).await);
    }
}
