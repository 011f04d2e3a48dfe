use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use exercise_service::{run_job, GradeRequest, EXIT_FAILURE, EXIT_SUCCESS};

/// Arguments of a worker process. Mirrors `worker_args` in the library.
#[derive(Parser, Debug)]
#[command(name = "grader-worker")]
#[command(about = "Grade a single exercise")]
pub struct WorkerArgs {
    /// Exercise directory
    #[arg(long, value_name = "DIR")]
    pub exercise_dir: PathBuf,

    /// Report path
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,

    #[arg(long, value_name = "DIR")]
    pub dump_outputs: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub dump_reports: Option<PathBuf>,

    /// Echo captured output
    #[arg(long)]
    pub verbose: bool,

    /// Stop the check after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

impl WorkerArgs {
    fn request(self) -> GradeRequest {
        GradeRequest::new(self.exercise_dir, self.output)
            .with_dump_outputs(self.dump_outputs)
            .with_dump_reports(self.dump_reports)
            .with_verbose(self.verbose)
            .with_timeout(self.timeout_ms.map(Duration::from_millis))
    }
}

/// Run one job and return the worker's exit code
pub async fn execute(args: WorkerArgs) -> i32 {
    let grader = super::grader();
    if run_job(&grader, &args.request()).await {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}
