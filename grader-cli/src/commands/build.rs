use crate::output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use color_eyre::Result;

use exercise_service::execution::events::progress_channel;
use exercise_service::{BuildConfig, ExecutionEvent, IndexOrigin, LogLevel, Orchestrator};

/// Publish the exercise index and grade changed exercises
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Root of the exercise corpus
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub corpus: PathBuf,

    /// Where the index and reports are written
    #[arg(long, value_name = "DIR", default_value = "build")]
    pub dest: PathBuf,

    /// Keep each exercise's captured output under DIR/<id>
    #[arg(long, value_name = "DIR")]
    pub dump_outputs: Option<PathBuf>,

    /// Keep a copy of each exercise's report under DIR/<id>
    #[arg(long, value_name = "DIR")]
    pub dump_reports: Option<PathBuf>,

    /// Number of worker processes (default: available parallelism)
    #[arg(long, short = 'j', value_name = "N")]
    pub workers: Option<usize>,

    /// Show grading output
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Grade every exercise, even unchanged ones
    #[arg(long)]
    pub force: bool,

    /// Time limit per exercise, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl BuildArgs {
    fn config(&self) -> BuildConfig {
        let workers = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        BuildConfig::new(&self.corpus, &self.dest)
            .with_dump_outputs(self.dump_outputs.clone())
            .with_dump_reports(self.dump_reports.clone())
            .with_workers(workers)
            .with_verbose(self.verbose)
            .with_force(self.force)
            .with_job_timeout(self.timeout.map(Duration::from_secs))
    }
}

pub async fn execute(args: BuildArgs) -> Result<i32> {
    let config = args.config();
    output::status("Indexing", &format!("{}", config.corpus_root.display()));

    let (tx, mut rx) = progress_channel();
    let orchestrator =
        Orchestrator::new(config, Arc::new(super::grader())).with_progress(tx);

    // Spawn the build in background
    let build_handle = tokio::spawn(async move { orchestrator.build().await });

    // Process events in the foreground
    while let Some(event) = rx.recv().await {
        match &event {
            ExecutionEvent::DispatchStarted {
                total_jobs,
                stale_jobs,
                workers,
            } => {
                output::header(&format!(
                    "Grading {} of {} exercises ({} worker{})",
                    stale_jobs,
                    total_jobs,
                    workers,
                    if *workers == 1 { "" } else { "s" }
                ));
            }

            ExecutionEvent::JobUnchanged { job_id } => output::job_unchanged(job_id),

            ExecutionEvent::JobStarted { job_id } => {
                tracing::info!("Grading {}", job_id);
            }

            ExecutionEvent::JobCompleted {
                job_id,
                success,
                duration,
                exit_code,
            } => {
                if *success {
                    output::job_passed(job_id, *duration);
                } else {
                    output::job_failed(job_id, *duration, *exit_code);
                }
            }

            ExecutionEvent::Log {
                level,
                message,
                job_id,
            } => {
                let message = match job_id {
                    Some(id) => format!("{}: {}", id, message),
                    None => message.clone(),
                };
                match level {
                    LogLevel::Error => output::failure(&message),
                    LogLevel::Warning => output::warning(&message),
                }
            }

            ExecutionEvent::DispatchCompleted { .. } => {}
        }
    }

    let outcome = build_handle.await??;

    if outcome.index.origin == IndexOrigin::Inferred {
        output::info("No index.json in the corpus, the index was inferred from its directories");
    }

    let summary = outcome.summary;
    let message = format!(
        "{} exercises: {} passed, {} failed, {} unchanged",
        summary.total, summary.passed, summary.failed, summary.unchanged
    );
    eprintln!();
    if summary.success() {
        output::success(&message);
    } else {
        output::failure(&message);
    }

    Ok(outcome.exit_code())
}
