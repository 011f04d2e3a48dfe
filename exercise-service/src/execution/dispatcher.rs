// Job Dispatcher
// Runs grading jobs in-process one at a time, or in a bounded pool of worker processes

use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::worker::{run_job, WorkerCommand};
use crate::grading::Grader;
use crate::jobs::JobDescriptor;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Configuration for job dispatch
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of concurrent workers. 1 grades in-process, sequentially.
    pub workers: usize,
    /// Ask graders to echo captured output
    pub verbose: bool,
    /// Upper bound on a single job's wall time
    pub job_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            verbose: false,
            job_timeout: None,
        }
    }
}

impl DispatcherConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Whether jobs run in worker processes
    pub fn is_pooled(&self) -> bool {
        self.workers > 1
    }
}

/// Final state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Report was up to date, nothing ran
    Unchanged,
    Passed,
    Failed,
}

/// Result of one dispatched job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub id: String,
    pub status: JobStatus,
    pub duration: Duration,
    /// Worker exit code, pooled mode only
    pub exit_code: Option<i32>,
}

impl JobOutcome {
    fn unchanged(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: JobStatus::Unchanged,
            duration: Duration::ZERO,
            exit_code: None,
        }
    }

    fn finished(id: &str, success: bool, duration: Duration, exit_code: Option<i32>) -> Self {
        Self {
            id: id.to_string(),
            status: if success {
                JobStatus::Passed
            } else {
                JobStatus::Failed
            },
            duration,
            exit_code,
        }
    }

    /// Unchanged jobs count as successes
    pub fn success(&self) -> bool {
        self.status != JobStatus::Failed
    }
}

/// Dispatches grading jobs
pub struct Dispatcher {
    config: DispatcherConfig,
    grader: Arc<dyn Grader>,
    worker_command: Option<WorkerCommand>,
    event_tx: Option<ProgressSender>,
}

impl Dispatcher {
    /// Workers default to re-running the current executable
    pub fn new(grader: Arc<dyn Grader>) -> Self {
        let worker_command = match WorkerCommand::current_exe() {
            Ok(command) => Some(command),
            Err(e) => {
                tracing::debug!("Cannot locate current executable: {}", e);
                None
            }
        };

        Self {
            config: DispatcherConfig::default(),
            grader,
            worker_command,
            event_tx: None,
        }
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_worker_command(mut self, command: WorkerCommand) -> Self {
        self.worker_command = Some(command);
        self
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run every job and return one outcome per job, in job order
    pub async fn dispatch(&self, jobs: Vec<JobDescriptor>) -> Vec<JobOutcome> {
        let start = Instant::now();
        let stale = jobs.iter().filter(|job| job.is_stale).count();
        self.event_tx.send_event(ExecutionEvent::dispatch_started(
            jobs.len(),
            stale,
            self.config.workers,
        ));
        tracing::info!(
            "Dispatching {} jobs ({} stale) on {} worker(s)",
            jobs.len(),
            stale,
            self.config.workers
        );

        let outcomes = if self.config.is_pooled() {
            self.dispatch_pooled(jobs).await
        } else {
            self.dispatch_sequential(jobs).await
        };

        self.event_tx.send_event(ExecutionEvent::DispatchCompleted {
            success: outcomes.iter().all(JobOutcome::success),
            duration: start.elapsed(),
        });

        outcomes
    }

    async fn dispatch_sequential(&self, jobs: Vec<JobDescriptor>) -> Vec<JobOutcome> {
        let mut outcomes = Vec::with_capacity(jobs.len());

        for job in &jobs {
            if !job.is_stale {
                self.event_tx.send_event(ExecutionEvent::job_unchanged(&job.id));
                outcomes.push(JobOutcome::unchanged(&job.id));
                continue;
            }

            self.event_tx.send_event(ExecutionEvent::job_started(&job.id));
            let start = Instant::now();
            let request = job
                .request(self.config.verbose)
                .with_timeout(self.config.job_timeout);

            // Dropping the grading future kills its child process
            let success = match self.config.job_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, run_job(self.grader.as_ref(), &request)).await
                    {
                        Ok(success) => success,
                        Err(_) => {
                            self.event_tx.send_event(ExecutionEvent::warning(
                                format!("timed out after {}s", limit.as_secs_f64()),
                                Some(job.id.clone()),
                            ));
                            false
                        }
                    }
                }
                None => run_job(self.grader.as_ref(), &request).await,
            };

            let duration = start.elapsed();
            self.event_tx.send_event(ExecutionEvent::job_completed(
                &job.id, success, duration, None,
            ));
            outcomes.push(JobOutcome::finished(&job.id, success, duration, None));
        }

        outcomes
    }

    async fn dispatch_pooled(&self, jobs: Vec<JobDescriptor>) -> Vec<JobOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut outcomes: Vec<Option<JobOutcome>> = vec![None; jobs.len()];
        let mut handles = Vec::new();

        for (index, job) in jobs.into_iter().enumerate() {
            if !job.is_stale {
                self.event_tx.send_event(ExecutionEvent::job_unchanged(&job.id));
                outcomes[index] = Some(JobOutcome::unchanged(&job.id));
                continue;
            }

            let Some(command) = self.worker_command.clone() else {
                self.event_tx.send_event(ExecutionEvent::error(
                    "no worker executable available",
                    Some(job.id.clone()),
                ));
                self.event_tx.send_event(ExecutionEvent::job_completed(
                    &job.id,
                    false,
                    Duration::ZERO,
                    None,
                ));
                outcomes[index] = Some(JobOutcome::finished(&job.id, false, Duration::ZERO, None));
                continue;
            };

            // Wait for a free slot before starting the next worker
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!("Worker pool closed: {}", e);
                    self.event_tx.send_event(ExecutionEvent::job_completed(
                        &job.id,
                        false,
                        Duration::ZERO,
                        None,
                    ));
                    outcomes[index] =
                        Some(JobOutcome::finished(&job.id, false, Duration::ZERO, None));
                    continue;
                }
            };

            self.event_tx.send_event(ExecutionEvent::job_started(&job.id));
            let tx = self.event_tx.clone();
            let verbose = self.config.verbose;
            let timeout = self.config.job_timeout;
            let id = job.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                run_worker(&command, &job, verbose, timeout, &tx).await
            });
            handles.push((index, id, handle));
        }

        for (index, id, handle) in handles {
            outcomes[index] = Some(match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Worker task for {} panicked: {}", id, e);
                    JobOutcome::finished(&id, false, Duration::ZERO, None)
                }
            });
        }

        outcomes.into_iter().flatten().collect()
    }
}

/// Extra time a worker gets past the job limit before it is killed
const WORKER_GRACE: Duration = Duration::from_secs(2);

/// Run one job in a worker process and wait for it to exit
async fn run_worker(
    command: &WorkerCommand,
    job: &JobDescriptor,
    verbose: bool,
    timeout: Option<Duration>,
    events: &Option<ProgressSender>,
) -> JobOutcome {
    let start = Instant::now();
    let request = job.request(verbose).with_timeout(timeout);

    let mut child = match command.command(&request).spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(
                "Failed to start worker {} for {}: {}",
                command.program().display(),
                job.id,
                e
            );
            events.send_event(ExecutionEvent::error(
                format!("failed to start worker: {}", e),
                Some(job.id.clone()),
            ));
            let duration = start.elapsed();
            events.send_event(ExecutionEvent::job_completed(&job.id, false, duration, None));
            return JobOutcome::finished(&job.id, false, duration, None);
        }
    };

    // The worker stops its own check at the limit; this only catches a
    // worker that hangs past it
    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit + WORKER_GRACE, child.wait()).await {
            Ok(status) => Some(status),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill worker for {}: {}", job.id, e);
                }
                events.send_event(ExecutionEvent::warning(
                    format!("timed out after {}s", limit.as_secs_f64()),
                    Some(job.id.clone()),
                ));
                None
            }
        },
        None => Some(child.wait().await),
    };

    // A worker killed by a signal has no exit code and counts as failed
    let (success, exit_code) = match status {
        Some(Ok(status)) => (status.success(), status.code()),
        Some(Err(e)) => {
            tracing::error!("Waiting on worker for {} failed: {}", job.id, e);
            (false, None)
        }
        None => (false, None),
    };

    let duration = start.elapsed();
    events.send_event(ExecutionEvent::job_completed(
        &job.id, success, duration, exit_code,
    ));
    JobOutcome::finished(&job.id, success, duration, exit_code)
}
