// Result Aggregation
// Folds per-job results into a build summary and a process exit code

use crate::execution::dispatcher::{JobOutcome, JobStatus};

/// Every job passed or was unchanged
pub const EXIT_SUCCESS: i32 = 0;
/// At least one job failed
pub const EXIT_FAILURE: i32 = 1;
/// The build could not be set up (bad index, missing metadata, ...)
pub const EXIT_SETUP_ERROR: i32 = 2;

/// Exit code for a set of per-job successes. An empty set succeeds.
pub fn aggregate<I>(results: I) -> i32
where
    I: IntoIterator<Item = bool>,
{
    if results.into_iter().all(|success| success) {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Counts of job outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub total: usize,
    pub unchanged: usize,
    pub passed: usize,
    pub failed: usize,
}

impl BuildSummary {
    pub fn from_outcomes(outcomes: &[JobOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome.status {
                JobStatus::Unchanged => summary.unchanged += 1,
                JobStatus::Passed => summary.passed += 1,
                JobStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}
