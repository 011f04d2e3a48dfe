// Grade Report
// Report document written for every graded exercise

use crate::document::Document;

use serde::{Deserialize, Serialize};

/// Result of grading one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    /// Exercise title
    pub title: String,
    /// Whether every check passed
    pub success: bool,
    /// Exit code of the check command (None if killed or never started)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Whether the check ran past its time limit
    #[serde(default)]
    pub timed_out: bool,
    /// Wall-clock duration of the check, in milliseconds
    pub duration_ms: u64,
    /// Captured standard output
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error
    #[serde(default)]
    pub stderr: String,
}

impl Document for GradeReport {
    const KIND: &'static str = "grade report";
}
