// Job Descriptors
// Turns the flattened exercise set into one self-contained grading job per exercise

use crate::grading::GradeRequest;
use crate::staleness::is_stale;

use std::path::{Path, PathBuf};

/// File name of the report inside an exercise's output directory
pub const REPORT_FILE: &str = "report.json";

/// One grading job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Exercise id
    pub id: String,
    /// Exercise sources
    pub source_dir: PathBuf,
    /// Report location, `<dest>/<id>/report.json`
    pub output_path: PathBuf,
    /// Whether the exercise must be graded
    pub is_stale: bool,
    /// `<dump outputs root>/<id>`, if configured
    pub dump_outputs_dir: Option<PathBuf>,
    /// `<dump reports root>/<id>`, if configured
    pub dump_reports_dir: Option<PathBuf>,
}

impl JobDescriptor {
    /// The grading request for this job
    pub fn request(&self, verbose: bool) -> GradeRequest {
        GradeRequest::new(&self.source_dir, &self.output_path)
            .with_dump_outputs(self.dump_outputs_dir.clone())
            .with_dump_reports(self.dump_reports_dir.clone())
            .with_verbose(verbose)
    }
}

/// Where the report of exercise `id` lives under `dest_root`
pub fn output_path(dest_root: &Path, id: &str) -> PathBuf {
    dest_root.join(id).join(REPORT_FILE)
}

/// Roots used to place each job's files
#[derive(Debug, Clone, Default)]
pub struct JobLayout {
    pub corpus_root: PathBuf,
    pub dest_root: PathBuf,
    pub dump_outputs_root: Option<PathBuf>,
    pub dump_reports_root: Option<PathBuf>,
    /// Treat every exercise as stale
    pub force: bool,
}

/// Sorted, deduplicated exercise ids
pub fn unique_ids(ids: &[String]) -> Vec<String> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();
    ids
}

/// Build one descriptor per unique exercise id, in sorted order
pub fn assemble(ids: &[String], layout: &JobLayout) -> Vec<JobDescriptor> {
    unique_ids(ids)
        .into_iter()
        .map(|id| {
            let source_dir = layout.corpus_root.join(&id);
            let output_path = output_path(&layout.dest_root, &id);
            let is_stale = layout.force || is_stale(&source_dir, &output_path);

            JobDescriptor {
                dump_outputs_dir: layout.dump_outputs_root.as_ref().map(|root| root.join(&id)),
                dump_reports_dir: layout.dump_reports_root.as_ref().map(|root| root.join(&id)),
                id,
                source_dir,
                output_path,
                is_stale,
            }
        })
        .collect()
}
