// Staleness Detection
// Decides whether an exercise's cached report is older than its sources

use std::fs;
use std::io;
use std::path::Path;

/// Whether the exercise in `exercise_dir` must be graded again.
///
/// The exercise is stale when `output_path` is missing or when any file
/// directly inside `exercise_dir` was modified at or after the output.
/// Subdirectories are not inspected. Probing errors count as stale.
pub fn is_stale(exercise_dir: &Path, output_path: &Path) -> bool {
    match sources_older_than_output(exercise_dir, output_path) {
        Ok(fresh) => !fresh,
        Err(e) => {
            tracing::debug!("Treating {} as stale: {}", exercise_dir.display(), e);
            true
        }
    }
}

fn sources_older_than_output(exercise_dir: &Path, output_path: &Path) -> io::Result<bool> {
    let output_mtime = fs::metadata(output_path)?.modified()?;

    for entry in fs::read_dir(exercise_dir)? {
        let entry = entry?;
        let metadata = fs::metadata(entry.path())?;
        if !metadata.is_file() {
            continue;
        }
        // Equal timestamps count as changed
        if metadata.modified()? >= output_mtime {
            return Ok(false);
        }
    }

    Ok(true)
}
