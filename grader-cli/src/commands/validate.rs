use crate::output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::Result;

use exercise_service::{BuildConfig, ExerciseIndex, IndexOrigin, Orchestrator, EXIT_SUCCESS};

/// Check a corpus without grading it
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Root of the exercise corpus
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub corpus: PathBuf,

    /// Show the resolved index
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

pub fn execute(args: ValidateArgs) -> Result<i32> {
    output::status("Validating", &format!("{}", args.corpus.display()));

    let config = BuildConfig {
        corpus_root: args.corpus.clone(),
        ..Default::default()
    };
    let built = Orchestrator::new(config, Arc::new(super::grader())).validate()?;

    match built.origin {
        IndexOrigin::Declared => output::check("index.json is valid"),
        IndexOrigin::Inferred => {
            output::warning("No index.json, index inferred from exercise directories")
        }
    }

    let mut unique = built.exercise_ids.clone();
    unique.sort();
    unique.dedup();
    output::check(&format!(
        "{} exercises with valid metadata and definitions",
        unique.len()
    ));
    if unique.len() < built.exercise_ids.len() {
        output::info(&format!(
            "{} duplicate exercise references",
            built.exercise_ids.len() - unique.len()
        ));
    }

    if args.verbose {
        print_index(&built.exercise_index, 1);
    }

    output::success("Corpus is valid");
    Ok(EXIT_SUCCESS)
}

fn print_index(index: &ExerciseIndex, depth: usize) {
    let indent = "  ".repeat(depth);
    match index {
        ExerciseIndex::Exercises(exercises) => {
            for (id, summary) in exercises {
                println!(
                    "{}{} - {} ({:?}, {} stars)",
                    indent, id, summary.title, summary.kind, summary.stars
                );
            }
        }
        ExerciseIndex::Groups(groups) => {
            for (id, group) in groups {
                println!("{}{} - {}", indent, id, group.title);
                print_index(&group.contents, depth + 1);
            }
        }
    }
}
