// Index Builder
// Loads or infers the corpus index and resolves every exercise into a summary

use crate::document::read_document;
use crate::error::{BuildError, BuildResult};
use crate::grading::Grader;
use crate::index::models::{
    validate_id, ExerciseGroup, ExerciseIndex, ExerciseMeta, ExerciseSummary, Index,
};

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Declarative index file at the corpus root
pub const INDEX_FILE: &str = "index.json";

/// Metadata file inside each exercise directory
pub const METADATA_FILE: &str = "meta.json";

/// Where the index of a build came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Read from the corpus's index.json
    Declared,
    /// Inferred from the exercise directories
    Inferred,
}

/// Result of building the index
#[derive(Debug, Clone)]
pub struct BuiltIndex {
    /// The structural index
    pub index: Index,
    /// Where the structural index came from
    pub origin: IndexOrigin,
    /// The index to publish
    pub exercise_index: ExerciseIndex,
    /// Every exercise id in traversal order, including repeated references
    pub exercise_ids: Vec<String>,
}

/// Builds the exercise index of a corpus
pub struct IndexBuilder<'a> {
    corpus_root: PathBuf,
    grader: &'a dyn Grader,
}

/// State carried through one traversal
#[derive(Default)]
struct Traversal {
    ids: Vec<String>,
    summaries: HashMap<String, ExerciseSummary>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(corpus_root: impl Into<PathBuf>, grader: &'a dyn Grader) -> Self {
        Self {
            corpus_root: corpus_root.into(),
            grader,
        }
    }

    pub fn corpus_root(&self) -> &Path {
        &self.corpus_root
    }

    /// Read the declarative index, or infer one from the exercise directories
    pub fn load_index(&self) -> BuildResult<(Index, IndexOrigin)> {
        let index_path = self.corpus_root.join(INDEX_FILE);

        match read_document::<Index>(&index_path) {
            Ok(index) => Ok((index, IndexOrigin::Declared)),
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "{} not found, inferring the index from exercise directories",
                    index_path.display()
                );
                let ids = scan_exercises(&self.corpus_root)?;
                Ok((Index::Exercises(ids), IndexOrigin::Inferred))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load the index and resolve every exercise it references
    pub fn build(&self) -> BuildResult<BuiltIndex> {
        let (index, origin) = self.load_index()?;

        let mut traversal = Traversal::default();
        let exercise_index = self.build_node(&index, &mut traversal)?;

        if traversal.ids.is_empty() {
            return Err(BuildError::EmptyCorpus(self.corpus_root.clone()));
        }

        tracing::info!(
            "Indexed {} exercises ({} references)",
            traversal.summaries.len(),
            traversal.ids.len()
        );

        Ok(BuiltIndex {
            index,
            origin,
            exercise_index,
            exercise_ids: traversal.ids,
        })
    }

    fn build_node(&self, index: &Index, traversal: &mut Traversal) -> BuildResult<ExerciseIndex> {
        match index {
            Index::Exercises(ids) => {
                let mut summaries = IndexMap::new();
                for id in ids {
                    let summary = self.summarize(id, traversal)?;
                    summaries.insert(id.clone(), summary);
                    traversal.ids.push(id.clone());
                }
                Ok(ExerciseIndex::Exercises(summaries))
            }
            Index::Groups(groups) => {
                let mut built = IndexMap::new();
                for (id, group) in groups {
                    let contents = self.build_node(&group.contents, traversal)?;
                    built.insert(
                        id.clone(),
                        ExerciseGroup {
                            title: group.title.clone(),
                            contents,
                        },
                    );
                }
                Ok(ExerciseIndex::Groups(built))
            }
        }
    }

    fn summarize(&self, id: &str, traversal: &mut Traversal) -> BuildResult<ExerciseSummary> {
        if let Some(summary) = traversal.summaries.get(id) {
            return Ok(summary.clone());
        }

        let exercise_dir = self.corpus_root.join(id);
        let meta_path = exercise_dir.join(METADATA_FILE);
        let meta = match read_document::<ExerciseMeta>(&meta_path) {
            Ok(meta) => meta,
            Err(e) if e.is_not_found() => {
                return Err(BuildError::MissingMetadata {
                    id: id.to_string(),
                    path: meta_path,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let description =
            self.grader
                .describe(&exercise_dir)
                .map_err(|source| BuildError::Definition {
                    id: id.to_string(),
                    source,
                })?;

        let summary = ExerciseSummary::new(&meta, description.title)
            .with_short_description(description.short_description);
        traversal.summaries.insert(id.to_string(), summary.clone());

        Ok(summary)
    }
}

/// List the immediate subdirectories of `corpus_root` that hold a metadata
/// file, sorted by name
pub fn scan_exercises(corpus_root: &Path) -> BuildResult<Vec<String>> {
    let entries =
        fs::read_dir(corpus_root).map_err(|_| BuildError::CorpusNotFound(corpus_root.into()))?;

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| BuildError::Io {
            path: corpus_root.display().to_string(),
            source,
        })?;

        let path = entry.path();
        if !path.is_dir() || !path.join(METADATA_FILE).is_file() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) if validate_id(&name).is_ok() => ids.push(name),
            _ => tracing::warn!("Skipping exercise directory {}", path.display()),
        }
    }

    if ids.is_empty() {
        return Err(BuildError::CorpusNotFound(corpus_root.into()));
    }

    ids.sort();
    Ok(ids)
}
