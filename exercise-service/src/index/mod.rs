// Index Module
// Exercise index data model and the builder that resolves it against a corpus

pub mod builder;
pub mod models;

// Re-export key types
pub use builder::{
    scan_exercises, BuiltIndex, IndexBuilder, IndexOrigin, INDEX_FILE, METADATA_FILE,
};
pub use models::{
    ExerciseGroup, ExerciseIndex, ExerciseKind, ExerciseMeta, ExerciseSummary, Group, Index,
};
