// Service Errors
// Fatal errors raised while building the index, before any job runs

use crate::document::{DocumentError, SchemaError};
use crate::grading::GraderError;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a build before dispatch
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid document {path}: {source}")]
    Schema {
        path: String,
        #[source]
        source: SchemaError,
    },

    #[error("exercise `{id}` has no metadata at {}", .path.display())]
    MissingMetadata { id: String, path: PathBuf },

    #[error("no index.json and no exercise directories found in {}", .0.display())]
    CorpusNotFound(PathBuf),

    #[error("the corpus at {} contains no exercises", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("failed to read the definition of exercise `{id}`: {source}")]
    Definition {
        id: String,
        #[source]
        source: GraderError,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl From<DocumentError> for BuildError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Io { path, source } => BuildError::Io { path, source },
            DocumentError::Schema { path, source } => BuildError::Schema { path, source },
        }
    }
}

pub type BuildResult<T> = Result<T, BuildError>;
