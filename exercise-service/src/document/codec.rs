// Document Codec
// Versioned JSON envelopes for every document the service reads or writes

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Schema version stamped on every document
pub const SCHEMA_VERSION: u32 = 1;

/// Errors raised when a document does not match the expected schema
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("document is not valid JSON: {0}")]
    Syntax(String),

    #[error("document is missing the schema version marker")]
    MissingVersion,

    #[error("unsupported schema version {found} (expected {expected})")]
    VersionMismatch { found: String, expected: u32 },

    #[error("document shape does not match the {kind} schema: {message}")]
    Shape { kind: &'static str, message: String },
}

/// Errors that can occur when reading or writing a document file
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid document {path}: {source}")]
    Schema {
        path: String,
        #[source]
        source: SchemaError,
    },
}

impl DocumentError {
    /// The schema error behind this failure, if any
    pub fn schema_error(&self) -> Option<&SchemaError> {
        match self {
            DocumentError::Schema { source, .. } => Some(source),
            DocumentError::Io { .. } => None,
        }
    }

    /// Whether the file simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// A typed value that can be stored as a versioned document
pub trait Document: Serialize + DeserializeOwned {
    /// Schema name used in diagnostics
    const KIND: &'static str;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope<T> {
    #[allow(dead_code)]
    version: IgnoredAny,
    data: T,
}

/// Encode a value into its enveloped document tree.
///
/// The payload is always nested under `data`, so the top level of the
/// document is an object even when the payload is a bare scalar.
pub fn encode<T: Document>(value: &T) -> Result<Value, SchemaError> {
    serde_json::to_value(EnvelopeRef {
        version: SCHEMA_VERSION,
        data: value,
    })
    .map_err(shape_error::<T>)
}

/// Decode an enveloped document tree into a typed value
pub fn decode<T: Document>(document: Value) -> Result<T, SchemaError> {
    check_version(&document)?;
    let envelope: Envelope<T> = serde_json::from_value(document).map_err(shape_error::<T>)?;
    Ok(envelope.data)
}

/// Decode a document from raw bytes.
///
/// The payload is deserialized straight from the bytes rather than from an
/// intermediate tree, so duplicate object keys are still visible to it.
pub fn decode_slice<T: Document>(bytes: &[u8]) -> Result<T, SchemaError> {
    let document: Value =
        serde_json::from_slice(bytes).map_err(|e| SchemaError::Syntax(e.to_string()))?;
    check_version(&document)?;
    let envelope: Envelope<T> = serde_json::from_slice(bytes).map_err(shape_error::<T>)?;
    Ok(envelope.data)
}

fn check_version(document: &Value) -> Result<(), SchemaError> {
    match document.get("version") {
        None | Some(Value::Null) => Err(SchemaError::MissingVersion),
        // Only the bare integer counts; "1" and 1.0 are other versions
        Some(Value::Number(n)) if n.as_u64() == Some(SCHEMA_VERSION as u64) => Ok(()),
        Some(found) => Err(SchemaError::VersionMismatch {
            found: found.to_string(),
            expected: SCHEMA_VERSION,
        }),
    }
}

fn shape_error<T: Document>(err: serde_json::Error) -> SchemaError {
    SchemaError::Shape {
        kind: T::KIND,
        message: err.to_string(),
    }
}

/// Encode a document to pretty-printed bytes
pub fn encode_vec<T: Document>(value: &T) -> Result<Vec<u8>, SchemaError> {
    let document = encode(value)?;
    let mut bytes = serde_json::to_vec_pretty(&document).map_err(shape_error::<T>)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Read and decode a document file
pub fn read_document<T: Document>(path: impl AsRef<Path>) -> Result<T, DocumentError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    })?;

    decode_slice(&bytes).map_err(|source| DocumentError::Schema {
        path: path.display().to_string(),
        source,
    })
}

/// Encode and write a document file.
///
/// The document is written to a sibling temporary file and renamed into
/// place, so readers see either the old document or the complete new one.
pub fn write_document<T: Document>(path: impl AsRef<Path>, value: &T) -> Result<(), DocumentError> {
    let path = path.as_ref();
    let io_error = |source| DocumentError::Io {
        path: path.display().to_string(),
        source,
    };

    let bytes = encode_vec(value).map_err(|source| DocumentError::Schema {
        path: path.display().to_string(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, bytes).map_err(io_error)?;
    fs::rename(&tmp_path, path).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    impl Document for Sample {
        const KIND: &'static str = "sample";
    }

    impl Document for f64 {
        const KIND: &'static str = "number";
    }

    #[test]
    fn test_encode_wraps_payload() {
        let doc = encode(&Sample {
            name: "a".to_string(),
            count: 2,
        })
        .unwrap();

        assert_eq!(doc, json!({"version": 1, "data": {"name": "a", "count": 2}}));
    }

    #[test]
    fn test_scalar_is_never_top_level() {
        let doc = encode(&2.5f64).unwrap();
        assert!(doc.is_object());
        assert_eq!(decode::<f64>(doc).unwrap(), 2.5);
    }

    #[test]
    fn test_decode_missing_version() {
        let err = decode::<Sample>(json!({"data": {"name": "a", "count": 1}})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingVersion));
    }

    #[test]
    fn test_decode_bare_payload_rejected() {
        let err = decode::<Sample>(json!({"name": "a", "count": 1})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingVersion));

        let err = decode::<Sample>(json!({"version": 1, "name": "a", "count": 1})).unwrap_err();
        assert!(matches!(err, SchemaError::Shape { .. }));

        let err = decode::<f64>(json!(3.0)).unwrap_err();
        assert!(matches!(err, SchemaError::MissingVersion));
    }

    #[test]
    fn test_decode_wrong_version() {
        let err = decode::<Sample>(json!({"version": 7, "data": {"name": "a", "count": 1}}))
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::VersionMismatch {
                expected: 1,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "unsupported schema version 7 (expected 1)"
        );
    }

    #[test]
    fn test_decode_version_must_be_integer() {
        let payload = json!({"name": "a", "count": 1});

        let err = decode::<Sample>(json!({"version": "1", "data": payload.clone()})).unwrap_err();
        match err {
            SchemaError::VersionMismatch { found, .. } => assert_eq!(found, "\"1\""),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = decode::<Sample>(json!({"version": 1.0, "data": payload})).unwrap_err();
        match err {
            SchemaError::VersionMismatch { found, .. } => assert_eq!(found, "1.0"),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = decode_slice::<Sample>(br#"{"version": true, "data": {"name": "a", "count": 1}}"#)
            .unwrap_err();
        assert!(matches!(err, SchemaError::VersionMismatch { .. }));
        assert!(err.to_string().contains("true"));
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let err = decode::<Sample>(json!({"version": 1, "data": {"name": 5}})).unwrap_err();
        assert!(matches!(err, SchemaError::Shape { kind: "sample", .. }));
    }

    #[test]
    fn test_decode_syntax_error() {
        let err = decode_slice::<Sample>(b"{\"version\": 1, ").unwrap_err();
        assert!(matches!(err, SchemaError::Syntax(_)));
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sample.json");
        let sample = Sample {
            name: "x".to_string(),
            count: 9,
        };

        write_document(&path, &sample).unwrap();
        assert!(!dir.path().join("nested").join("sample.json.tmp").exists());
        assert_eq!(read_document::<Sample>(&path).unwrap(), sample);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document::<Sample>(dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.schema_error().is_none());
    }
}
