// Document Module
// Versioned document encoding shared by the index, metadata and report artifacts

pub mod codec;

// Re-export key types
pub use codec::{
    decode, decode_slice, encode, encode_vec, read_document, write_document, Document,
    DocumentError, SchemaError, SCHEMA_VERSION,
};
