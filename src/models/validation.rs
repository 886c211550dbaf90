use serde_json::Value;
use thiserror::Error;

use crate::models::record::{Record, ResourceKind};

/// Why a string cannot be used as a document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier contains whitespace")]
    Whitespace,
    #[error("identifier starts with '!'")]
    Reserved,
    #[error("identifier is {0} bytes long, the limit is {max}", max = MAX_ID_BYTES)]
    TooLong(usize),
}

/// Longest accepted identifier, in UTF-8 bytes. Meilisearch caps document
/// ids at 511 bytes and keys are stored hex-encoded.
pub const MAX_ID_BYTES: usize = 255;

/// Why a JSON value is not a valid record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has {0} fields, expected 4")]
    WrongFieldCount(usize),
    #[error("record is missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{0}' is not a string")]
    NotAString(&'static str),
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

/// Check that `id` can be used as a document key.
///
/// The search service rejects keys that are empty, contain whitespace,
/// begin with `!` or exceed [`MAX_ID_BYTES`].
pub fn validate_id(id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    if id.len() > MAX_ID_BYTES {
        return Err(IdError::TooLong(id.len()));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(IdError::Whitespace);
    }
    if id.starts_with('!') {
        return Err(IdError::Reserved);
    }
    Ok(())
}

pub fn is_valid_id(id: &str) -> bool {
    validate_id(id).is_ok()
}

pub fn is_valid_record(kind: ResourceKind, value: &Value) -> bool {
    Record::from_json(kind, value).is_ok()
}
