use std::{fmt, io};

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

/// Longest slice of an offending input line carried inside an error.
const MAX_LINE_IN_ERROR: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum BookError {
    #[error("Book configuration error: {0}")]
    Config(String),
    #[error("Inconsistent root node with initialization: {0}")]
    InconsistentRoot(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Could not parse as BookHash: {0}")]
    MalformedHash(String),
    #[error("Could not parse location: {0}")]
    MalformedLoc(String),
    #[error("Could not find expected key '{field}'. Furthest line read was:\n{line}")]
    MissingField { field: String, line: String },
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Unsupported book version: {0}")]
    UnsupportedVersion(u32),
}

impl BookError {
    pub fn missing_field(field: &str, line: &str) -> BookError {
        BookError::MissingField {
            field: field.to_string(),
            line: truncate_line(line),
        }
    }

    /// Attach the offending line to a load failure that did not already carry it.
    pub fn with_line(self, line: &str) -> BookError {
        match self {
            BookError::MissingField { .. } => self,
            BookError::Serialization(msg) => {
                BookError::Serialization(format!("{msg}\nFurthest line read was:\n{}", truncate_line(line)))
            }
            BookError::MalformedHash(msg) => {
                BookError::MalformedHash(format!("{msg}\nFurthest line read was:\n{}", truncate_line(line)))
            }
            BookError::MalformedLoc(msg) => {
                BookError::MalformedLoc(format!("{msg}\nFurthest line read was:\n{}", truncate_line(line)))
            }
            other => other,
        }
    }
}

fn truncate_line(line: &str) -> String {
    match line.char_indices().nth(MAX_LINE_IN_ERROR) {
        Some((idx, _)) => line[..idx].to_string(),
        None => line.to_string(),
    }
}

impl From<toml::de::Error> for BookError {
    fn from(src: toml::de::Error) -> BookError {
        BookError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for BookError {
    fn from(src: toml::ser::Error) -> BookError {
        BookError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for BookError {
    fn from(src: JsonError) -> BookError {
        BookError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<hex::FromHexError> for BookError {
    fn from(src: hex::FromHexError) -> BookError {
        BookError::MalformedHash(format!("{src}"))
    }
}

impl From<io::Error> for BookError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => BookError::NotFound(format!("{x}")),
            _ => BookError::Io(format!("IOError: {} ({x})", x.kind())),
        }
    }
}

impl From<fmt::Error> for BookError {
    fn from(x: fmt::Error) -> Self {
        BookError::Serialization(format!("{x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_missing_field_truncates_line() {
        let long = "x".repeat(MAX_LINE_IN_ERROR + 50);
        match BookError::missing_field("hash", &long) {
            BookError::MissingField { field, line } => {
                assert_eq!(field, "hash");
                assert_eq!(line.len(), MAX_LINE_IN_ERROR);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: BookError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, BookError::NotFound(_)));
    }
}
