// Decoded response payloads.
// Materializes a response body in the representation the caller asked for.

use std::io::Cursor;
use std::path::PathBuf;

use serde::de::DeserializeOwned;

use crate::error::{FetchError, Result};

use super::request::Representation;

/// A response body materialized as one representation.
#[derive(Debug)]
pub enum Payload {
    /// Parsed JSON, key insertion order preserved.
    Json(serde_json::Value),
    Text(String),
    /// Raw bytes as a seekable in-memory stream.
    Bytes(Cursor<Vec<u8>>),
    /// Path of the cached body on disk.
    Filename(PathBuf),
}

impl Payload {
    /// Decode raw bytes into an in-memory representation.
    ///
    /// `Filename` has no in-memory form; it is served by the cache.
    pub fn decode(body: &[u8], representation: Representation) -> Result<Self> {
        match representation {
            Representation::Json => Ok(Payload::Json(serde_json::from_slice(body)?)),
            Representation::Text => Ok(Payload::Text(String::from_utf8_lossy(body).into_owned())),
            Representation::Bytes => Ok(Payload::Bytes(Cursor::new(body.to_vec()))),
            Representation::Filename => Err(FetchError::Other(
                "filename payloads are materialized by the cache".to_string(),
            )),
        }
    }

    pub fn representation(&self) -> Representation {
        match self {
            Payload::Json(_) => Representation::Json,
            Payload::Text(_) => Representation::Text,
            Payload::Bytes(_) => Representation::Bytes,
            Payload::Filename(_) => Representation::Filename,
        }
    }

    pub fn into_json(self) -> Result<serde_json::Value> {
        match self {
            Payload::Json(value) => Ok(value),
            other => Err(mismatch(Representation::Json, other.representation())),
        }
    }

    /// Deserialize a JSON payload into a typed value.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.into_json()?)?)
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            Payload::Text(text) => Ok(text),
            other => Err(mismatch(Representation::Text, other.representation())),
        }
    }

    pub fn into_bytes(self) -> Result<Cursor<Vec<u8>>> {
        match self {
            Payload::Bytes(cursor) => Ok(cursor),
            other => Err(mismatch(Representation::Bytes, other.representation())),
        }
    }

    pub fn into_path(self) -> Result<PathBuf> {
        match self {
            Payload::Filename(path) => Ok(path),
            other => Err(mismatch(Representation::Filename, other.representation())),
        }
    }
}

fn mismatch(wanted: Representation, got: Representation) -> FetchError {
    FetchError::Other(format!("expected a {} payload, got {}", wanted, got))
}
