use std::fmt::Display;
use thiserror::Error;

/// Application error types for the gallery
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GalleryError {
    /// Missing title, missing file, malformed limit/offset
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Missing or rejected bearer token
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// Unknown artwork or project id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store unreachable, query failure or store timeout
    #[error("Storage error: {0}")]
    Storage(String),

    /// Blob store write failure or blob timeout
    #[error("Upload failed: {0}")]
    Upload(String),
}

impl GalleryError {
    /// Short machine-readable kind, used in logs and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            GalleryError::Validation(_) => "validation",
            GalleryError::Auth(_) => "auth",
            GalleryError::NotFound(_) => "not_found",
            GalleryError::Storage(_) => "storage",
            GalleryError::Upload(_) => "upload",
        }
    }

    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            GalleryError::Validation(msg)
            | GalleryError::Auth(msg)
            | GalleryError::NotFound(msg)
            | GalleryError::Storage(msg)
            | GalleryError::Upload(msg) => msg,
        }
    }
}

/// `map_err` adapter producing `Storage("<context>: <cause>")`.
pub(crate) fn storage<E: Display>(context: &'static str) -> impl FnOnce(E) -> GalleryError {
    move |e| GalleryError::Storage(format!("{}: {}", context, e))
}

/// `map_err` adapter producing `Upload("<context>: <cause>")`.
pub(crate) fn upload<E: Display>(context: &'static str) -> impl FnOnce(E) -> GalleryError {
    move |e| GalleryError::Upload(format!("{}: {}", context, e))
}
