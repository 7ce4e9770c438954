//! Main error type for docmark operations.
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for docmark operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input folder does not exist or is not a directory
    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    /// Input document does not exist or is not a regular file
    #[error("File not found or is not a file: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Input document does not carry the `.doc` extension
    #[error("Not a .doc file: {}", .0.display())]
    NotDocFile(PathBuf),

    /// Invalid file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Corrupted or malformed file
    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    /// Stream or part not found
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    /// A text range does not fit the document it was used with
    #[error("Invalid range {start}..{end} for document of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// Paragraph index outside `1..=count`
    #[error("Paragraph {index} out of range (document has {count})")]
    ParagraphOutOfRange { index: usize, count: usize },

    /// Inline image could not be decoded or encoded
    #[error("Image error: {0}")]
    Image(#[from] crate::images::ImageError),

    /// JSON serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by the document host
    #[error("Host error: {0}")]
    Host(String),
}

/// Result type for docmark operations.
pub type Result<T> = std::result::Result<T, Error>;
