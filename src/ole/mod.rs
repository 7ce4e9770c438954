/// Constants for OLE file format
pub mod consts;

/// Main OLE file parsing implementation
mod file;

/// Single Property Modifier (SPRM) parsing
pub mod sprm;

/// Legacy Word document (.doc) reader
///
/// This module provides functionality to parse Microsoft Word documents
/// in the legacy binary format (.doc files), which are OLE2-based files.
pub mod doc;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export public types for convenient access
pub use file::{DirectoryEntry, OleError, OleFile, is_ole_file};
