//! Unified error types for docmark.
//!
//! Parser layers keep their own error enums (`OleError`, `DocError`,
//! `ImageError`); everything surfaces to callers as [`Error`].

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
