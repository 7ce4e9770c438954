//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from the
//! binary-format error types to the unified Error type.

use super::types::Error;
use crate::ole::OleError;
use crate::ole::doc::DocError;

impl From<OleError> for Error {
    fn from(err: OleError) -> Self {
        match err {
            OleError::Io(e) => Error::Io(e),
            OleError::InvalidFormat(s) => Error::InvalidFormat(s),
            OleError::InvalidData(s) => Error::InvalidFormat(s),
            OleError::NotOleFile => Error::InvalidFormat("Not an OLE file".to_string()),
            OleError::CorruptedFile(s) => Error::CorruptedFile(s),
            OleError::StreamNotFound => Error::ComponentNotFound("Stream not found".to_string()),
        }
    }
}

impl From<DocError> for Error {
    fn from(err: DocError) -> Self {
        match err {
            DocError::Io(e) => Error::Io(e),
            DocError::Ole(ole_err) => Error::from(ole_err),
            DocError::InvalidFormat(s) => Error::InvalidFormat(s),
            DocError::StreamNotFound(s) => Error::ComponentNotFound(s),
            DocError::Corrupted(s) => Error::CorruptedFile(s),
        }
    }
}
