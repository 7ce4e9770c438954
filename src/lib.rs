//! docmark - Convert legacy Word documents into JSON paragraph records
//!
//! Every non-empty paragraph of a `.doc` file becomes a record holding its
//! 1-based position and an HTML fragment. Superscript, subscript, underline
//! and italic runs are wrapped in `<sup>`, `<sub>`, `<u>` and `<i>`; manual
//! line breaks become `<br>`; inline pictures become downscaled PNG data-URI
//! `<img>` tags.
//!
//! # Features
//!
//! - **OLE2 Parser**: Read compound files and their streams
//! - **DOC Reader**: Piece table, character formatting and inline pictures
//!   of Word 97+ binary documents
//! - **Host abstraction**: The conversion runs against the [`host::Document`]
//!   capability trait, so any document backend can drive it
//! - **Batch runs**: Folder scanning, confirmation and JSON output
//!
//! # Example - Converting a folder
//!
//! ```no_run
//! use docmark::batch::{self, AssumeYes, BatchConfig};
//! use docmark::host::native::NativeHost;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BatchConfig::new("documents");
//! batch::run(&config, &mut AssumeYes, || Ok(NativeHost::new()))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Converting an in-memory document
//!
//! ```
//! use docmark::convert::{ConvertOptions, convert_document};
//! use docmark::host::CharFormat;
//! use docmark::host::memory::MemoryDocument;
//!
//! let mut doc = MemoryDocument::new()
//!     .with_text("E = mc", CharFormat::empty())
//!     .with_text("2", CharFormat::SUPERSCRIPT)
//!     .with_text("\r", CharFormat::empty());
//! let records = convert_document(&mut doc, &ConvertOptions::default()).unwrap();
//! assert_eq!(records[0].html, "E = mc<sup>2</sup>");
//! ```
//!
//! # Example - Reading DOC text
//!
//! ```no_run
//! use docmark::ole::doc::Package;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pkg = Package::open("document.doc")?;
//! let doc = pkg.document()?;
//! println!("{}", doc.text());
//! # Ok(())
//! # }
//! ```

/// Shared error type and binary helpers
pub mod common;

/// OLE2 compound file reader and the `.doc` parser built on it
pub mod ole;

/// Picture payload extraction and inline image rendering
pub mod images;

/// Document capability traits and their implementations
pub mod host;

/// Paragraph to HTML record conversion
pub mod convert;

pub mod batch;

pub use common::{Error, Result};
pub use convert::{ConvertOptions, Record};
