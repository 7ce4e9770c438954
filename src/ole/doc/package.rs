/// Package implementation for legacy Word documents (.doc).
use super::super::{OleError, OleFile};
use super::document::Document;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;

/// Error types for DOC file parsing.
#[derive(Debug)]
pub enum DocError {
    /// IO error
    Io(io::Error),
    /// OLE file error
    Ole(OleError),
    /// Invalid DOC format
    InvalidFormat(String),
    /// Stream not found
    StreamNotFound(String),
    /// Corrupted file
    Corrupted(String),
}

impl From<io::Error> for DocError {
    fn from(err: io::Error) -> Self {
        DocError::Io(err)
    }
}

impl From<OleError> for DocError {
    fn from(err: OleError) -> Self {
        DocError::Ole(err)
    }
}

impl std::fmt::Display for DocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocError::Io(e) => write!(f, "IO error: {}", e),
            DocError::Ole(e) => write!(f, "OLE error: {}", e),
            DocError::InvalidFormat(s) => write!(f, "Invalid format: {}", s),
            DocError::StreamNotFound(s) => write!(f, "Stream not found: {}", s),
            DocError::Corrupted(s) => write!(f, "Corrupted file: {}", s),
        }
    }
}

impl std::error::Error for DocError {}

/// Result type for DOC operations.
pub type Result<T> = std::result::Result<T, DocError>;

/// A Word (.doc) package.
///
/// Wraps the OLE container and loads the main document story from it.
///
/// # Examples
///
/// ```rust,no_run
/// use docmark::ole::doc::Package;
///
/// let mut pkg = Package::open("document.doc")?;
/// let doc = pkg.document()?;
/// println!("{}", doc.text());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Package<R: Read + Seek = File> {
    ole: OleFile<R>,
}

impl Package<File> {
    /// Open a .doc package from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Package::from_reader(file)
    }
}

impl<R: Read + Seek> Package<R> {
    /// Create a Package from any reader that implements Read + Seek.
    pub fn from_reader(reader: R) -> Result<Self> {
        let ole = OleFile::open(reader)?;

        if !ole.exists(&["WordDocument"]) {
            return Err(DocError::InvalidFormat(
                "Not a valid Word document: WordDocument stream not found".to_string(),
            ));
        }

        Ok(Self { ole })
    }

    /// Load the main document story.
    pub fn document(&mut self) -> Result<Document> {
        let word_document = self
            .ole
            .open_stream(&["WordDocument"])
            .map_err(|_| DocError::StreamNotFound("WordDocument".to_string()))?;

        // The FIB names the table stream; parse it up front to pick the right one
        let table_name = super::parts::fib::FileInformationBlock::parse(&word_document)?.table_stream_name();
        let table_stream = self
            .ole
            .open_stream(&[table_name])
            .map_err(|_| DocError::StreamNotFound(table_name.to_string()))?;

        // Documents without pictures have no Data stream
        let data_stream = if self.ole.exists(&["Data"]) {
            self.ole.open_stream(&["Data"])?
        } else {
            Vec::new()
        };

        Document::parse(&word_document, &table_stream, data_stream)
    }
}
