/// Word (.doc) document support.
///
/// Parses the main story of Microsoft Word documents in the legacy binary
/// format (Word 97 and later), which uses OLE2 structured storage.
///
/// # DOC File Structure
///
/// A .doc file is an OLE2 structured storage containing several streams:
/// - **WordDocument**: Main document stream containing the FIB and text
/// - **1Table** or **0Table**: Contains formatting and structure information
/// - **Data**: Contains embedded pictures
///
/// # Example
///
/// ```rust,no_run
/// use docmark::ole::doc::Package;
///
/// let mut package = Package::open("document.doc")?;
/// let doc = package.document()?;
///
/// for ch in doc.chars() {
///     if ch.properties.is_italic {
///         print!("{}", ch.ch);
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod document;
pub mod package;
pub mod parts;
pub mod picture;

#[cfg(test)]
pub(crate) mod test_support;

pub use document::{DocChar, Document};
pub use package::{DocError, Package};
