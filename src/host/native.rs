//! Native `.doc` host.
//!
//! Reads Word 97+ binary documents without an external application and
//! materializes each one as a [`MemoryDocument`]: italic, underline and
//! vertical position become [`CharFormat`] bits, inline pictures become
//! image anchors carrying the picture bytes from the Data stream.
//!
//! Only direct character formatting is read: the CHPX runs of the
//! WordDocument stream. Formatting applied through a character or paragraph
//! style (`sprmCIstd` into the style sheet) or through a piece's property
//! modifier (`Pcd.prm`) is not resolved, so such text converts without tags.

use super::memory::MemoryDocument;
use super::{CharFormat, DocumentHost};
use crate::common::{Error, Result};
use crate::ole::doc::Package;
use crate::ole::doc::parts::chp::{CharacterProperties, VerticalPosition};
use std::path::Path;
use tracing::{debug, info};

/// Extension accepted by [`NativeHost::open`].
pub const DOC_EXTENSION: &str = "doc";

/// Host reading `.doc` files directly.
#[derive(Debug, Default)]
pub struct NativeHost {
    open_documents: usize,
}

impl NativeHost {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Whether `path` has exactly the `.doc` extension.
pub fn is_doc_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == DOC_EXTENSION)
}

fn char_format(properties: &CharacterProperties) -> CharFormat {
    let mut format = CharFormat::empty();
    match properties.vertical_position {
        VerticalPosition::Superscript => format |= CharFormat::SUPERSCRIPT,
        VerticalPosition::Subscript => format |= CharFormat::SUBSCRIPT,
        VerticalPosition::Normal => {},
    }
    format.set(CharFormat::UNDERLINE, properties.is_underline);
    format.set(CharFormat::ITALIC, properties.is_italic);
    format
}

/// Load a `.doc` file into a memory document.
pub fn load(path: &Path) -> Result<MemoryDocument> {
    let doc = Package::open(path)?.document()?;

    let mut memory = MemoryDocument::new();
    let mut pictures = 0;
    let mut buffer = [0u8; 4];
    for ch in doc.chars() {
        let format = char_format(&ch.properties);
        if ch.ch == super::memory::IMAGE_ANCHOR {
            memory.push_image(doc.picture(&ch.properties)?, format);
            pictures += 1;
        } else {
            memory.push_text(ch.ch.encode_utf8(&mut buffer), format);
        }
    }

    debug!(path = %path.display(), chars = memory.len(), pictures, "loaded document");
    Ok(memory)
}

impl DocumentHost for NativeHost {
    type Doc = MemoryDocument;

    fn open(&mut self, path: &Path) -> Result<MemoryDocument> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        if !is_doc_path(path) {
            return Err(Error::NotDocFile(path.to_path_buf()));
        }

        let document = load(path)?;
        self.open_documents += 1;
        Ok(document)
    }

    fn close(&mut self, document: MemoryDocument) -> Result<()> {
        // Nothing is written back
        drop(document);
        self.open_documents = self.open_documents.saturating_sub(1);
        Ok(())
    }

    fn quit(&mut self) -> Result<()> {
        info!(open_documents = self.open_documents, "document host released");
        self.open_documents = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Document, FormatAttr};
    use crate::ole::doc::test_support::{DocBuilder, ITALIC, SUBSCRIPT, UNDERLINE};

    #[test]
    fn test_is_doc_path() {
        assert!(is_doc_path(Path::new("a/b.doc")));
        assert!(!is_doc_path(Path::new("b.docx")));
        assert!(!is_doc_path(Path::new("b.DOC")));
        assert!(!is_doc_path(Path::new("doc")));
    }

    #[test]
    fn test_open_rejects_missing_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = NativeHost::new();

        let missing = dir.path().join("missing.doc");
        assert!(matches!(host.open(&missing), Err(Error::FileNotFound(_))));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "hello").unwrap();
        assert!(matches!(host.open(&text), Err(Error::NotDocFile(_))));

        assert!(matches!(host.open(dir.path()), Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_open_maps_formatting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.doc");
        let bytes = DocBuilder::new()
            .text("H", &[])
            .text("2", SUBSCRIPT)
            .text("O ", &[])
            .text("water", &[ITALIC, UNDERLINE].concat())
            .text("\r", &[])
            .build();
        std::fs::write(&path, bytes).unwrap();

        let mut host = NativeHost::new();
        let doc = host.open(&path).unwrap();
        assert_eq!(doc.contents(), "H2O water\r");
        assert_eq!(doc.format_at(1), Some(CharFormat::SUBSCRIPT));
        assert_eq!(doc.format_at(4), Some(CharFormat::ITALIC | CharFormat::UNDERLINE));

        let para = doc.paragraph_range(1).unwrap();
        let run = doc.find_format(para, FormatAttr::Italic).unwrap().unwrap();
        assert_eq!(doc.text(run).unwrap(), "water");

        host.close(doc).unwrap();
        host.quit().unwrap();
    }

    #[test]
    fn test_open_carries_pictures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure.doc");
        let png = b"\x89PNG\r\n\x1a\nbits".to_vec();
        std::fs::write(&path, DocBuilder::new().text("Fig ", &[]).picture(&png).text("\r", &[]).build()).unwrap();

        let doc = NativeHost::new().open(&path).unwrap();
        let images = doc.inline_images(doc.paragraph_range(1).unwrap()).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(doc.image_bits(&images[0]).unwrap(), png);
    }

    #[test]
    fn test_open_corrupt_doc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.doc");
        std::fs::write(&path, b"definitely not a compound file").unwrap();
        assert!(NativeHost::new().open(&path).is_err());
    }
}
