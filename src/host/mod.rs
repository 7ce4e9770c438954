//! Document host capability layer.
//!
//! The converter never touches a file format directly. It drives a
//! [`Document`] through a small set of editing and search operations, the
//! same ones a word processor's automation interface offers, and obtains
//! documents from a [`DocumentHost`].
//!
//! Two implementations ship with the crate:
//! - [`memory::MemoryDocument`]: a formatted character buffer
//! - [`native::NativeHost`]: loads `.doc` files into `MemoryDocument`s

pub mod memory;
pub mod native;

use crate::common::Result;
use bitflags::bitflags;
use std::path::Path;
use tracing::{debug, warn};

/// Half-open character range `[start, end)` inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[inline]
    pub const fn contains(&self, position: usize) -> bool {
        self.start <= position && position < self.end
    }
}

bitflags! {
    /// Character attributes rendered as HTML tags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CharFormat: u8 {
        const SUPERSCRIPT = 0x01;
        const SUBSCRIPT = 0x02;
        const UNDERLINE = 0x04;
        const ITALIC = 0x08;
    }
}

/// One binary formatting attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatAttr {
    Superscript,
    Subscript,
    Underline,
    Italic,
}

impl FormatAttr {
    /// Order in which the tag passes run; nesting of overlapping tags follows it.
    pub const PASS_ORDER: [FormatAttr; 4] = [
        FormatAttr::Superscript,
        FormatAttr::Subscript,
        FormatAttr::Underline,
        FormatAttr::Italic,
    ];

    pub const fn flag(self) -> CharFormat {
        match self {
            FormatAttr::Superscript => CharFormat::SUPERSCRIPT,
            FormatAttr::Subscript => CharFormat::SUBSCRIPT,
            FormatAttr::Underline => CharFormat::UNDERLINE,
            FormatAttr::Italic => CharFormat::ITALIC,
        }
    }

    pub const fn open_tag(self) -> &'static str {
        match self {
            FormatAttr::Superscript => "<sup>",
            FormatAttr::Subscript => "<sub>",
            FormatAttr::Underline => "<u>",
            FormatAttr::Italic => "<i>",
        }
    }

    pub const fn close_tag(self) -> &'static str {
        match self {
            FormatAttr::Superscript => "</sup>",
            FormatAttr::Subscript => "</sub>",
            FormatAttr::Underline => "</u>",
            FormatAttr::Italic => "</i>",
        }
    }
}

/// An image anchored at one character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineImage {
    /// Range of the anchor character
    pub anchor: TextRange,
}

/// Editing and search operations on an open document.
///
/// Paragraph indices are 1-based. Ranges are character offsets that shift
/// whenever text is inserted or replaced, so callers re-derive them after
/// every mutation.
pub trait Document {
    fn paragraph_count(&self) -> Result<usize>;

    /// Range of paragraph `index`, excluding its paragraph mark.
    fn paragraph_range(&self, index: usize) -> Result<TextRange>;

    fn text(&self, range: TextRange) -> Result<String>;

    /// First maximal run inside `within` where `attr` is set.
    fn find_format(&self, within: TextRange, attr: FormatAttr) -> Result<Option<TextRange>>;

    /// First literal occurrence of `needle` inside `within`.
    fn find_text(&self, within: TextRange, needle: &str) -> Result<Option<TextRange>>;

    /// Insert `text` at the start of `range`; returns the grown range.
    fn insert_before(&mut self, range: TextRange, text: &str) -> Result<TextRange>;

    /// Insert `text` at the end of `range`; returns the grown range.
    fn insert_after(&mut self, range: TextRange, text: &str) -> Result<TextRange>;

    fn set_format(&mut self, range: TextRange, attr: FormatAttr, value: bool) -> Result<()>;

    /// Replace the text of `range`; returns the range of the new text.
    fn replace(&mut self, range: TextRange, text: &str) -> Result<TextRange>;

    /// Replace every literal occurrence of `find` in the whole document.
    fn replace_all(&mut self, find: &str, replacement: &str) -> Result<usize>;

    fn inline_images(&self, within: TextRange) -> Result<Vec<InlineImage>>;

    /// Raw bytes of an inline image as stored in the document.
    fn image_bits(&self, image: &InlineImage) -> Result<Vec<u8>>;
}

/// Opens and closes documents.
pub trait DocumentHost {
    type Doc: Document;

    fn open(&mut self, path: &Path) -> Result<Self::Doc>;

    /// Close a document without saving it.
    fn close(&mut self, document: Self::Doc) -> Result<()>;

    /// Release the host. Called exactly once per session.
    fn quit(&mut self) -> Result<()>;
}

/// Owns a host for the duration of a run and quits it when dropped.
pub struct Session<H: DocumentHost> {
    host: Option<H>,
}

impl<H: DocumentHost> Session<H> {
    pub fn new(host: H) -> Self {
        debug!("host session started");
        Self { host: Some(host) }
    }

    pub fn open(&mut self, path: &Path) -> Result<H::Doc> {
        self.host_mut()?.open(path)
    }

    pub fn close(&mut self, document: H::Doc) -> Result<()> {
        self.host_mut()?.close(document)
    }

    /// Quit the host now, reporting any failure.
    pub fn quit(mut self) -> Result<()> {
        match self.host.take() {
            Some(mut host) => host.quit(),
            None => Ok(()),
        }
    }

    fn host_mut(&mut self) -> Result<&mut H> {
        self.host
            .as_mut()
            .ok_or_else(|| crate::common::Error::Host("session already released".to_string()))
    }
}

impl<H: DocumentHost> Drop for Session<H> {
    fn drop(&mut self) {
        if let Some(mut host) = self.host.take()
            && let Err(e) = host.quit()
        {
            warn!(error = %e, "failed to quit document host");
        }
    }
}
