//! Document to record conversion.
//!
//! A document becomes a list of [`Record`]s, one per paragraph with visible
//! content, each holding the paragraph's 1-based position and its HTML.

pub mod glyphs;
pub mod render;

pub use glyphs::normalize_glyphs;
pub use render::render;

use crate::common::Result;
use crate::host::Document;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default divisor applied to both image dimensions.
pub const DEFAULT_IMAGE_SCALE: u32 = 4;

/// Options for rendering a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Inline images are shrunk by this factor (floor division, at least 1px).
    pub image_scale: u32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            image_scale: DEFAULT_IMAGE_SCALE,
        }
    }
}

/// One converted paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based position of the paragraph in the document
    pub id: usize,
    pub html: String,
}

/// Convert every non-empty paragraph of a document.
///
/// Glyphs are normalized once for the whole document first. Paragraphs with
/// no text, or whose rendering is empty after trimming, produce no record;
/// the ids of the remaining records keep their document positions.
pub fn convert_document<D: Document + ?Sized>(document: &mut D, options: &ConvertOptions) -> Result<Vec<Record>> {
    normalize_glyphs(document)?;

    let count = document.paragraph_count()?;
    let mut records = Vec::with_capacity(count);
    for index in 1..=count {
        let range = document.paragraph_range(index)?;
        if range.is_empty() {
            continue;
        }

        let html = render(document, index, options)?;
        if html.is_empty() {
            debug!(index, "paragraph rendered empty");
            continue;
        }
        records.push(Record { id: index, html });
    }

    info!(paragraphs = count, records = records.len(), "converted document");
    Ok(records)
}
