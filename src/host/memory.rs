//! In-memory formatted text buffer.
//!
//! Every character carries its own [`CharFormat`] and optionally the bytes of
//! the image it anchors. Paragraphs end at `\r`. Inserted text takes the
//! format of the neighbouring character, so a tag inserted in front of an
//! italic word is itself italic until that format is cleared.

use super::{CharFormat, Document, FormatAttr, InlineImage, TextRange};
use crate::common::{Error, Result};
use std::sync::Arc;

/// Paragraph mark.
pub const PARAGRAPH_MARK: char = '\r';

/// Placeholder character anchoring an inline image.
pub const IMAGE_ANCHOR: char = '\u{1}';

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cell {
    ch: char,
    format: CharFormat,
    image: Option<Arc<[u8]>>,
}

impl Cell {
    fn plain(ch: char, format: CharFormat) -> Self {
        Self {
            ch,
            format,
            image: None,
        }
    }
}

/// A mutable document held entirely in memory.
///
/// # Examples
///
/// ```
/// use docmark::host::memory::MemoryDocument;
/// use docmark::host::{CharFormat, Document};
///
/// let doc = MemoryDocument::new()
///     .with_text("x", CharFormat::empty())
///     .with_text("2", CharFormat::SUPERSCRIPT)
///     .with_text("\r", CharFormat::empty());
/// assert_eq!(doc.paragraph_count().unwrap(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDocument {
    cells: Vec<Cell>,
    /// Positions of the paragraph marks in `cells`, ascending
    marks: Vec<usize>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unformatted document.
    pub fn from_text(text: &str) -> Self {
        Self::new().with_text(text, CharFormat::empty())
    }

    /// Append text with a format.
    pub fn with_text(mut self, text: &str, format: CharFormat) -> Self {
        self.push_text(text, format);
        self
    }

    /// Append an image anchor.
    pub fn with_image(mut self, bits: Vec<u8>, format: CharFormat) -> Self {
        self.push_image(bits, format);
        self
    }

    pub fn push_text(&mut self, text: &str, format: CharFormat) {
        let end = self.cells.len();
        let cells = text.chars().map(|ch| Cell::plain(ch, format)).collect();
        self.splice_cells(TextRange::new(end, end), cells);
    }

    pub fn push_image(&mut self, bits: Vec<u8>, format: CharFormat) {
        self.cells.push(Cell {
            ch: IMAGE_ANCHOR,
            format,
            image: Some(bits.into()),
        });
    }

    /// Number of characters in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whole buffer as text.
    pub fn contents(&self) -> String {
        self.cells.iter().map(|c| c.ch).collect()
    }

    /// Format of the character at `position`.
    pub fn format_at(&self, position: usize) -> Option<CharFormat> {
        self.cells.get(position).map(|c| c.format)
    }

    fn check(&self, range: TextRange) -> Result<()> {
        if range.start > range.end || range.end > self.cells.len() {
            return Err(Error::InvalidRange {
                start: range.start,
                end: range.end,
                len: self.cells.len(),
            });
        }
        Ok(())
    }

    /// Start of the text following the last paragraph mark.
    fn tail_start(&self) -> usize {
        self.marks.last().map_or(0, |&mark| mark + 1)
    }

    fn paragraphs(&self) -> usize {
        // Text after the last mark forms a final unterminated paragraph
        self.marks.len() + usize::from(self.tail_start() < self.cells.len())
    }

    /// Span of the 0-based paragraph `i`, excluding its mark.
    fn span(&self, i: usize) -> Option<TextRange> {
        let start = match i.checked_sub(1) {
            Some(previous) => self.marks.get(previous)? + 1,
            None => 0,
        };
        match self.marks.get(i) {
            Some(&end) => Some(TextRange::new(start, end)),
            None => (i == self.marks.len() && start < self.cells.len())
                .then(|| TextRange::new(start, self.cells.len())),
        }
    }

    /// Replace the cells of `range`, keeping the mark positions in step.
    fn splice_cells(&mut self, range: TextRange, cells: Vec<Cell>) {
        let first = self.marks.partition_point(|&mark| mark < range.start);
        let last = self.marks.partition_point(|&mark| mark < range.end);
        let added: Vec<usize> = cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.ch == PARAGRAPH_MARK)
            .map(|(offset, _)| range.start + offset)
            .collect();
        let kept_from = first + added.len();
        let inserted = cells.len();

        self.marks.splice(first..last, added);
        for mark in &mut self.marks[kept_from..] {
            *mark = *mark - range.len() + inserted;
        }
        self.cells.splice(range.start..range.end, cells);
    }

    /// Splice `text` in at `position` with a uniform format.
    fn splice(&mut self, position: usize, text: &str, format: CharFormat) -> usize {
        let cells: Vec<Cell> = text.chars().map(|ch| Cell::plain(ch, format)).collect();
        let count = cells.len();
        self.splice_cells(TextRange::new(position, position), cells);
        count
    }

    /// Format inherited by text inserted at `position`.
    fn inherited_format(&self, preferred: Option<usize>, fallback: Option<usize>) -> CharFormat {
        preferred
            .and_then(|p| self.format_at(p))
            .or_else(|| fallback.and_then(|p| self.format_at(p)))
            .unwrap_or_default()
    }
}

fn mark_positions(cells: &[Cell]) -> Vec<usize> {
    cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.ch == PARAGRAPH_MARK)
        .map(|(position, _)| position)
        .collect()
}

impl Document for MemoryDocument {
    fn paragraph_count(&self) -> Result<usize> {
        Ok(self.paragraphs())
    }

    fn paragraph_range(&self, index: usize) -> Result<TextRange> {
        index
            .checked_sub(1)
            .and_then(|i| self.span(i))
            .ok_or_else(|| Error::ParagraphOutOfRange {
                index,
                count: self.paragraphs(),
            })
    }

    fn text(&self, range: TextRange) -> Result<String> {
        self.check(range)?;
        Ok(self.cells[range.start..range.end].iter().map(|c| c.ch).collect())
    }

    fn find_format(&self, within: TextRange, attr: FormatAttr) -> Result<Option<TextRange>> {
        self.check(within)?;
        let flag = attr.flag();
        let cells = &self.cells[within.start..within.end];

        let Some(first) = cells.iter().position(|c| c.format.contains(flag)) else {
            return Ok(None);
        };
        let length = cells[first..]
            .iter()
            .take_while(|c| c.format.contains(flag))
            .count();

        let start = within.start + first;
        Ok(Some(TextRange::new(start, start + length)))
    }

    fn find_text(&self, within: TextRange, needle: &str) -> Result<Option<TextRange>> {
        self.check(within)?;
        let needle: Vec<char> = needle.chars().collect();
        if needle.is_empty() || needle.len() > within.len() {
            return Ok(None);
        }

        let cells = &self.cells[within.start..within.end];
        let found = cells
            .windows(needle.len())
            .position(|window| window.iter().zip(&needle).all(|(cell, ch)| cell.ch == *ch));
        Ok(found.map(|offset| {
            let start = within.start + offset;
            TextRange::new(start, start + needle.len())
        }))
    }

    fn insert_before(&mut self, range: TextRange, text: &str) -> Result<TextRange> {
        self.check(range)?;
        let format = self.inherited_format(Some(range.start), range.start.checked_sub(1));
        let count = self.splice(range.start, text, format);
        Ok(TextRange::new(range.start, range.end + count))
    }

    fn insert_after(&mut self, range: TextRange, text: &str) -> Result<TextRange> {
        self.check(range)?;
        let format = self.inherited_format(range.end.checked_sub(1), Some(range.end));
        let count = self.splice(range.end, text, format);
        Ok(TextRange::new(range.start, range.end + count))
    }

    fn set_format(&mut self, range: TextRange, attr: FormatAttr, value: bool) -> Result<()> {
        self.check(range)?;
        for cell in &mut self.cells[range.start..range.end] {
            cell.format.set(attr.flag(), value);
        }
        Ok(())
    }

    fn replace(&mut self, range: TextRange, text: &str) -> Result<TextRange> {
        self.check(range)?;
        let format = self.inherited_format(Some(range.start), range.start.checked_sub(1));
        let cells: Vec<Cell> = text.chars().map(|ch| Cell::plain(ch, format)).collect();
        let count = cells.len();
        self.splice_cells(range, cells);
        Ok(TextRange::new(range.start, range.start + count))
    }

    fn replace_all(&mut self, find: &str, replacement: &str) -> Result<usize> {
        let pattern: Vec<char> = find.chars().collect();
        if pattern.is_empty() {
            return Ok(0);
        }
        let replacement: Vec<char> = replacement.chars().collect();

        let mut result = Vec::with_capacity(self.cells.len());
        let mut count = 0;
        let mut i = 0;
        while i < self.cells.len() {
            let matches = self.cells.len() - i >= pattern.len()
                && self.cells[i..i + pattern.len()]
                    .iter()
                    .zip(&pattern)
                    .all(|(cell, ch)| cell.ch == *ch);
            if matches {
                let format = self.cells[i].format;
                result.extend(replacement.iter().map(|&ch| Cell::plain(ch, format)));
                i += pattern.len();
                count += 1;
            } else {
                result.push(self.cells[i].clone());
                i += 1;
            }
        }

        self.marks = mark_positions(&result);
        self.cells = result;
        Ok(count)
    }

    fn inline_images(&self, within: TextRange) -> Result<Vec<InlineImage>> {
        self.check(within)?;
        Ok(self.cells[within.start..within.end]
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.image.is_some())
            .map(|(offset, _)| {
                let position = within.start + offset;
                InlineImage {
                    anchor: TextRange::new(position, position + 1),
                }
            })
            .collect())
    }

    fn image_bits(&self, image: &InlineImage) -> Result<Vec<u8>> {
        self.cells
            .get(image.anchor.start)
            .and_then(|cell| cell.image.as_deref())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::Host(format!("no image anchored at {}", image.anchor.start)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryDocument {
        MemoryDocument::new()
            .with_text("ab", CharFormat::empty())
            .with_text("cd", CharFormat::ITALIC)
            .with_text("e\r\rlast", CharFormat::empty())
    }

    #[test]
    fn test_paragraphs() {
        let doc = sample();
        assert_eq!(doc.paragraph_count().unwrap(), 3);
        assert_eq!(doc.paragraph_range(1).unwrap(), TextRange::new(0, 5));
        assert_eq!(doc.paragraph_range(2).unwrap(), TextRange::new(6, 6));
        assert_eq!(doc.paragraph_range(3).unwrap(), TextRange::new(7, 11));
        assert!(matches!(
            doc.paragraph_range(0),
            Err(Error::ParagraphOutOfRange { index: 0, count: 3 })
        ));
        assert!(doc.paragraph_range(4).is_err());
        assert_eq!(MemoryDocument::new().paragraph_count().unwrap(), 0);
    }

    #[test]
    fn test_find_format_is_maximal_and_bounded() {
        let doc = sample();
        let para = doc.paragraph_range(1).unwrap();
        assert_eq!(
            doc.find_format(para, FormatAttr::Italic).unwrap(),
            Some(TextRange::new(2, 4))
        );
        assert_eq!(
            doc.find_format(TextRange::new(3, 5), FormatAttr::Italic).unwrap(),
            Some(TextRange::new(3, 4))
        );
        assert_eq!(doc.find_format(para, FormatAttr::Underline).unwrap(), None);
    }

    #[test]
    fn test_insertions_inherit_neighbour_format() {
        let mut doc = sample();
        let run = TextRange::new(2, 4);
        let grown = doc.insert_before(run, "<i>").unwrap();
        assert_eq!(grown, TextRange::new(2, 7));
        let grown = doc.insert_after(grown, "</i>").unwrap();
        assert_eq!(grown, TextRange::new(2, 11));
        assert_eq!(doc.text(grown).unwrap(), "<i>cd</i>");
        assert!(doc.format_at(2).unwrap().contains(CharFormat::ITALIC));
        assert!(doc.format_at(10).unwrap().contains(CharFormat::ITALIC));
        assert!(!doc.format_at(11).unwrap().contains(CharFormat::ITALIC));

        doc.set_format(grown, FormatAttr::Italic, false).unwrap();
        let para = doc.paragraph_range(1).unwrap();
        assert_eq!(doc.find_format(para, FormatAttr::Italic).unwrap(), None);
    }

    #[test]
    fn test_find_and_replace_text() {
        let mut doc = MemoryDocument::from_text("one\u{b}two\u{b}three");
        let all = doc.paragraph_range(1).unwrap();
        let hit = doc.find_text(all, "\u{b}").unwrap().unwrap();
        assert_eq!(hit, TextRange::new(3, 4));
        let new = doc.replace(hit, "<br>").unwrap();
        assert_eq!(new, TextRange::new(3, 7));
        assert_eq!(doc.contents(), "one<br>two\u{b}three");
        assert_eq!(doc.find_text(all, "missing").unwrap(), None);
        assert_eq!(doc.find_text(all, "").unwrap(), None);
    }

    #[test]
    fn test_replace_all_is_literal_and_ordered() {
        let mut doc = MemoryDocument::from_text("a&b<c&&");
        assert_eq!(doc.replace_all("&", "&amp;").unwrap(), 3);
        assert_eq!(doc.replace_all("<", "&lt;").unwrap(), 1);
        assert_eq!(doc.contents(), "a&amp;b&lt;c&amp;&amp;");
        assert_eq!(doc.replace_all("", "x").unwrap(), 0);
    }

    #[test]
    fn test_replace_all_keeps_format_of_match() {
        let mut doc = MemoryDocument::new()
            .with_text("x", CharFormat::empty())
            .with_text("\u{F025}", CharFormat::SUPERSCRIPT);
        doc.replace_all("\u{F025}", "%").unwrap();
        assert_eq!(doc.contents(), "x%");
        assert_eq!(doc.format_at(1), Some(CharFormat::SUPERSCRIPT));
    }

    #[test]
    fn test_images() {
        let doc = MemoryDocument::from_text("see ")
            .with_image(vec![1, 2, 3], CharFormat::empty())
            .with_text("\r", CharFormat::empty());
        let para = doc.paragraph_range(1).unwrap();
        let images = doc.inline_images(para).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].anchor, TextRange::new(4, 5));
        assert_eq!(doc.image_bits(&images[0]).unwrap(), vec![1, 2, 3]);
        assert!(
            doc.image_bits(&InlineImage {
                anchor: TextRange::new(0, 1)
            })
            .is_err()
        );
    }

    #[test]
    fn test_mark_index_follows_edits() {
        fn assert_in_step(doc: &MemoryDocument) {
            let fresh = MemoryDocument::from_text(&doc.contents());
            assert_eq!(doc.marks, fresh.marks);
            assert_eq!(doc.paragraph_count().unwrap(), fresh.paragraph_count().unwrap());
        }

        let mut doc = sample();
        doc.insert_before(TextRange::new(1, 1), "x\ry").unwrap();
        assert_in_step(&doc);
        assert_eq!(doc.paragraph_range(2).unwrap(), TextRange::new(3, 8));

        // Replacing across a mark joins two paragraphs
        doc.replace(TextRange::new(1, 4), "-").unwrap();
        assert_in_step(&doc);
        assert_eq!(doc.text(doc.paragraph_range(1).unwrap()).unwrap(), "a-bcde");

        doc.insert_after(TextRange::new(0, 2), "\r\r").unwrap();
        doc.replace_all("e", "\re").unwrap();
        assert_in_step(&doc);
        doc.push_text("tail\r", CharFormat::empty());
        assert_in_step(&doc);
        assert_eq!(doc.contents(), "a-\r\rbcd\re\r\rlasttail\r");
        assert_eq!(doc.paragraph_count().unwrap(), 6);
        assert_eq!(doc.paragraph_range(6).unwrap(), TextRange::new(11, 19));
    }

    #[test]
    fn test_invalid_range() {
        let doc = MemoryDocument::from_text("abc");
        assert!(matches!(
            doc.text(TextRange::new(2, 9)),
            Err(Error::InvalidRange { len: 3, .. })
        ));
    }
}
