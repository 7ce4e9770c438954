//! Paragraph to HTML rendering.
//!
//! Markup is written into the document itself: every pass inserts tags
//! around one formatted run, clears the attribute on the grown range and
//! searches again from the paragraph start. Offsets shift after each
//! insertion, so the paragraph range is re-derived before every search.

use super::ConvertOptions;
use crate::common::Result;
use crate::host::{Document, FormatAttr};
use crate::images;
use tracing::trace;

/// Manual line break inside a paragraph.
pub const LINE_BREAK: &str = "\u{b}";

/// Replacement for [`LINE_BREAK`].
pub const BR_TAG: &str = "<br>";

/// Render paragraph `index` (1-based) as an HTML fragment.
///
/// The document is modified in place; the returned fragment is the
/// paragraph's final text, trimmed.
pub fn render<D: Document + ?Sized>(document: &mut D, index: usize, options: &ConvertOptions) -> Result<String> {
    for attr in FormatAttr::PASS_ORDER {
        wrap_runs(document, index, attr)?;
    }
    replace_line_breaks(document, index)?;
    inline_images(document, index, options)?;

    let range = document.paragraph_range(index)?;
    Ok(document.text(range)?.trim().to_string())
}

/// Wrap every run of `attr` in the paragraph with its tags.
fn wrap_runs<D: Document + ?Sized>(document: &mut D, index: usize, attr: FormatAttr) -> Result<()> {
    loop {
        let paragraph = document.paragraph_range(index)?;
        let Some(run) = document.find_format(paragraph, attr)? else {
            return Ok(());
        };
        trace!(?attr, start = run.start, end = run.end, "wrapping run");

        let grown = document.insert_before(run, attr.open_tag())?;
        let grown = document.insert_after(grown, attr.close_tag())?;
        document.set_format(grown, attr, false)?;
    }
}

fn replace_line_breaks<D: Document + ?Sized>(document: &mut D, index: usize) -> Result<()> {
    loop {
        let paragraph = document.paragraph_range(index)?;
        match document.find_text(paragraph, LINE_BREAK)? {
            Some(hit) => {
                document.replace(hit, BR_TAG)?;
            },
            None => return Ok(()),
        }
    }
}

fn inline_images<D: Document + ?Sized>(document: &mut D, index: usize, options: &ConvertOptions) -> Result<()> {
    loop {
        let paragraph = document.paragraph_range(index)?;
        let Some(image) = document.inline_images(paragraph)?.into_iter().next() else {
            return Ok(());
        };

        let bits = document.image_bits(&image)?;
        let tag = images::inline_img(&bits, options.image_scale)?;
        document.replace(image.anchor, &tag)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use crate::host::memory::MemoryDocument;
    use crate::host::{CharFormat, InlineImage, TextRange};
    use image::{DynamicImage, Rgb, RgbImage};

    fn options() -> ConvertOptions {
        ConvertOptions::default()
    }

    fn render_one(mut doc: MemoryDocument) -> String {
        render(&mut doc, 1, &options()).unwrap()
    }

    #[test]
    fn test_plain_paragraph_is_trimmed_text() {
        let doc = MemoryDocument::from_text("  Plain text here. \r");
        assert_eq!(render_one(doc), "Plain text here.");
    }

    #[test]
    fn test_single_superscript_run() {
        let doc = MemoryDocument::new()
            .with_text("before", CharFormat::empty())
            .with_text("middle", CharFormat::SUPERSCRIPT)
            .with_text("after\r", CharFormat::empty());
        assert_eq!(render_one(doc), "before<sup>middle</sup>after");
    }

    #[test]
    fn test_disjoint_superscript_and_subscript() {
        let doc = MemoryDocument::new()
            .with_text("x", CharFormat::empty())
            .with_text("2", CharFormat::SUPERSCRIPT)
            .with_text(" + H", CharFormat::empty())
            .with_text("2", CharFormat::SUBSCRIPT)
            .with_text("O\r", CharFormat::empty());
        let html = render_one(doc);
        assert_eq!(html, "x<sup>2</sup> + H<sub>2</sub>O");
        assert_eq!(html.matches("<sup>").count(), 1);
        assert_eq!(html.matches("<sub>").count(), 1);
    }

    #[test]
    fn test_multiple_runs_of_one_attribute() {
        let doc = MemoryDocument::new()
            .with_text("a", CharFormat::UNDERLINE)
            .with_text("b", CharFormat::empty())
            .with_text("c", CharFormat::UNDERLINE)
            .with_text("\r", CharFormat::empty());
        assert_eq!(render_one(doc), "<u>a</u>b<u>c</u>");
    }

    #[test]
    fn test_overlapping_attributes_nest_by_pass_order() {
        let doc = MemoryDocument::new()
            .with_text("see ", CharFormat::empty())
            .with_text("x", CharFormat::ITALIC)
            .with_text("2", CharFormat::ITALIC | CharFormat::SUPERSCRIPT)
            .with_text(" now\r", CharFormat::empty());
        assert_eq!(render_one(doc), "see <i>x<sup>2</sup></i> now");
    }

    #[test]
    fn test_line_breaks_become_br() {
        let doc = MemoryDocument::from_text("one\u{b}two\u{b}\u{b}three\r");
        let html = render_one(doc);
        assert_eq!(html, "one<br>two<br><br>three");
        assert!(!html.contains('\u{b}'));
    }

    #[test]
    fn test_only_the_requested_paragraph_changes() {
        let mut doc = MemoryDocument::new()
            .with_text("first", CharFormat::ITALIC)
            .with_text("\r", CharFormat::empty())
            .with_text("second", CharFormat::ITALIC)
            .with_text("\r", CharFormat::empty());
        assert_eq!(render(&mut doc, 2, &options()).unwrap(), "<i>second</i>");
        let first = doc.paragraph_range(1).unwrap();
        assert_eq!(doc.text(first).unwrap(), "first");
    }

    #[test]
    fn test_inline_image_is_scaled_png() {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(48, 21, Rgb([200, 0, 0])))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let doc = MemoryDocument::from_text("Figure ")
            .with_image(png, CharFormat::empty())
            .with_text(" end\r", CharFormat::empty());
        let html = render_one(doc);

        let prefix = r#"Figure <img align="Middle" src="data:image/png;base64,"#;
        assert!(html.starts_with(prefix));
        assert!(html.ends_with(r#"" /> end"#));

        use base64::Engine;
        let data = &html[prefix.len()..html.len() - r#"" /> end"#.len()];
        let bytes = base64::engine::general_purpose::STANDARD.decode(data).unwrap();
        let scaled = image::load_from_memory(&bytes).unwrap();
        assert_eq!((scaled.width(), scaled.height()), (12, 5));
    }

    #[test]
    fn test_vector_metafile_image_is_rendered() {
        // A WMF holding only a line, no embedded bitmap
        let wmf = crate::images::metafile::tests::line_wmf();
        let doc = MemoryDocument::from_text("E = ")
            .with_image(wmf, CharFormat::empty())
            .with_text("\r", CharFormat::empty());
        let html = render_one(doc);

        let prefix = r#"E = <img align="Middle" src="data:image/png;base64,"#;
        assert!(html.starts_with(prefix), "{html}");
        use base64::Engine;
        let data = &html[prefix.len()..html.len() - r#"" />"#.len()];
        let bytes = base64::engine::general_purpose::STANDARD.decode(data).unwrap();
        let scaled = image::load_from_memory(&bytes).unwrap();
        assert_eq!((scaled.width(), scaled.height()), (10, 5));
    }

    /// Reports one empty superscript run at `position`, then answers from the buffer.
    struct EmptyRunDocument {
        buffer: MemoryDocument,
        position: std::cell::Cell<Option<usize>>,
    }

    impl Document for EmptyRunDocument {
        fn paragraph_count(&self) -> Result<usize> {
            self.buffer.paragraph_count()
        }

        fn paragraph_range(&self, index: usize) -> Result<TextRange> {
            self.buffer.paragraph_range(index)
        }

        fn text(&self, range: TextRange) -> Result<String> {
            self.buffer.text(range)
        }

        fn find_format(&self, within: TextRange, attr: FormatAttr) -> Result<Option<TextRange>> {
            if attr == FormatAttr::Superscript
                && let Some(position) = self.position.take()
            {
                return Ok(Some(TextRange::new(position, position)));
            }
            self.buffer.find_format(within, attr)
        }

        fn find_text(&self, within: TextRange, needle: &str) -> Result<Option<TextRange>> {
            self.buffer.find_text(within, needle)
        }

        fn insert_before(&mut self, range: TextRange, text: &str) -> Result<TextRange> {
            self.buffer.insert_before(range, text)
        }

        fn insert_after(&mut self, range: TextRange, text: &str) -> Result<TextRange> {
            self.buffer.insert_after(range, text)
        }

        fn set_format(&mut self, range: TextRange, attr: FormatAttr, value: bool) -> Result<()> {
            self.buffer.set_format(range, attr, value)
        }

        fn replace(&mut self, range: TextRange, text: &str) -> Result<TextRange> {
            self.buffer.replace(range, text)
        }

        fn replace_all(&mut self, find: &str, replacement: &str) -> Result<usize> {
            self.buffer.replace_all(find, replacement)
        }

        fn inline_images(&self, within: TextRange) -> Result<Vec<InlineImage>> {
            self.buffer.inline_images(within)
        }

        fn image_bits(&self, image: &InlineImage) -> Result<Vec<u8>> {
            self.buffer.image_bits(image)
        }
    }

    #[test]
    fn test_zero_length_run_gets_a_tag_pair() {
        let mut doc = EmptyRunDocument {
            buffer: MemoryDocument::from_text("abc\r"),
            position: std::cell::Cell::new(Some(2)),
        };
        assert_eq!(render(&mut doc, 1, &options()).unwrap(), "ab<sup></sup>c");
    }

    #[test]
    fn test_undecodable_image_aborts() {
        let mut doc = MemoryDocument::from_text("x")
            .with_image(b"garbage".to_vec(), CharFormat::empty())
            .with_text("\r", CharFormat::empty());
        assert!(matches!(render(&mut doc, 1, &options()), Err(Error::Image(_))));
    }

    #[test]
    fn test_missing_paragraph_is_an_error() {
        let mut doc = MemoryDocument::from_text("only\r");
        assert!(matches!(
            render(&mut doc, 2, &options()),
            Err(Error::ParagraphOutOfRange { index: 2, count: 1 })
        ));
    }
}
