//! Whole-document glyph normalization.
//!
//! Symbol-font code points are folded to their printable equivalents and
//! HTML-significant characters are escaped before any markup is inserted.

use crate::common::Result;
use crate::host::Document;
use tracing::debug;

/// Ordered literal replacements. `&` must be escaped before the entities
/// that introduce new ampersands.
pub const GLYPH_TABLE: [(&str, &str); 8] = [
    ("\u{F025}", "%"),
    ("\u{F049}", "I"),
    ("\u{F020}", " "),
    ("&", "&amp;"),
    ("<", "&lt;"),
    (">", "&gt;"),
    ("\"", "&quot;"),
    ("'", "&#39;"),
];

/// Apply [`GLYPH_TABLE`] to the whole document, in order.
///
/// Not idempotent on text containing `&`: a second pass escapes the
/// ampersands of the entities written by the first.
pub fn normalize_glyphs<D: Document + ?Sized>(document: &mut D) -> Result<usize> {
    let mut total = 0;
    for (find, replacement) in GLYPH_TABLE {
        let count = document.replace_all(find, replacement)?;
        if count > 0 {
            debug!(find = ?find, count, "normalized glyphs");
        }
        total += count;
    }
    Ok(total)
}
