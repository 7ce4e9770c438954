/// Document - the main story of a Word document with its character formatting.
use super::package::{DocError, Result};
use super::parts::chp::CharacterProperties;
use super::parts::chp_bin_table::ChpBinTable;
use super::parts::fib::{FC_CLX, FC_PLCF_BTE_CHPX, FileInformationBlock};
use super::parts::piece_table::{PieceTable, PositionedChar};
use super::picture::picture_bytes;
use crate::images::ImageError;
use tracing::debug;

const FIELD_BEGIN: char = '\u{13}';
const FIELD_SEPARATOR: char = '\u{14}';
const FIELD_END: char = '\u{15}';
const PICTURE_ANCHOR: char = '\u{1}';
const CELL_MARK: char = '\u{7}';
const NON_BREAKING_HYPHEN: char = '\u{1E}';

/// A character of the main story with its formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocChar {
    pub ch: char,
    pub properties: CharacterProperties,
}

/// A Word document (.doc).
///
/// Holds the visible characters of the main story: field instructions are
/// removed, symbol characters resolved and special characters mapped to the
/// text a reader sees. Paragraph and cell marks both appear as `\r`.
pub struct Document {
    chars: Vec<DocChar>,
    data_stream: Vec<u8>,
}

impl Document {
    /// Build a document from its three streams.
    pub(crate) fn parse(word_document: &[u8], table_stream: &[u8], data_stream: Vec<u8>) -> Result<Self> {
        let fib = FileInformationBlock::parse(word_document)?;
        if fib.is_encrypted() {
            return Err(DocError::InvalidFormat(
                "Encrypted documents are not supported".to_string(),
            ));
        }

        let clx = fib
            .table_slice(FC_CLX, table_stream)?
            .ok_or_else(|| DocError::Corrupted("Document has no CLX".to_string()))?;
        let pieces = PieceTable::parse(clx)?;

        let bin_table = match fib.table_slice(FC_PLCF_BTE_CHPX, table_stream)? {
            Some(plcf) => ChpBinTable::parse(plcf, word_document)?,
            None => ChpBinTable::default(),
        };

        let raw = pieces.decode(word_document, fib.ccp_text())?;
        let chars = visible_chars(&raw, &bin_table);
        debug!(
            nfib = fib.version(),
            pieces = pieces.pieces().len(),
            raw = raw.len(),
            visible = chars.len(),
            "parsed main story"
        );

        Ok(Self { chars, data_stream })
    }

    #[inline]
    pub fn chars(&self) -> &[DocChar] {
        &self.chars
    }

    /// Plain text of the main story.
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.ch).collect()
    }

    /// Image bytes of the picture anchored by a character.
    pub fn picture(&self, properties: &CharacterProperties) -> std::result::Result<Vec<u8>, ImageError> {
        let offset = properties
            .pic_offset
            .ok_or_else(|| ImageError::Truncated("picture anchor without location".into()))?;
        picture_bytes(&self.data_stream, offset)
    }
}

/// Apply field, symbol and special-character rules to the decoded story.
fn visible_chars(raw: &[PositionedChar], bin_table: &ChpBinTable) -> Vec<DocChar> {
    let mut chars = Vec::with_capacity(raw.len());
    // One entry per open field: true once its separator has been seen
    let mut fields: Vec<bool> = Vec::new();

    for positioned in raw {
        let properties = bin_table.properties_at(positioned.fc);
        match positioned.ch {
            FIELD_BEGIN => {
                fields.push(false);
                continue;
            },
            FIELD_SEPARATOR => {
                if let Some(in_result) = fields.last_mut() {
                    *in_result = true;
                }
                continue;
            },
            FIELD_END => {
                fields.pop();
                continue;
            },
            _ => {},
        }

        // Inside any field instruction
        if fields.iter().any(|in_result| !in_result) {
            continue;
        }

        let ch = match properties.symbol {
            Some(symbol) => char::from_u32(symbol.code as u32).unwrap_or(positioned.ch),
            None => positioned.ch,
        };

        let ch = match ch {
            CELL_MARK => '\r',
            NON_BREAKING_HYPHEN => '-',
            PICTURE_ANCHOR if properties.has_picture() => PICTURE_ANCHOR,
            '\t' | '\r' | '\u{b}' | '\u{c}' => ch,
            c if c.is_control() => continue,
            c => c,
        };

        chars.push(DocChar { ch, properties });
    }

    chars
}
