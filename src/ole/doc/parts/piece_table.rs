/// Piece Table parser for DOC files.
///
/// The piece table maps Character Positions (CP) to File Characters (FC)
/// in the WordDocument stream. Each piece is either UTF-16LE or
/// Windows-1252 encoded.
///
/// References:
/// - [MS-DOC] 2.9.38 Clx
/// - [MS-DOC] 2.9.177 Pcd
use super::super::package::{DocError, Result};
use crate::common::binary::{read_u16_le, read_u32_le};
use encoding_rs::WINDOWS_1252;

/// Size of a Pcd (piece descriptor) in bytes
const PCD_SIZE: usize = 8;

/// A text piece - maps a range of CPs to an FC in the WordDocument stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPiece {
    /// Start character position (CP)
    pub cp_start: u32,
    /// End character position (CP), exclusive
    pub cp_end: u32,
    /// Byte offset of the piece's first character in the WordDocument stream
    pub fc: u32,
    /// Whether the text is UTF-16LE (true) or single-byte (false)
    pub is_unicode: bool,
}

impl TextPiece {
    #[inline]
    fn bytes_per_char(&self) -> u32 {
        if self.is_unicode { 2 } else { 1 }
    }

    /// Convert a CP within this piece to an FC.
    pub fn cp_to_fc(&self, cp: u32) -> Option<u32> {
        if cp < self.cp_start || cp >= self.cp_end {
            return None;
        }
        Some(self.fc + (cp - self.cp_start) * self.bytes_per_char())
    }
}

/// A decoded character with the file position it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionedChar {
    pub ch: char,
    pub fc: u32,
}

/// Piece Table - manages the mapping between CP and FC.
#[derive(Debug, Clone)]
pub struct PieceTable {
    /// All text pieces, sorted by CP
    pieces: Vec<TextPiece>,
}

impl PieceTable {
    /// Parse a piece table from CLX data (fcClx/lcbClx in the FIB).
    pub fn parse(clx: &[u8]) -> Result<Self> {
        let mut offset = 0;

        // Skip the RgPrc entries (clxt 0x01) preceding the Pcdt
        while clx.get(offset) == Some(&0x01) {
            let size = read_u16_le(clx, offset + 1)
                .map_err(|_| DocError::Corrupted("Truncated Prc in CLX".to_string()))?;
            offset += 3 + size as usize;
        }

        if clx.get(offset) != Some(&0x02) {
            return Err(DocError::Corrupted("CLX has no piece table".to_string()));
        }
        let lcb = read_u32_le(clx, offset + 1)
            .map_err(|_| DocError::Corrupted("Truncated Pcdt header".to_string()))?
            as usize;
        offset += 5;

        let plc = clx
            .get(offset..offset + lcb)
            .ok_or_else(|| DocError::Corrupted("Piece table data truncated".to_string()))?;
        if plc.len() < 4 {
            return Err(DocError::Corrupted("Empty piece table".to_string()));
        }

        // PlcPcd: (n + 1) CPs followed by n Pcds
        let count = (plc.len() - 4) / (4 + PCD_SIZE);
        let pcd_base = (count + 1) * 4;
        let mut pieces = Vec::with_capacity(count);

        for i in 0..count {
            let cp_start = read_u32_le(plc, i * 4).unwrap_or(0);
            let cp_end = read_u32_le(plc, (i + 1) * 4).unwrap_or(0);
            let fc_raw = read_u32_le(plc, pcd_base + i * PCD_SIZE + 2).unwrap_or(0);

            // Bit 30 set means compressed (single-byte) text at fc / 2
            let is_unicode = (fc_raw & 0x4000_0000) == 0;
            let fc = if is_unicode {
                fc_raw & 0x3FFF_FFFF
            } else {
                (fc_raw & 0x3FFF_FFFF) / 2
            };

            if cp_end > cp_start {
                pieces.push(TextPiece {
                    cp_start,
                    cp_end,
                    fc,
                    is_unicode,
                });
            }
        }

        pieces.sort_by_key(|p| p.cp_start);
        Ok(Self { pieces })
    }

    /// Get all text pieces.
    #[inline]
    pub fn pieces(&self) -> &[TextPiece] {
        &self.pieces
    }

    /// Convert a CP to an FC.
    pub fn cp_to_fc(&self, cp: u32) -> Option<u32> {
        let index = self.pieces.partition_point(|p| p.cp_end <= cp);
        self.pieces.get(index)?.cp_to_fc(cp)
    }

    /// One past the last CP covered by a piece.
    #[inline]
    pub fn cp_end(&self) -> u32 {
        self.pieces.iter().map(|p| p.cp_end).max().unwrap_or(0)
    }

    /// Decode the characters in `[0, cp_limit)`, each with its FC.
    ///
    /// Surrogate pairs are joined and reported at the FC of the high surrogate.
    /// A limit beyond the last piece is a corrupted FIB.
    pub fn decode(&self, word_document: &[u8], cp_limit: u32) -> Result<Vec<PositionedChar>> {
        if cp_limit > self.cp_end() {
            return Err(DocError::Corrupted(format!(
                "Text length {} exceeds piece table end {}",
                cp_limit,
                self.cp_end()
            )));
        }

        // Every character takes at least one byte of the stream
        let mut chars = Vec::with_capacity((cp_limit as usize).min(word_document.len()));
        let mut pending_high: Option<(u16, u32)> = None;

        for piece in &self.pieces {
            if piece.cp_start >= cp_limit {
                break;
            }
            let cp_end = piece.cp_end.min(cp_limit);
            let width = piece.bytes_per_char() as usize;
            let start = piece.fc as usize;
            let end = start + (cp_end - piece.cp_start) as usize * width;
            let bytes = word_document.get(start..end).ok_or_else(|| {
                DocError::Corrupted(format!(
                    "Text piece {}..{} exceeds WordDocument stream",
                    start, end
                ))
            })?;

            for (i, unit) in bytes.chunks_exact(width).enumerate() {
                let fc = piece.fc + (i * width) as u32;
                if !piece.is_unicode {
                    chars.push(PositionedChar {
                        ch: decode_cp1252(unit[0]),
                        fc,
                    });
                    continue;
                }

                let code = u16::from_le_bytes([unit[0], unit[1]]);
                match (pending_high.take(), code) {
                    (Some((high, high_fc)), 0xDC00..=0xDFFF) => {
                        let ch = char::decode_utf16([high, code])
                            .next()
                            .and_then(|r| r.ok())
                            .unwrap_or(char::REPLACEMENT_CHARACTER);
                        chars.push(PositionedChar { ch, fc: high_fc });
                    },
                    (stale, 0xD800..=0xDBFF) => {
                        if let Some((_, stale_fc)) = stale {
                            chars.push(PositionedChar {
                                ch: char::REPLACEMENT_CHARACTER,
                                fc: stale_fc,
                            });
                        }
                        pending_high = Some((code, fc));
                    },
                    (stale, _) => {
                        if let Some((_, stale_fc)) = stale {
                            chars.push(PositionedChar {
                                ch: char::REPLACEMENT_CHARACTER,
                                fc: stale_fc,
                            });
                        }
                        chars.push(PositionedChar {
                            ch: char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER),
                            fc,
                        });
                    },
                }
            }
        }

        if let Some((_, fc)) = pending_high {
            chars.push(PositionedChar {
                ch: char::REPLACEMENT_CHARACTER,
                fc,
            });
        }
        Ok(chars)
    }
}

fn decode_cp1252(byte: u8) -> char {
    if byte.is_ascii() {
        return byte as char;
    }
    let bytes = [byte];
    let (decoded, _) = WINDOWS_1252.decode_without_bom_handling(&bytes);
    decoded.chars().next().unwrap_or(char::REPLACEMENT_CHARACTER)
}
