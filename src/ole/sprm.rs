/// SPRM (Single Property Modifier) parsing.
///
/// A grpprl is a packed list of SPRMs, each a 2-byte opcode followed by an
/// operand whose size is encoded in the opcode's top three bits
/// ([MS-DOC] 2.2.5.1). Operands are borrowed from the source buffer.
use crate::common::binary::{read_u16_le, read_u32_le};

/// sprmTDefTable carries a 2-byte length prefix instead of the usual single byte.
const SPRM_T_DEF_TABLE: u16 = 0xD608;

/// A single parsed SPRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sprm<'a> {
    /// SPRM opcode
    pub opcode: u16,
    /// Operand bytes, excluding any variable-length prefix
    pub operand: &'a [u8],
}

impl<'a> Sprm<'a> {
    /// Operation code (bits 0-8 of the opcode).
    #[inline]
    pub fn operation(&self) -> u16 {
        self.opcode & 0x01FF
    }

    /// Size code (bits 13-15 of the opcode).
    #[inline]
    pub fn size_code(&self) -> u8 {
        ((self.opcode & 0xE000) >> 13) as u8
    }

    #[inline]
    pub fn operand_byte(&self) -> Option<u8> {
        self.operand.first().copied()
    }

    #[inline]
    pub fn operand_word(&self) -> Option<u16> {
        read_u16_le(self.operand, 0).ok()
    }

    #[inline]
    pub fn operand_dword(&self) -> Option<u32> {
        read_u32_le(self.operand, 0).ok()
    }
}

/// Iterator over the SPRMs of a grpprl.
///
/// Iteration stops at the first truncated SPRM.
pub struct SprmIter<'a> {
    grpprl: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for SprmIter<'a> {
    type Item = Sprm<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let opcode = read_u16_le(self.grpprl, self.offset).ok()?;
        let mut offset = self.offset + 2;

        let operand_len = match (opcode & 0xE000) >> 13 {
            0 | 1 => 1,
            2 | 4 | 5 => 2,
            3 => 4,
            7 => 3,
            _ if opcode == SPRM_T_DEF_TABLE => {
                let cb = read_u16_le(self.grpprl, offset).ok()? as usize;
                offset += 2;
                cb.saturating_sub(1)
            },
            _ => {
                let cb = *self.grpprl.get(offset)? as usize;
                offset += 1;
                cb
            },
        };

        let operand = self.grpprl.get(offset..offset + operand_len)?;
        self.offset = offset + operand_len;
        Some(Sprm { opcode, operand })
    }
}

/// Iterate the SPRMs packed in `grpprl`.
pub fn parse_sprms(grpprl: &[u8]) -> SprmIter<'_> {
    SprmIter { grpprl, offset: 0 }
}
