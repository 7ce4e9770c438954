/// File Information Block (FIB) parser for DOC files.
///
/// The FIB is located at the beginning of the WordDocument stream and holds
/// the format version, the table stream selector and the (offset, length)
/// pairs locating every other structure.
use super::super::package::{DocError, Result};
use crate::common::binary::{read_u16_le, read_u32_le};

/// Minimum FIB size in bytes (the base FIB structure)
const FIB_BASE_SIZE: usize = 32;

/// Word 97 and later.
const WORD97_MAGIC: u16 = 0xA5EC;

/// Word 6.0 / Word 95.
const WORD6_MAGIC: u16 = 0xA5DC;

/// Offset of ccpText (main document length in CPs) inside FibRgLw97.
const CCP_TEXT_OFFSET: usize = 0x4C;

/// Offset of the FibRgFcLcb97 array.
const FC_LCB_OFFSET: usize = 154;

/// Index of fcPlcfBteChpx/lcbPlcfBteChpx in FibRgFcLcb97.
pub const FC_PLCF_BTE_CHPX: usize = 12;

/// Index of fcClx/lcbClx in FibRgFcLcb97.
pub const FC_CLX: usize = 33;

/// File Information Block.
#[derive(Debug, Clone)]
pub struct FileInformationBlock {
    /// File format version
    nfib: u16,
    /// Flags including encryption and table stream selection
    flags: u16,
    /// Number of characters in the main document text
    ccp_text: u32,
    /// Raw FibRgFcLcb bytes
    fc_lcb: Vec<u8>,
}

impl FileInformationBlock {
    /// Parse a FIB from the WordDocument stream.
    pub fn parse(word_document: &[u8]) -> Result<Self> {
        if word_document.len() < FIB_BASE_SIZE {
            return Err(DocError::Corrupted(
                "WordDocument stream too short for FIB".to_string(),
            ));
        }

        let magic = read_u16_le(word_document, 0).unwrap_or(0);
        match magic {
            WORD97_MAGIC => {},
            WORD6_MAGIC => {
                return Err(DocError::InvalidFormat(
                    "Word 6.0/95 documents are not supported".to_string(),
                ));
            },
            other => {
                return Err(DocError::InvalidFormat(format!(
                    "Invalid FIB magic number: 0x{:04X}",
                    other
                )));
            },
        }

        let nfib = read_u16_le(word_document, 2).unwrap_or(0);
        let flags = read_u16_le(word_document, 10).unwrap_or(0);
        let ccp_text = read_u32_le(word_document, CCP_TEXT_OFFSET).map_err(|_| {
            DocError::Corrupted("FIB too short for ccpText".to_string())
        })?;

        let fc_lcb = word_document
            .get(FC_LCB_OFFSET..)
            .map(|rest| rest.to_vec())
            .unwrap_or_default();

        Ok(Self {
            nfib,
            flags,
            ccp_text,
            fc_lcb,
        })
    }

    /// Get the file format version.
    #[inline]
    pub fn version(&self) -> u16 {
        self.nfib
    }

    /// Get which table stream to use.
    ///
    /// Returns `true` for "1Table", `false` for "0Table".
    #[inline]
    pub fn which_table_stream(&self) -> bool {
        (self.flags & 0x0200) != 0
    }

    /// Name of the table stream this document uses.
    #[inline]
    pub fn table_stream_name(&self) -> &'static str {
        if self.which_table_stream() { "1Table" } else { "0Table" }
    }

    /// Check if the document is encrypted (fEncrypted).
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        (self.flags & 0x0100) != 0
    }

    /// Number of characters in the main document story.
    #[inline]
    pub fn ccp_text(&self) -> u32 {
        self.ccp_text
    }

    /// Get an (offset, length) pair from the FibRgFcLcb array.
    pub fn table_pointer(&self, index: usize) -> Option<(u32, u32)> {
        let entry = index * 8;
        let offset = read_u32_le(&self.fc_lcb, entry).ok()?;
        let length = read_u32_le(&self.fc_lcb, entry + 4).ok()?;
        Some((offset, length))
    }

    /// Slice the structure at `index` out of the table stream.
    ///
    /// Returns `None` when the structure is absent (zero length).
    pub fn table_slice<'a>(&self, index: usize, table_stream: &'a [u8]) -> Result<Option<&'a [u8]>> {
        let (offset, length) = self.table_pointer(index).ok_or_else(|| {
            DocError::Corrupted(format!("FIB has no FibRgFcLcb entry {}", index))
        })?;
        if length == 0 {
            return Ok(None);
        }

        let start = offset as usize;
        let end = start + length as usize;
        table_stream.get(start..end).map(Some).ok_or_else(|| {
            DocError::Corrupted(format!(
                "Structure {} at {}..{} exceeds table stream length {}",
                index,
                start,
                end,
                table_stream.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fib_bytes() -> Vec<u8> {
        let mut data = vec![0u8; 512];
        data[0..2].copy_from_slice(&WORD97_MAGIC.to_le_bytes());
        data[2..4].copy_from_slice(&0x00C1u16.to_le_bytes());
        data
    }

    #[test]
    fn test_fib_min_size() {
        assert!(FileInformationBlock::parse(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_fib_magic_validation() {
        let mut data = fib_bytes();
        data[0] = 0xFF;
        data[1] = 0xFF;
        assert!(matches!(
            FileInformationBlock::parse(&data),
            Err(DocError::InvalidFormat(_))
        ));

        data[0..2].copy_from_slice(&WORD6_MAGIC.to_le_bytes());
        assert!(FileInformationBlock::parse(&data).is_err());
    }

    #[test]
    fn test_fib_fields() {
        let mut data = fib_bytes();
        data[11] = 0x02; // fWhichTblStm
        data[CCP_TEXT_OFFSET..CCP_TEXT_OFFSET + 4].copy_from_slice(&42u32.to_le_bytes());
        let clx = FC_LCB_OFFSET + FC_CLX * 8;
        data[clx..clx + 4].copy_from_slice(&100u32.to_le_bytes());
        data[clx + 4..clx + 8].copy_from_slice(&21u32.to_le_bytes());

        let fib = FileInformationBlock::parse(&data).unwrap();
        assert_eq!(fib.version(), 0x00C1);
        assert!(fib.which_table_stream());
        assert_eq!(fib.table_stream_name(), "1Table");
        assert!(!fib.is_encrypted());
        assert_eq!(fib.ccp_text(), 42);
        assert_eq!(fib.table_pointer(FC_CLX), Some((100, 21)));
    }

    #[test]
    fn test_table_slice_bounds() {
        let mut data = fib_bytes();
        let bte = FC_LCB_OFFSET + FC_PLCF_BTE_CHPX * 8;
        data[bte..bte + 4].copy_from_slice(&4u32.to_le_bytes());
        data[bte + 4..bte + 8].copy_from_slice(&8u32.to_le_bytes());
        let fib = FileInformationBlock::parse(&data).unwrap();

        let table = [0u8; 16];
        assert_eq!(fib.table_slice(FC_PLCF_BTE_CHPX, &table).unwrap().map(<[u8]>::len), Some(8));
        assert!(fib.table_slice(FC_PLCF_BTE_CHPX, &table[..10]).is_err());
        assert_eq!(fib.table_slice(FC_CLX, &table).unwrap(), None);
    }
}
