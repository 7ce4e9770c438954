/// FKP (Formatted Disk Page) parser for DOC files.
///
/// A CHPX FKP is a 512-byte page in the WordDocument stream:
/// - `crun + 1` FCs at the start (4 bytes each)
/// - `crun` one-byte word offsets to the CHPXs
/// - CHPX data growing backwards from the end
/// - crun at byte 511
///
/// References:
/// - [MS-DOC] 2.9.30 ChpxFkp
/// - [MS-DOC] 2.9.29 Chpx
use super::super::package::{DocError, Result};
use crate::common::binary::read_u32_le;

/// Size of an FKP page in bytes (always 512)
pub const FKP_PAGE_SIZE: usize = 512;

/// One run of text sharing a CHPX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChpxRun {
    /// First FC of the run
    pub fc_start: u32,
    /// FC one past the end of the run
    pub fc_end: u32,
    /// Character property modifiers (empty for default formatting)
    pub grpprl: Vec<u8>,
}

/// CHPX FKP (Character Property Formatted Disk Page).
#[derive(Debug, Clone)]
pub struct ChpxFkp {
    runs: Vec<ChpxRun>,
}

impl ChpxFkp {
    /// Parse a CHPX FKP from a 512-byte page.
    pub fn parse(page: &[u8]) -> Result<Self> {
        if page.len() != FKP_PAGE_SIZE {
            return Err(DocError::Corrupted(format!(
                "FKP page must be {} bytes, got {}",
                FKP_PAGE_SIZE,
                page.len()
            )));
        }

        let crun = page[FKP_PAGE_SIZE - 1] as usize;
        let rgb_start = (crun + 1) * 4;
        if rgb_start + crun > FKP_PAGE_SIZE - 1 {
            return Err(DocError::Corrupted(format!("FKP crun {} overflows page", crun)));
        }

        let mut runs = Vec::with_capacity(crun);
        for i in 0..crun {
            let fc_start = read_u32_le(page, i * 4).unwrap_or(0);
            let fc_end = read_u32_le(page, (i + 1) * 4).unwrap_or(0);

            // Word offset; zero means the run has no CHPX
            let word_offset = page[rgb_start + i] as usize;
            let grpprl = if word_offset == 0 {
                Vec::new()
            } else {
                let offset = word_offset * 2;
                let cb = page.get(offset).copied().unwrap_or(0) as usize;
                page.get(offset + 1..offset + 1 + cb)
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default()
            };

            runs.push(ChpxRun {
                fc_start,
                fc_end,
                grpprl,
            });
        }

        Ok(Self { runs })
    }

    #[inline]
    pub fn runs(&self) -> &[ChpxRun] {
        &self.runs
    }

    pub fn into_runs(self) -> Vec<ChpxRun> {
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ole::doc::test_support::chpx_page;

    #[test]
    fn test_parse_runs() {
        let italic: &[u8] = &[0x36, 0x08, 0x01];
        let page = chpx_page(&[1024, 1030, 1040], &[italic, &[]]);
        let fkp = ChpxFkp::parse(&page).unwrap();

        assert_eq!(fkp.runs().len(), 2);
        assert_eq!(fkp.runs()[0].fc_start, 1024);
        assert_eq!(fkp.runs()[0].fc_end, 1030);
        assert_eq!(fkp.runs()[0].grpprl, italic);
        assert!(fkp.runs()[1].grpprl.is_empty());
    }

    #[test]
    fn test_wrong_page_size() {
        assert!(ChpxFkp::parse(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_crun_overflow() {
        let mut page = vec![0u8; FKP_PAGE_SIZE];
        page[FKP_PAGE_SIZE - 1] = 255;
        assert!(ChpxFkp::parse(&page).is_err());
    }
}
