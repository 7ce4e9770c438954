/// CHPBinTable (Character Property Bin Table) parser.
///
/// Character properties live in two levels:
/// 1. PlcfBteChpx in the table stream: FC boundaries plus page numbers
/// 2. ChpxFkp pages in the WordDocument stream holding the actual runs
///
/// Runs are kept in FC space. Lookups go through the FC of each character,
/// which the piece table reports while decoding text.
///
/// References:
/// - [MS-DOC] 2.8.5 PlcfBteChpx
/// - [MS-DOC] 2.9.188 PnFkpChpx
use super::super::package::Result;
use super::chp::CharacterProperties;
use super::fkp::{ChpxFkp, FKP_PAGE_SIZE};
use crate::common::binary::read_u32_le;
use tracing::{debug, warn};

/// A run of file characters sharing the same properties.
#[derive(Debug, Clone)]
pub struct CharacterRun {
    pub fc_start: u32,
    pub fc_end: u32,
    pub properties: CharacterProperties,
}

/// All character runs of a document, sorted by FC.
#[derive(Debug, Default)]
pub struct ChpBinTable {
    runs: Vec<CharacterRun>,
}

impl ChpBinTable {
    /// Parse the bin table and every FKP page it references.
    ///
    /// Pages that fall outside the WordDocument stream are skipped with a
    /// warning; their text keeps default formatting.
    pub fn parse(plcf_bte_chpx: &[u8], word_document: &[u8]) -> Result<Self> {
        if plcf_bte_chpx.len() < 8 {
            return Ok(Self::default());
        }

        // (n + 1) FCs followed by n PnFkpChpx: size = 8n + 4
        let n = (plcf_bte_chpx.len() - 4) / 8;
        let mut runs = Vec::new();

        for i in 0..n {
            let pn_raw = read_u32_le(plcf_bte_chpx, (n + 1) * 4 + i * 4).unwrap_or(0);
            let pn = (pn_raw & 0x3F_FFFF) as usize;

            let page_offset = pn * FKP_PAGE_SIZE;
            let Some(page) = word_document.get(page_offset..page_offset + FKP_PAGE_SIZE) else {
                warn!(pn, "CHPX FKP page outside WordDocument stream");
                continue;
            };

            for run in ChpxFkp::parse(page)?.into_runs() {
                if run.fc_end <= run.fc_start {
                    continue;
                }
                runs.push(CharacterRun {
                    fc_start: run.fc_start,
                    fc_end: run.fc_end,
                    properties: CharacterProperties::from_grpprl(&run.grpprl),
                });
            }
        }

        runs.sort_by_key(|r| (r.fc_start, r.fc_end));

        // Later pages never overlap earlier ones in well-formed files; clamp if they do
        let mut merged: Vec<CharacterRun> = Vec::with_capacity(runs.len());
        for mut run in runs {
            if let Some(last) = merged.last() {
                if run.fc_end <= last.fc_end {
                    continue;
                }
                run.fc_start = run.fc_start.max(last.fc_end);
            }
            merged.push(run);
        }

        debug!(runs = merged.len(), "parsed character bin table");
        Ok(Self { runs: merged })
    }

    #[inline]
    pub fn runs(&self) -> &[CharacterRun] {
        &self.runs
    }

    /// Properties of the character stored at `fc`.
    ///
    /// Characters not covered by any run get default properties.
    pub fn properties_at(&self, fc: u32) -> CharacterProperties {
        let index = self.runs.partition_point(|r| r.fc_end <= fc);
        match self.runs.get(index) {
            Some(run) if run.fc_start <= fc => run.properties,
            _ => CharacterProperties::default(),
        }
    }
}
