//! Fixture writers for Word binary structures used by the parser tests.

use super::parts::fib::{FC_CLX, FC_PLCF_BTE_CHPX};
use super::parts::fkp::FKP_PAGE_SIZE;
use crate::ole::test_support::CompoundBuilder;

/// First FC of the text in fixture documents.
const TEXT_FC: usize = 1024;

/// Offset of the FibRgFcLcb97 array.
const FC_LCB_OFFSET: usize = 154;

/// Build a CHPX FKP page from FC boundaries and per-run grpprls.
pub(crate) fn chpx_page(fcs: &[u32], grpprls: &[&[u8]]) -> Vec<u8> {
    let mut page = vec![0u8; FKP_PAGE_SIZE];
    let crun = grpprls.len();
    for (i, fc) in fcs.iter().enumerate() {
        page[i * 4..i * 4 + 4].copy_from_slice(&fc.to_le_bytes());
    }
    let rgb_start = (crun + 1) * 4;
    let mut tail = FKP_PAGE_SIZE - 1;
    for (i, grpprl) in grpprls.iter().enumerate() {
        if grpprl.is_empty() {
            continue;
        }
        tail -= grpprl.len() + 1;
        tail &= !1;
        page[tail] = grpprl.len() as u8;
        page[tail + 1..tail + 1 + grpprl.len()].copy_from_slice(grpprl);
        page[rgb_start + i] = (tail / 2) as u8;
    }
    page[FKP_PAGE_SIZE - 1] = crun as u8;
    page
}

/// Wrap picture content in a 0x44-byte PICF header.
pub(crate) fn picf(content: &[u8]) -> Vec<u8> {
    let mut block = vec![0u8; 0x44];
    block[0..4].copy_from_slice(&((0x44 + content.len()) as u32).to_le_bytes());
    block[4..6].copy_from_slice(&0x44u16.to_le_bytes());
    block[6..8].copy_from_slice(&0x64u16.to_le_bytes());
    block.extend_from_slice(content);
    block
}

/// An OfficeArtBlipPNG record inside an OfficeArtSpContainer sibling.
pub(crate) fn png_blip(png: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    // Empty shape container first, as Word writes it
    data.extend_from_slice(&0x000Fu16.to_le_bytes());
    data.extend_from_slice(&0xF004u16.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());

    data.extend_from_slice(&0x6E00u16.to_le_bytes());
    data.extend_from_slice(&0xF01Eu16.to_le_bytes());
    data.extend_from_slice(&((17 + png.len()) as u32).to_le_bytes());
    data.extend_from_slice(&[0u8; 17]);
    data.extend_from_slice(png);
    data
}

pub(crate) const ITALIC: &[u8] = &[0x36, 0x08, 0x01];
pub(crate) const UNDERLINE: &[u8] = &[0x3E, 0x2A, 0x01];
pub(crate) const SUPERSCRIPT: &[u8] = &[0x48, 0x2A, 0x01];
pub(crate) const SUBSCRIPT: &[u8] = &[0x48, 0x2A, 0x02];

/// Streams of a generated Word 97 document.
pub(crate) struct DocStreams {
    pub word_document: Vec<u8>,
    pub table: Vec<u8>,
    pub data: Vec<u8>,
}

/// Builds a minimal Word 97 document: one Unicode piece, one CHPX page.
pub(crate) struct DocBuilder {
    runs: Vec<(String, Vec<u8>)>,
    data: Vec<u8>,
}

impl DocBuilder {
    pub(crate) fn new() -> Self {
        Self {
            runs: Vec::new(),
            // Keep picture offsets away from zero
            data: vec![0u8; 8],
        }
    }

    /// Append text carrying the given CHPX grpprl.
    pub(crate) fn text(mut self, text: &str, grpprl: &[u8]) -> Self {
        self.runs.push((text.to_string(), grpprl.to_vec()));
        self
    }

    /// Append an inline picture anchor whose PICF wraps `image` in a BLIP.
    pub(crate) fn picture(mut self, image: &[u8]) -> Self {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(&picf(&png_blip(image)));

        let mut grpprl = vec![0x55, 0x08, 0x01];
        grpprl.extend_from_slice(&[0x03, 0x6A]);
        grpprl.extend_from_slice(&offset.to_le_bytes());
        self.runs.push(("\u{1}".to_string(), grpprl));
        self
    }

    pub(crate) fn streams(&self) -> DocStreams {
        let mut fcs = vec![TEXT_FC as u32];
        let mut text = Vec::new();
        for (run, _) in &self.runs {
            for unit in run.encode_utf16() {
                text.extend_from_slice(&unit.to_le_bytes());
            }
            fcs.push((TEXT_FC + text.len()) as u32);
        }
        let ccp_text = (text.len() / 2) as u32;

        let mut word_document = vec![0u8; TEXT_FC];
        word_document.extend_from_slice(&text);
        let pn = word_document.len().div_ceil(FKP_PAGE_SIZE);
        word_document.resize(pn * FKP_PAGE_SIZE, 0);
        let grpprls: Vec<&[u8]> = self.runs.iter().map(|(_, g)| g.as_slice()).collect();
        word_document.extend_from_slice(&chpx_page(&fcs, &grpprls));

        // Table stream: CLX then PlcfBteChpx
        let mut table = vec![0x02];
        let mut plc = Vec::new();
        plc.extend_from_slice(&0u32.to_le_bytes());
        plc.extend_from_slice(&ccp_text.to_le_bytes());
        plc.extend_from_slice(&0u16.to_le_bytes());
        plc.extend_from_slice(&(TEXT_FC as u32).to_le_bytes());
        plc.extend_from_slice(&0u16.to_le_bytes());
        table.extend_from_slice(&(plc.len() as u32).to_le_bytes());
        table.extend_from_slice(&plc);
        let clx_len = table.len() as u32;

        let bte_offset = table.len() as u32;
        table.extend_from_slice(&(TEXT_FC as u32).to_le_bytes());
        table.extend_from_slice(&fcs[fcs.len() - 1].to_le_bytes());
        table.extend_from_slice(&(pn as u32).to_le_bytes());
        let bte_len = table.len() as u32 - bte_offset;

        word_document[0..2].copy_from_slice(&0xA5ECu16.to_le_bytes());
        word_document[2..4].copy_from_slice(&0x00C1u16.to_le_bytes());
        word_document[10..12].copy_from_slice(&0x0200u16.to_le_bytes());
        word_document[0x4C..0x50].copy_from_slice(&ccp_text.to_le_bytes());
        let clx = FC_LCB_OFFSET + FC_CLX * 8;
        word_document[clx..clx + 4].copy_from_slice(&0u32.to_le_bytes());
        word_document[clx + 4..clx + 8].copy_from_slice(&clx_len.to_le_bytes());
        let bte = FC_LCB_OFFSET + FC_PLCF_BTE_CHPX * 8;
        word_document[bte..bte + 4].copy_from_slice(&bte_offset.to_le_bytes());
        word_document[bte + 4..bte + 8].copy_from_slice(&bte_len.to_le_bytes());

        DocStreams {
            word_document,
            table,
            data: self.data.clone(),
        }
    }

    /// Serialize as a compound file.
    pub(crate) fn build(&self) -> Vec<u8> {
        let streams = self.streams();
        CompoundBuilder::new()
            .stream("WordDocument", streams.word_document)
            .stream("1Table", streams.table)
            .stream("Data", streams.data)
            .build()
    }
}
