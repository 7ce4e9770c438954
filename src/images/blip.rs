// BLIP (Binary Large Image or Picture) record parsing
//
// Inline pictures in Word documents store an OfficeArt record tree after the
// PICF header. Somewhere in that tree (directly, inside a container or
// embedded in a BSE record) sits the BLIP holding the actual image bytes.
//
// References:
// - [MS-ODRAW] 2.2.23: OfficeArtBlip records
// - [MS-ODRAW] 2.2.32: OfficeArtFBSE

use super::ImageError;
use crate::common::binary::{read_u16_le, read_u32_le};
use std::borrow::Cow;
use std::io::Read;

/// OfficeArt record header size
const HEADER_SIZE: usize = 8;

/// OfficeArtFBSE record type
const RECORD_BSE: u16 = 0xF007;

/// Fixed part of an OfficeArtFBSE before its embedded BLIP
const BSE_FIXED_SIZE: usize = 36;

/// Metafile header following the UID(s): sizes, bounds, compression, filter
const METAFILE_HEADER_SIZE: usize = 34;

/// Maximum container nesting followed while searching
const MAX_DEPTH: usize = 8;

/// Upper bound on the expected deflate ratio when reserving output space
const INFLATE_RESERVE_RATIO: usize = 4;

/// Type of BLIP record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlipType {
    Emf,
    Wmf,
    Pict,
    Jpeg,
    Png,
    Dib,
    Tiff,
}

impl BlipType {
    /// Parse BlipType from record type ID
    pub fn from_record_id(record_id: u16) -> Option<Self> {
        match record_id {
            0xF01A => Some(Self::Emf),
            0xF01B => Some(Self::Wmf),
            0xF01C => Some(Self::Pict),
            0xF01D | 0xF02A => Some(Self::Jpeg),
            0xF01E => Some(Self::Png),
            0xF01F => Some(Self::Dib),
            0xF029 => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Check if this is a metafile format (EMF, WMF, PICT)
    pub const fn is_metafile(&self) -> bool {
        matches!(self, Self::Emf | Self::Wmf | Self::Pict)
    }
}

/// OfficeArt record header
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    /// Record version (4 bits), 0xF for containers
    pub version: u8,
    /// Record instance (12 bits)
    pub instance: u16,
    pub record_type: u16,
    /// Record length (excluding header)
    pub length: u32,
}

impl RecordHeader {
    pub fn parse(data: &[u8], offset: usize) -> Option<Self> {
        let ver_inst = read_u16_le(data, offset).ok()?;
        Some(Self {
            version: (ver_inst & 0x0F) as u8,
            instance: ver_inst >> 4,
            record_type: read_u16_le(data, offset + 2).ok()?,
            length: read_u32_le(data, offset + 4).ok()?,
        })
    }

    #[inline]
    pub const fn is_container(&self) -> bool {
        self.version == 0x0F
    }
}

/// A BLIP record located inside a record tree.
#[derive(Debug, Clone)]
pub struct Blip<'data> {
    pub blip_type: BlipType,
    pub header: RecordHeader,
    /// Record body (without the 8-byte header), clamped to the buffer
    pub body: &'data [u8],
}

impl<'data> Blip<'data> {
    /// Number of 16-byte UIDs before the payload.
    ///
    /// Every BLIP instance has an odd-valued twin that carries a second UID.
    #[inline]
    fn uid_len(&self) -> usize {
        if self.header.instance & 1 == 1 { 32 } else { 16 }
    }

    /// Image bytes of the BLIP, decompressed when needed.
    pub fn payload(&self) -> Result<Cow<'data, [u8]>, ImageError> {
        let uid_len = self.uid_len();

        if !self.blip_type.is_metafile() {
            // UID(s) followed by a one-byte tag
            let start = uid_len + 1;
            return self
                .body
                .get(start..)
                .map(Cow::Borrowed)
                .ok_or_else(|| ImageError::Truncated("bitmap BLIP header".into()));
        }

        let header = self
            .body
            .get(uid_len..uid_len + METAFILE_HEADER_SIZE)
            .ok_or_else(|| ImageError::Truncated("metafile BLIP header".into()))?;
        let uncompressed_size = read_u32_le(header, 0).unwrap_or(0) as usize;
        let compressed_size = read_u32_le(header, 28).unwrap_or(0) as usize;
        let compression = header[32];

        let data = &self.body[uid_len + METAFILE_HEADER_SIZE..];
        let data = &data[..compressed_size.min(data.len())];

        // 0x00 = DEFLATE, 0xFE = stored
        if compression != 0 {
            return Ok(Cow::Borrowed(data));
        }

        // The declared size is untrusted; reserve from what is actually present
        let reserve = uncompressed_size.min(data.len().saturating_mul(INFLATE_RESERVE_RATIO));
        let mut decompressed = Vec::with_capacity(reserve);
        let result = if data.first() == Some(&0x78) {
            flate2::read::ZlibDecoder::new(data).read_to_end(&mut decompressed)
        } else {
            flate2::read::DeflateDecoder::new(data).read_to_end(&mut decompressed)
        };
        result.map_err(|e| ImageError::Decompression(e.to_string()))?;
        Ok(Cow::Owned(decompressed))
    }
}

/// Find the first BLIP in an OfficeArt record sequence.
pub fn find_blip(data: &[u8]) -> Option<Blip<'_>> {
    find_in(data, 0)
}

fn find_in(data: &[u8], depth: usize) -> Option<Blip<'_>> {
    if depth > MAX_DEPTH {
        return None;
    }

    let mut offset = 0;
    while let Some(header) = RecordHeader::parse(data, offset) {
        let body_start = offset + HEADER_SIZE;
        let body_end = body_start.saturating_add(header.length as usize).min(data.len());
        let body = &data[body_start..body_end];

        if let Some(blip_type) = BlipType::from_record_id(header.record_type) {
            return Some(Blip {
                blip_type,
                header,
                body,
            });
        }

        let nested = if header.is_container() {
            find_in(body, depth + 1)
        } else if header.record_type == RECORD_BSE {
            body.get(BSE_FIXED_SIZE..).and_then(|rest| find_in(rest, depth + 1))
        } else {
            None
        };
        if nested.is_some() {
            return nested;
        }

        if body_end <= offset || body_end >= data.len() {
            break;
        }
        offset = body_end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(ver_inst: u16, record_type: u16, body: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&ver_inst.to_le_bytes());
        data.extend_from_slice(&record_type.to_le_bytes());
        data.extend_from_slice(&(body.len() as u32).to_le_bytes());
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn test_bitmap_blip_inside_container() {
        let mut body = vec![0u8; 17]; // UID + tag
        body.extend_from_slice(b"\x89PNGdata");
        let blip = record(0x6E00, 0xF01E, &body);
        let sp = record(0x000F, 0xF004, &record(0x0002, 0xF00A, &[0u8; 8]));
        let container = [sp, record(0x000F, 0xF003, &blip)].concat();

        let found = find_blip(&container).unwrap();
        assert_eq!(found.blip_type, BlipType::Png);
        assert_eq!(found.payload().unwrap().as_ref(), b"\x89PNGdata");
    }

    #[test]
    fn test_second_uid_is_skipped() {
        let mut body = vec![0u8; 33];
        body.extend_from_slice(b"JFIF");
        let blip = record(0x46B0, 0xF01D, &body);
        let found = find_blip(&blip).unwrap();
        assert_eq!(found.payload().unwrap().as_ref(), b"JFIF");
    }

    #[test]
    fn test_blip_inside_bse() {
        let mut body = vec![0u8; 17];
        body.extend_from_slice(b"DIB!");
        let blip = record(0x7A80, 0xF01F, &body);
        let mut bse = vec![0u8; BSE_FIXED_SIZE];
        bse.extend_from_slice(&blip);
        let data = record(0x0052, RECORD_BSE, &bse);
        let found = find_blip(&data).unwrap();
        assert_eq!(found.blip_type, BlipType::Dib);
    }

    /// EMF BLIP body with a zlib payload and the given declared size.
    fn compressed_emf_body(emf: &[u8], declared_size: u32) -> Vec<u8> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(emf).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut body = vec![0u8; 16];
        let mut header = vec![0u8; METAFILE_HEADER_SIZE];
        header[0..4].copy_from_slice(&declared_size.to_le_bytes());
        header[28..32].copy_from_slice(&(compressed.len() as u32).to_le_bytes());
        header[32] = 0;
        header[33] = 0xFE;
        body.extend_from_slice(&header);
        body.extend_from_slice(&compressed);
        body
    }

    #[test]
    fn test_compressed_metafile() {
        let emf = b"pretend metafile bytes".to_vec();
        let body = compressed_emf_body(&emf, emf.len() as u32);

        let data = record(0x3D40, 0xF01A, &body);
        let found = find_blip(&data).unwrap();
        assert_eq!(found.blip_type, BlipType::Emf);
        assert_eq!(found.payload().unwrap().as_ref(), emf.as_slice());
    }

    #[test]
    fn test_declared_size_does_not_drive_allocation() {
        let emf = b"small metafile".to_vec();
        let body = compressed_emf_body(&emf, u32::MAX);

        let data = record(0x3D40, 0xF01A, &body);
        let found = find_blip(&data).unwrap();
        assert_eq!(found.payload().unwrap().as_ref(), emf.as_slice());
    }

    #[test]
    fn test_no_blip() {
        assert!(find_blip(&record(0x0002, 0xF00A, &[0u8; 8])).is_none());
        assert!(find_blip(&[0x01, 0x02]).is_none());
    }
}
