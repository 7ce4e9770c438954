/// Inline picture extraction from the Data stream.
///
/// An inline picture's CHP points (sprmCPicLocation) at a PICF header in the
/// Data stream. The header is followed by an OfficeArt record tree holding
/// the BLIP, or in older files by the raw (possibly compressed) image.
///
/// PICF layout ([MS-DOC] 2.9.192):
/// - 0x00 lcb: total length including the header
/// - 0x04 cbHeader: header size (0x44)
/// - 0x06 mfpf.mm: 0x66 (MM_SHAPEFILE) means a picture name follows the header
use crate::common::binary::{read_u16_le, read_u32_le};
use crate::images::blip::{BlipType, find_blip};
use crate::images::{ImageError, metafile};
use memchr::memmem;
use std::io::Read;
use tracing::debug;

/// Minimum PICF header size
const PICF_MIN_HEADER: usize = 0x44;

const MM_SHAPEFILE: u16 = 0x66;

/// Compressed image signatures at offset 32 of a legacy picture block
const COMPRESSED_SIGNATURES: [[u8; 3]; 2] = [[0xFE, 0x78, 0xDA], [0xFE, 0x78, 0x9C]];
const COMPRESSED_OFFSET: usize = 32;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Read the image bytes of the picture whose PICF starts at `offset`.
///
/// Device independent bitmaps are returned wrapped as BMP files so that
/// every result is self-describing.
pub fn picture_bytes(data_stream: &[u8], offset: u32) -> Result<Vec<u8>, ImageError> {
    let start = offset as usize;
    let lcb = read_u32_le(data_stream, start)
        .map_err(|_| ImageError::Truncated(format!("PICF at 0x{:X}", offset)))? as usize;
    let cb_header = read_u16_le(data_stream, start + 4).unwrap_or(0) as usize;
    let mm = read_u16_le(data_stream, start + 6).unwrap_or(0);

    if cb_header < PICF_MIN_HEADER || lcb < cb_header {
        return Err(ImageError::Truncated(format!(
            "PICF at 0x{:X} has lcb {} and cbHeader {}",
            offset, lcb, cb_header
        )));
    }

    let end = (start + lcb).min(data_stream.len());
    let mut content_start = start + cb_header;
    if mm == MM_SHAPEFILE {
        let name_len = data_stream.get(content_start).copied().unwrap_or(0) as usize;
        content_start += 1 + name_len;
    }
    let content = data_stream
        .get(content_start..end)
        .ok_or_else(|| ImageError::Truncated(format!("picture content at 0x{:X}", offset)))?;

    if let Some(blip) = find_blip(content) {
        debug!(offset, blip_type = ?blip.blip_type, "found BLIP");
        let payload = blip.payload()?;
        return match blip.blip_type {
            BlipType::Dib => metafile::dib_to_bmp(&payload, None),
            BlipType::Pict => Err(ImageError::UnsupportedFormat("PICT")),
            _ => Ok(payload.into_owned()),
        };
    }

    legacy_content(content)
}

/// Pictures without an OfficeArt tree: compressed block or embedded PNG.
fn legacy_content(content: &[u8]) -> Result<Vec<u8>, ImageError> {
    let signature = content.get(COMPRESSED_OFFSET..COMPRESSED_OFFSET + 3);
    if signature.is_some_and(|sig| COMPRESSED_SIGNATURES.iter().any(|s| s == sig)) {
        let mut decompressed = Vec::new();
        flate2::read::ZlibDecoder::new(&content[COMPRESSED_OFFSET + 1..])
            .read_to_end(&mut decompressed)
            .map_err(|e| ImageError::Decompression(format!("Possibly corrupt compression: {}", e)))?;
        return Ok(decompressed);
    }

    match memmem::find(content, &PNG_SIGNATURE) {
        Some(pos) => Ok(content[pos..].to_vec()),
        None => Ok(content.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ole::doc::test_support::{picf, png_blip};
    use std::io::Write;

    #[test]
    fn test_picture_from_blip() {
        let png = b"\x89PNG\r\n\x1a\nrest".to_vec();
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&picf(&png_blip(&png)));

        assert_eq!(picture_bytes(&data, 16).unwrap(), png);
    }

    #[test]
    fn test_shapefile_name_is_skipped() {
        let png = b"\x89PNG\r\n\x1a\nxyz".to_vec();
        let mut block = picf(&[&[3u8, b'a', b'b', b'c'][..], &png_blip(&png)].concat());
        block[6..8].copy_from_slice(&MM_SHAPEFILE.to_le_bytes());
        assert_eq!(picture_bytes(&block, 0).unwrap(), png);
    }

    #[test]
    fn test_legacy_compressed_block() {
        let raw = b"\x89PNG\r\n\x1a\ncompressed".to_vec();
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
        encoder.write_all(&raw).unwrap();
        let zlib = encoder.finish().unwrap();

        let mut content = vec![0u8; COMPRESSED_OFFSET];
        content.push(0xFE);
        content.extend_from_slice(&zlib);
        assert_eq!(&content[33..35], &[0x78, 0xDA]);
        assert_eq!(picture_bytes(&picf(&content), 0).unwrap(), raw);
    }

    #[test]
    fn test_legacy_png_search() {
        let mut content = b"junk header".to_vec();
        content.extend_from_slice(&PNG_SIGNATURE);
        content.extend_from_slice(b"tail");
        let bytes = picture_bytes(&picf(&content), 0).unwrap();
        assert!(bytes.starts_with(&PNG_SIGNATURE));
    }

    #[test]
    fn test_invalid_offset() {
        assert!(picture_bytes(&[0u8; 10], 200).is_err());
        assert!(picture_bytes(&[0u8; 100], 0).is_err());
    }
}
