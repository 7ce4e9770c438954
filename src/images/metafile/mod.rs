// Metafile rendering
//
// EMF and WMF pictures are replayed record by record onto a GDI canvas,
// written out as SVG and rasterized with resvg. Device independent bitmaps
// embedded in the records become PNG images inside that SVG.
//
// # Architecture
//
// - `gdi`: device context, object table and the shape canvas
// - `wmf` / `emf`: record walkers feeding the canvas
//
// References:
// - [MS-EMF] Enhanced Metafile Format
// - [MS-WMF] Windows Metafile Format

mod emf;
mod gdi;
mod wmf;

pub use emf::emf_to_svg;
pub use wmf::wmf_to_svg;

use super::{ImageError, encode_png};
use crate::common::binary::{read_u16_le, read_u32_le};
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::{tiny_skia, usvg};
use std::sync::{Arc, OnceLock};

/// BITMAPFILEHEADER size
const BMP_FILE_HEADER_SIZE: usize = 14;

/// Longest rendered side in pixels
const MAX_DIMENSION: u32 = 4096;

/// A metafile replayed as an SVG document of a fixed pixel size.
#[derive(Debug, Clone)]
pub struct Replay {
    pub svg: String,
    pub width: u32,
    pub height: u32,
}

/// Render an EMF to a raster image.
pub fn render_emf(emf: &[u8]) -> Result<DynamicImage, ImageError> {
    rasterize(&emf_to_svg(emf)?)
}

/// Render a WMF to a raster image.
pub fn render_wmf(wmf: &[u8]) -> Result<DynamicImage, ImageError> {
    rasterize(&wmf_to_svg(wmf)?)
}

/// Whole pixel size for a picture, with the longer side capped.
fn pixel_size(width: f64, height: f64) -> (u32, u32) {
    let (width, height) = (width.abs().max(1.0), height.abs().max(1.0));
    let scale = (f64::from(MAX_DIMENSION) / width.max(height)).min(1.0);
    (
        ((width * scale).round() as u32).max(1),
        ((height * scale).round() as u32).max(1),
    )
}

/// System fonts, loaded on first use.
fn fonts() -> Arc<usvg::fontdb::Database> {
    static FONTS: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = usvg::fontdb::Database::new();
            db.load_system_fonts();
            tracing::debug!(faces = db.len(), "loaded system fonts for metafile text");
            Arc::new(db)
        })
        .clone()
}

/// Rasterize a replayed metafile onto a white background.
pub fn rasterize(replay: &Replay) -> Result<DynamicImage, ImageError> {
    let options = usvg::Options {
        fontdb: fonts(),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(&replay.svg, &options)
        .map_err(|e| ImageError::Render(format!("invalid SVG: {e}")))?;

    let mut pixmap = tiny_skia::Pixmap::new(replay.width, replay.height)
        .ok_or_else(|| ImageError::Render(format!("cannot allocate {}x{} pixmap", replay.width, replay.height)))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // Opaque pixels read the same premultiplied or not
    let image = RgbaImage::from_raw(replay.width, replay.height, pixmap.take())
        .ok_or_else(|| ImageError::Render("pixmap size mismatch".into()))?;
    Ok(DynamicImage::ImageRgba8(image))
}

/// Decode a DIB found in a metafile record and re-encode it as PNG.
fn dib_png(dib: &[u8], bmi_size: Option<usize>) -> Result<Vec<u8>, ImageError> {
    let bmp = dib_to_bmp(dib, bmi_size)?;
    let image = image::load_from_memory_with_format(&bmp, ImageFormat::Bmp)?;
    encode_png(&image)
}

/// Wrap a DIB in a BITMAPFILEHEADER.
///
/// `bmi_size` is the size of the BITMAPINFO (header plus color table);
/// when `None` it is derived from the DIB header.
pub fn dib_to_bmp(dib: &[u8], bmi_size: Option<usize>) -> Result<Vec<u8>, ImageError> {
    let header_size = read_u32_le(dib, 0)
        .map_err(|_| ImageError::Truncated("DIB header".into()))? as usize;
    let bmi_size = match bmi_size {
        Some(size) => size,
        None => header_size + color_table_size(dib, header_size),
    };
    if bmi_size > dib.len() {
        return Err(ImageError::Truncated("DIB color table".into()));
    }

    let file_size = (BMP_FILE_HEADER_SIZE + dib.len()) as u32;
    let pixel_offset = (BMP_FILE_HEADER_SIZE + bmi_size) as u32;

    let mut bmp = Vec::with_capacity(file_size as usize);
    bmp.extend_from_slice(b"BM");
    bmp.extend_from_slice(&file_size.to_le_bytes());
    bmp.extend_from_slice(&[0u8; 4]);
    bmp.extend_from_slice(&pixel_offset.to_le_bytes());
    bmp.extend_from_slice(dib);
    Ok(bmp)
}

fn color_table_size(dib: &[u8], header_size: usize) -> usize {
    // BITMAPCOREHEADER: 3-byte RGBTRIPLE entries
    if header_size == 12 {
        let bit_count = read_u16_le(dib, 10).unwrap_or(24);
        return if bit_count <= 8 { 3 << bit_count } else { 0 };
    }

    let bit_count = read_u16_le(dib, 14).unwrap_or(24);
    let compression = read_u32_le(dib, 16).unwrap_or(0);
    let colors_used = read_u32_le(dib, 32).unwrap_or(0) as usize;

    let palette = if colors_used > 0 {
        colors_used * 4
    } else if bit_count <= 8 {
        (1usize << bit_count) * 4
    } else {
        0
    };

    // BI_BITFIELDS masks follow a plain BITMAPINFOHEADER
    let masks = if header_size == 40 && compression == 3 { 12 } else { 0 };
    palette + masks
}
