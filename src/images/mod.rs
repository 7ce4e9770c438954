// Inline picture processing
//
// Raw picture bytes pulled from a document are sniffed, decoded (metafiles
// by replaying their records), downscaled, re-encoded as PNG and wrapped in
// an HTML `<img>` data URI.
//
// # Architecture
//
// - `blip`: OfficeArt BLIP record lookup and payload decompression
// - `metafile`: EMF / WMF playback and rasterization

pub mod blip;
pub mod metafile;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Error types for picture decoding and encoding.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Truncated picture data: {0}")]
    Truncated(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Unsupported picture format: {0}")]
    UnsupportedFormat(&'static str),

    #[error("Metafile rendering failed: {0}")]
    Render(String),

    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),
}

/// Picture formats recognized from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Emf,
    Wmf,
    Unknown,
}

impl PictureFormat {
    /// Detect the format from the leading bytes.
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Self::Png
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if data.starts_with(b"GIF8") {
            Self::Gif
        } else if data.starts_with(b"BM") {
            Self::Bmp
        } else if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
            Self::Tiff
        } else if data.len() >= 44 && data[0..4] == [0x01, 0x00, 0x00, 0x00] && &data[40..44] == b" EMF" {
            Self::Emf
        } else if data.starts_with(&[0xD7, 0xCD, 0xC6, 0x9A])
            || data.starts_with(&[0x01, 0x00, 0x09, 0x00])
            || data.starts_with(&[0x02, 0x00, 0x09, 0x00])
        {
            Self::Wmf
        } else {
            Self::Unknown
        }
    }
}

/// Decode picture bytes into a raster image.
pub fn decode(data: &[u8]) -> Result<DynamicImage, ImageError> {
    let format = match PictureFormat::sniff(data) {
        PictureFormat::Png => ImageFormat::Png,
        PictureFormat::Jpeg => ImageFormat::Jpeg,
        PictureFormat::Gif => ImageFormat::Gif,
        PictureFormat::Bmp => ImageFormat::Bmp,
        PictureFormat::Tiff => ImageFormat::Tiff,
        PictureFormat::Emf => return metafile::render_emf(data),
        PictureFormat::Wmf => return metafile::render_wmf(data),
        PictureFormat::Unknown => return Err(ImageError::UnsupportedFormat("unrecognized signature")),
    };
    Ok(image::load_from_memory_with_format(data, format)?)
}

/// Target dimensions after dividing by `divisor`: floor division, at least 1px.
#[inline]
pub fn scaled_dimensions(width: u32, height: u32, divisor: u32) -> (u32, u32) {
    let divisor = divisor.max(1);
    ((width / divisor).max(1), (height / divisor).max(1))
}

/// Downscale an image by an integer divisor.
pub fn downscale(image: &DynamicImage, divisor: u32) -> DynamicImage {
    let (width, height) = scaled_dimensions(image.width(), image.height(), divisor);
    if (width, height) == (image.width(), image.height()) {
        return image.clone();
    }
    image.resize_exact(width, height, FilterType::Triangle)
}

/// Encode an image as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// HTML `<img>` tag carrying a PNG as a base64 data URI.
pub fn img_tag(png: &[u8]) -> String {
    format!(
        r#"<img align="Middle" src="data:image/png;base64,{}" />"#,
        STANDARD.encode(png)
    )
}

/// Decode, downscale and inline a picture as an `<img>` tag.
pub fn inline_img(data: &[u8], divisor: u32) -> Result<String, ImageError> {
    let image = decode(data)?;
    let scaled = downscale(&image, divisor);
    tracing::debug!(
        from = ?(image.width(), image.height()),
        to = ?(scaled.width(), scaled.height()),
        "inlining picture"
    );
    Ok(img_tag(&encode_png(&scaled)?))
}
