// EMF playback
//
// Walks the records of an Enhanced Metafile and replays the drawing records
// onto a GDI canvas. The header's device bounds give the output size; the
// window and viewport records map them back to logical coordinates.
//
// References:
// - [MS-EMF] 2.3 EMF Records
// - [MS-EMF] 2.2.9 Header Object

use super::gdi::{ArcKind, Brush, Canvas, Color, FillRule, Font, GdiObject, Pen, Point, Rect};
use super::{Replay, dib_png, pixel_size};
use crate::common::binary::{read_u16_le, read_u32_le};
use crate::images::ImageError;

const EMR_HEADER: u32 = 1;
const EMR_POLYBEZIER: u32 = 2;
const EMR_POLYGON: u32 = 3;
const EMR_POLYLINE: u32 = 4;
const EMR_POLYBEZIERTO: u32 = 5;
const EMR_POLYLINETO: u32 = 6;
const EMR_POLYPOLYLINE: u32 = 7;
const EMR_POLYPOLYGON: u32 = 8;
const EMR_SETWINDOWEXTEX: u32 = 9;
const EMR_SETWINDOWORGEX: u32 = 10;
const EMR_SETVIEWPORTEXTEX: u32 = 11;
const EMR_SETVIEWPORTORGEX: u32 = 12;
const EMR_EOF: u32 = 14;
const EMR_SETPOLYFILLMODE: u32 = 19;
const EMR_SETTEXTALIGN: u32 = 22;
const EMR_SETTEXTCOLOR: u32 = 24;
const EMR_MOVETOEX: u32 = 27;
const EMR_SAVEDC: u32 = 33;
const EMR_RESTOREDC: u32 = 34;
const EMR_SELECTOBJECT: u32 = 37;
const EMR_CREATEPEN: u32 = 38;
const EMR_CREATEBRUSHINDIRECT: u32 = 39;
const EMR_DELETEOBJECT: u32 = 40;
const EMR_ELLIPSE: u32 = 42;
const EMR_RECTANGLE: u32 = 43;
const EMR_ROUNDRECT: u32 = 44;
const EMR_ARC: u32 = 45;
const EMR_CHORD: u32 = 46;
const EMR_PIE: u32 = 47;
const EMR_LINETO: u32 = 54;
const EMR_BEGINPATH: u32 = 59;
const EMR_ENDPATH: u32 = 60;
const EMR_CLOSEFIGURE: u32 = 61;
const EMR_FILLPATH: u32 = 62;
const EMR_STROKEANDFILLPATH: u32 = 63;
const EMR_STROKEPATH: u32 = 64;
const EMR_BITBLT: u32 = 76;
const EMR_STRETCHBLT: u32 = 77;
const EMR_STRETCHDIBITS: u32 = 81;
const EMR_EXTCREATEFONTINDIRECTW: u32 = 82;
const EMR_EXTTEXTOUTA: u32 = 83;
const EMR_EXTTEXTOUTW: u32 = 84;
const EMR_POLYBEZIER16: u32 = 85;
const EMR_POLYLINETO16: u32 = 89;
const EMR_POLYPOLYLINE16: u32 = 90;
const EMR_POLYPOLYGON16: u32 = 91;
const EMR_EXTCREATEPEN: u32 = 95;

/// Stock object indexes carry the high bit
const STOCK_OBJECT: u32 = 0x8000_0000;

/// Offset of the 16-bit record types from their 32-bit counterparts
const POINTS16_DELTA: u32 = EMR_POLYBEZIER16 - EMR_POLYBEZIER;

/// One record, type and size included; offsets are from the record start.
struct Record<'a>(&'a [u8]);

impl Record<'_> {
    fn u32(&self, offset: usize) -> Option<u32> {
        read_u32_le(self.0, offset).ok()
    }

    fn i32(&self, offset: usize) -> Option<f64> {
        self.u32(offset).map(|v| f64::from(v as i32))
    }

    fn point(&self, offset: usize) -> Option<Point> {
        Some(Point::new(self.i32(offset)?, self.i32(offset + 4)?))
    }

    fn rect(&self, offset: usize) -> Option<Rect> {
        Some(Rect::new(
            self.i32(offset)?,
            self.i32(offset + 4)?,
            self.i32(offset + 8)?,
            self.i32(offset + 12)?,
        ))
    }

    /// `count` points from `offset`, as i32 pairs or as i16 pairs when `short`.
    fn points(&self, offset: usize, count: usize, short: bool) -> Option<Vec<Point>> {
        let width = if short { 2 } else { 4 };
        let len = count.checked_mul(width * 2)?;
        let bytes = self.0.get(offset..offset.checked_add(len)?)?;
        let points = bytes
            .chunks_exact(width * 2)
            .map(|p| {
                if short {
                    Point::new(
                        f64::from(i16::from_le_bytes([p[0], p[1]])),
                        f64::from(i16::from_le_bytes([p[2], p[3]])),
                    )
                } else {
                    Point::new(
                        f64::from(i32::from_le_bytes([p[0], p[1], p[2], p[3]])),
                        f64::from(i32::from_le_bytes([p[4], p[5], p[6], p[7]])),
                    )
                }
            })
            .collect();
        Some(points)
    }

    /// Bytes at `offset` and `len` taken from the u32 fields at `at` and `at + 4`.
    fn block(&self, at: usize) -> Option<&[u8]> {
        let offset = self.u32(at)? as usize;
        let len = self.u32(at + 4)? as usize;
        self.0.get(offset..offset.checked_add(len)?)
    }
}

/// Size fields of the EMF header record.
struct Header {
    /// Inclusive device-unit bounds of the picture
    bounds: Rect,
    /// Picture frame in 0.01 mm
    frame: Rect,
    device: Point,
    millimeters: Point,
}

impl Header {
    fn parse(emf: &[u8]) -> Result<Self, ImageError> {
        let record = Record(emf);
        if record.u32(0) != Some(EMR_HEADER) {
            return Err(ImageError::Truncated("EMF header".into()));
        }
        let fields = || {
            Some(Header {
                bounds: record.rect(8)?,
                frame: record.rect(24)?,
                device: record.point(72)?,
                millimeters: record.point(80)?,
            })
        };
        fields().ok_or_else(|| ImageError::Truncated("EMF header".into()))
    }

    /// Device rectangle covered by the picture, when the header gives one.
    fn device_rect(&self) -> Option<Rect> {
        let b = self.bounds;
        if b.right > b.left && b.bottom > b.top {
            return Some(Rect::new(b.left, b.top, b.right + 1.0, b.bottom + 1.0));
        }
        let f = self.frame;
        if f.right > f.left && f.bottom > f.top && self.millimeters.x > 0.0 && self.millimeters.y > 0.0 {
            // Pixels per 0.01 mm
            let sx = self.device.x / (self.millimeters.x * 100.0);
            let sy = self.device.y / (self.millimeters.y * 100.0);
            return Some(Rect::new(f.left * sx, f.top * sy, f.right * sx, f.bottom * sy));
        }
        None
    }
}

/// Replay an EMF as SVG.
pub fn emf_to_svg(emf: &[u8]) -> Result<Replay, ImageError> {
    let header = Header::parse(emf)?;

    let mut canvas = Canvas::new();
    let mut offset = 0;
    while let (Ok(kind), Ok(size)) = (read_u32_le(emf, offset), read_u32_le(emf, offset + 4)) {
        let size = size as usize;
        if kind == EMR_EOF || size < 8 || size > emf.len() - offset {
            break;
        }
        if play(&mut canvas, kind, &Record(&emf[offset..offset + size])).is_none() {
            tracing::trace!(kind, "skipping malformed EMF record");
        }
        offset += size;
    }

    let (window, width, height) = match header.device_rect() {
        Some(device) => {
            let (width, height) = pixel_size(device.width(), device.height());
            (canvas.mapping().device_to_logical(device), width, height)
        },
        None => {
            let window = canvas
                .drawing_bounds()
                .unwrap_or(Rect::new(0.0, 0.0, 1.0, 1.0));
            let (width, height) = pixel_size(window.width(), window.height());
            (window, width, height)
        },
    };

    Ok(Replay {
        svg: canvas.into_svg(window, width, height),
        width,
        height,
    })
}

/// Apply one record to the canvas; `None` when it is too short.
fn play(canvas: &mut Canvas, kind: u32, r: &Record<'_>) -> Option<()> {
    match kind {
        EMR_POLYBEZIER..=EMR_POLYLINETO => {
            let count = r.u32(24)? as usize;
            poly(canvas, kind, &r.points(28, count, false)?);
        },
        EMR_POLYBEZIER16..=EMR_POLYLINETO16 => {
            let count = r.u32(24)? as usize;
            poly(canvas, kind - POINTS16_DELTA, &r.points(28, count, true)?);
        },
        EMR_POLYPOLYLINE | EMR_POLYPOLYGON | EMR_POLYPOLYLINE16 | EMR_POLYPOLYGON16 => {
            let polygons = r.u32(24)? as usize;
            let short = kind >= EMR_POLYPOLYLINE16;
            let mut offset = 32usize.checked_add(polygons.checked_mul(4)?)?;
            let mut figures = Vec::with_capacity(polygons.min(r.0.len() / 4));
            for index in 0..polygons {
                let count = r.u32(32 + index * 4)? as usize;
                figures.push(r.points(offset, count, short)?);
                offset += count * if short { 4 } else { 8 };
            }
            let figures: Vec<&[Point]> = figures.iter().map(Vec::as_slice).collect();
            canvas.figures(&figures, matches!(kind, EMR_POLYPOLYGON | EMR_POLYPOLYGON16));
        },

        EMR_SETWINDOWEXTEX => canvas.state_mut().mapping.window_ext = Some(r.point(8)?),
        EMR_SETWINDOWORGEX => canvas.state_mut().mapping.window_org = r.point(8)?,
        EMR_SETVIEWPORTEXTEX => canvas.state_mut().mapping.viewport_ext = Some(r.point(8)?),
        EMR_SETVIEWPORTORGEX => canvas.state_mut().mapping.viewport_org = r.point(8)?,
        EMR_SETPOLYFILLMODE => canvas.state_mut().fill_rule = FillRule::from_mode(r.u32(8)?),
        EMR_SETTEXTALIGN => canvas.state_mut().text_align = r.u32(8)?,
        EMR_SETTEXTCOLOR => canvas.state_mut().text_color = Color::from_colorref(r.u32(8)?),
        EMR_SAVEDC => canvas.save(),
        EMR_RESTOREDC => canvas.restore(r.u32(8)? as i32),

        EMR_MOVETOEX => canvas.move_to(r.point(8)?),
        EMR_LINETO => canvas.line_to(r.point(8)?),
        EMR_RECTANGLE => canvas.rectangle(r.rect(8)?),
        EMR_ELLIPSE => canvas.ellipse(r.rect(8)?),
        EMR_ROUNDRECT => canvas.round_rect(r.rect(8)?, r.point(24)?),
        EMR_ARC | EMR_CHORD | EMR_PIE => {
            let kind = match kind {
                EMR_PIE => ArcKind::Pie,
                EMR_CHORD => ArcKind::Chord,
                _ => ArcKind::Arc,
            };
            canvas.arc(kind, r.rect(8)?, r.point(24)?, r.point(32)?);
        },

        EMR_BEGINPATH => canvas.begin_path(),
        EMR_ENDPATH => canvas.end_path(),
        EMR_CLOSEFIGURE => canvas.close_figure(),
        EMR_FILLPATH => canvas.paint_path(false, true),
        EMR_STROKEANDFILLPATH => canvas.paint_path(true, true),
        EMR_STROKEPATH => canvas.paint_path(true, false),

        EMR_CREATEPEN => {
            let pen = Pen::new(r.u32(12)?, r.i32(16)?, Color::from_colorref(r.u32(24)?));
            canvas.create_at(r.u32(8)? as usize, GdiObject::Pen(pen));
        },
        EMR_EXTCREATEPEN => {
            let pen = Pen::new(r.u32(28)?, r.i32(32)?, Color::from_colorref(r.u32(40)?));
            canvas.create_at(r.u32(8)? as usize, GdiObject::Pen(pen));
        },
        EMR_CREATEBRUSHINDIRECT => {
            let brush = Brush::new(r.u32(12)?, Color::from_colorref(r.u32(16)?));
            canvas.create_at(r.u32(8)? as usize, GdiObject::Brush(brush));
        },
        EMR_EXTCREATEFONTINDIRECTW => {
            canvas.create_at(r.u32(8)? as usize, GdiObject::Font(font(r)?));
        },
        EMR_SELECTOBJECT => {
            let index = r.u32(8)?;
            if index & STOCK_OBJECT != 0 {
                canvas.select_stock(index & !STOCK_OBJECT);
            } else {
                canvas.select(index as usize);
            }
        },
        EMR_DELETEOBJECT => canvas.delete(r.u32(8)? as usize),

        EMR_EXTTEXTOUTW | EMR_EXTTEXTOUTA => {
            // EMRTEXT follows the bounds, graphics mode and scales
            let at = r.point(36)?;
            let chars = r.u32(44)? as usize;
            let start = r.u32(48)? as usize;
            let text = if kind == EMR_EXTTEXTOUTW {
                let bytes = r.0.get(start..start.checked_add(chars.checked_mul(2)?)?)?;
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|u| u16::from_le_bytes([u[0], u[1]]))
                    .collect();
                canvas.state().font.decode_wide(&units)
            } else {
                canvas.state().font.decode(r.0.get(start..start.checked_add(chars)?)?)
            };
            canvas.text(at, text);
        },

        EMR_STRETCHDIBITS => {
            let origin = r.point(24)?;
            let size = r.point(72)?;
            place_dib(canvas, origin, size, r, 48);
        },
        EMR_BITBLT | EMR_STRETCHBLT => {
            let origin = r.point(24)?;
            let size = r.point(32)?;
            place_dib(canvas, origin, size, r, 84);
        },
        _ => {},
    }
    Some(())
}

fn poly(canvas: &mut Canvas, kind: u32, points: &[Point]) {
    match kind {
        EMR_POLYBEZIER => canvas.poly_bezier(points),
        EMR_POLYGON => canvas.polygon(points),
        EMR_POLYLINE => canvas.polyline(points),
        EMR_POLYBEZIERTO => canvas.poly_bezier_to(points),
        _ => canvas.polyline_to(points),
    }
}

/// LOGFONTW at offset 12: height, width, escapement, orientation, weight,
/// byte fields, then a 32-character face name.
fn font(r: &Record<'_>) -> Option<Font> {
    let face: Vec<u16> = (0..32)
        .map_while(|i| read_u16_le(r.0, 40 + i * 2).ok())
        .take_while(|&unit| unit != 0)
        .collect();
    Some(Font {
        height: r.i32(12)?,
        escapement: r.i32(20)?,
        weight: r.u32(28)?,
        italic: r.0.get(32).is_some_and(|&b| b != 0),
        underline: r.0.get(33).is_some_and(|&b| b != 0),
        charset: r.0.get(35).copied().unwrap_or_default(),
        face: String::from_utf16_lossy(&face),
    })
}

/// Place the bitmap whose BITMAPINFO and bits are described by the four u32 fields at `at`.
fn place_dib(canvas: &mut Canvas, origin: Point, size: Point, r: &Record<'_>, at: usize) {
    let (Some(bmi), Some(bits)) = (r.block(at), r.block(at + 8)) else { return };
    if bmi.is_empty() || bits.is_empty() {
        return;
    }
    let dib = [bmi, bits].concat();
    let dest = Rect::new(origin.x, origin.y, origin.x + size.x, origin.y + size.y);
    match dib_png(&dib, Some(bmi.len())) {
        Ok(png) => canvas.image(dest, png),
        Err(e) => tracing::debug!(error = %e, "skipping undecodable EMF bitmap"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::images::metafile::tests::dib_24;

    const EMR_POLYLINE16: u32 = 87;

    /// Builds an EMF from a header with the given device bounds and a list of records.
    pub(crate) struct EmfBuilder {
        data: Vec<u8>,
    }

    impl EmfBuilder {
        pub(crate) fn new(bounds: [i32; 4]) -> Self {
            let mut data = Vec::with_capacity(88);
            data.extend_from_slice(&EMR_HEADER.to_le_bytes());
            data.extend_from_slice(&88u32.to_le_bytes());
            for v in bounds {
                data.extend_from_slice(&v.to_le_bytes());
            }
            data.extend_from_slice(&[0u8; 16]);
            data.extend_from_slice(b" EMF");
            data.extend_from_slice(&0x0001_0000u32.to_le_bytes());
            data.resize(72, 0);
            for v in [1024i32, 768, 320, 240] {
                data.extend_from_slice(&v.to_le_bytes());
            }
            Self { data }
        }

        pub(crate) fn record(mut self, kind: u32, params: &[u8]) -> Self {
            self.data.extend_from_slice(&kind.to_le_bytes());
            self.data.extend_from_slice(&((8 + params.len()) as u32).to_le_bytes());
            self.data.extend_from_slice(params);
            self
        }

        pub(crate) fn ints(self, kind: u32, values: &[i32]) -> Self {
            let params: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            self.record(kind, &params)
        }

        pub(crate) fn finish(self) -> Vec<u8> {
            self.ints(EMR_EOF, &[0, 0, 20]).data
        }
    }

    #[test]
    fn test_bounds_size_output() {
        let emf = EmfBuilder::new([0, 0, 29, 9])
            .ints(EMR_SELECTOBJECT, &[STOCK_OBJECT as i32 | 4])
            .ints(EMR_RECTANGLE, &[5, 2, 25, 8])
            .finish();
        let replay = emf_to_svg(&emf).unwrap();
        assert_eq!((replay.width, replay.height), (30, 10));
        assert!(replay.svg.contains(r##"<path d="M5 2L25 2L25 8L5 8Z" fill="#000000""##), "{}", replay.svg);
    }

    #[test]
    fn test_window_and_viewport_map_device_bounds() {
        // 100 x 50 logical units shown on 10 x 5 device pixels
        let emf = EmfBuilder::new([0, 0, 9, 4])
            .ints(EMR_SETWINDOWEXTEX, &[100, 50])
            .ints(EMR_SETVIEWPORTEXTEX, &[10, 5])
            .ints(EMR_MOVETOEX, &[0, 0])
            .ints(EMR_LINETO, &[100, 50])
            .finish();
        let replay = emf_to_svg(&emf).unwrap();
        assert_eq!((replay.width, replay.height), (10, 5));
        assert!(replay.svg.contains("matrix(0.1 0 0 0.1 0 0)"), "{}", replay.svg);
    }

    #[test]
    fn test_empty_bounds_fall_back_to_drawing() {
        let emf = EmfBuilder::new([0, 0, -1, -1])
            .ints(EMR_POLYLINE16, &[0, 0, 0, 0, 2, 0x0003_0001, 0x0000_000C])
            .finish();
        let replay = emf_to_svg(&emf).unwrap();
        // Points (1, 3) and (12, 0)
        assert_eq!((replay.width, replay.height), (11, 3));
        assert!(replay.svg.contains("M1 3L12 0"), "{}", replay.svg);
    }

    #[test]
    fn test_exttextoutw_text() {
        let text: Vec<u16> = "x²".encode_utf16().collect();
        let mut params = vec![0u8; 68];
        params[28..32].copy_from_slice(&4i32.to_le_bytes());
        params[32..36].copy_from_slice(&6i32.to_le_bytes());
        params[36..40].copy_from_slice(&(text.len() as u32).to_le_bytes());
        params[40..44].copy_from_slice(&76u32.to_le_bytes());
        for unit in &text {
            params.extend_from_slice(&unit.to_le_bytes());
        }
        let emf = EmfBuilder::new([0, 0, 19, 19])
            .ints(EMR_SETTEXTCOLOR, &[0x0000_FF00])
            .record(EMR_EXTTEXTOUTW, &params)
            .finish();
        let svg = emf_to_svg(&emf).unwrap().svg;
        assert!(svg.contains("translate(4 6)"), "{svg}");
        assert!(svg.contains(r##"fill="#00ff00""##));
        assert!(svg.contains(">x²</text>"));
    }

    #[test]
    fn test_stretchdibits_becomes_image() {
        let dib = dib_24(4, 2);
        let (bmi, bits) = dib.split_at(40);
        let mut params = vec![0u8; 72];
        // xDest, yDest
        params[16..24].copy_from_slice(&[1, 0, 0, 0, 1, 0, 0, 0]);
        for (at, v) in [(40, 80u32), (44, 40), (48, 120), (52, bits.len() as u32), (64, 4), (68, 2)] {
            params[at..at + 4].copy_from_slice(&v.to_le_bytes());
        }
        params.extend_from_slice(bmi);
        params.extend_from_slice(bits);
        let emf = EmfBuilder::new([0, 0, 5, 3]).record(EMR_STRETCHDIBITS, &params).finish();
        let svg = emf_to_svg(&emf).unwrap().svg;
        assert!(svg.contains(r#"<image transform="translate(3 2) scale(1 1)""#), "{svg}");
        assert!(svg.contains(r#"width="4" height="2""#));
    }

    #[test]
    fn test_path_bracket() {
        let emf = EmfBuilder::new([0, 0, 9, 9])
            .ints(EMR_BEGINPATH, &[])
            .ints(EMR_POLYGON, &[0, 0, 0, 0, 3, 0, 0, 9, 0, 0, 9])
            .ints(EMR_ENDPATH, &[])
            .ints(EMR_SELECTOBJECT, &[STOCK_OBJECT as i32 | 2])
            .ints(EMR_FILLPATH, &[0, 0, 0, 0])
            .finish();
        let svg = emf_to_svg(&emf).unwrap().svg;
        assert!(svg.contains(r##"<path d="M0 0L9 0L0 9Z" fill="#808080""##), "{svg}");
        assert_eq!(svg.matches("<path").count(), 1);
    }

    #[test]
    fn test_not_an_emf() {
        assert!(matches!(emf_to_svg(&[0u8; 8]), Err(ImageError::Truncated(_))));
    }
}
