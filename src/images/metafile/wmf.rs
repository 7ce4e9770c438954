// WMF playback
//
// Walks the records of a Windows Metafile, optionally preceded by an Aldus
// placeable header, and replays the drawing records onto a GDI canvas.
//
// References:
// - [MS-WMF] 2.3 WMF Records
// - Aldus placeable metafile header (META_PLACEABLE)

use super::gdi::{ArcKind, Brush, Canvas, Color, FillRule, Font, GdiObject, Pen, Point, Rect};
use super::{Replay, dib_png, pixel_size};
use crate::common::binary::{read_i16_le, read_u16_le, read_u32_le};
use crate::images::ImageError;

/// Aldus placeable metafile key
const WMF_PLACEABLE_KEY: u32 = 0x9AC6_CDD7;
const WMF_PLACEABLE_SIZE: usize = 22;
const WMF_HEADER_WORDS: usize = 9;

/// Placeable headers count logical units per inch; the output is rendered at 96 DPI
const SCREEN_DPI: f64 = 96.0;
const TWIPS_PER_INCH: f64 = 1440.0;

const META_EOF: u16 = 0x0000;
const META_SAVEDC: u16 = 0x001E;
const META_CREATEPALETTE: u16 = 0x00F7;
const META_SETPOLYFILLMODE: u16 = 0x0106;
const META_SETTEXTALIGN: u16 = 0x012E;
const META_RESTOREDC: u16 = 0x0127;
const META_SELECTOBJECT: u16 = 0x012D;
const META_DIBCREATEPATTERNBRUSH: u16 = 0x0142;
const META_DELETEOBJECT: u16 = 0x01F0;
const META_CREATEPATTERNBRUSH: u16 = 0x01F9;
const META_SETTEXTCOLOR: u16 = 0x0209;
const META_SETWINDOWORG: u16 = 0x020B;
const META_SETWINDOWEXT: u16 = 0x020C;
const META_SETVIEWPORTORG: u16 = 0x020D;
const META_SETVIEWPORTEXT: u16 = 0x020E;
const META_LINETO: u16 = 0x0213;
const META_MOVETO: u16 = 0x0214;
const META_CREATEPENINDIRECT: u16 = 0x02FA;
const META_CREATEFONTINDIRECT: u16 = 0x02FB;
const META_CREATEBRUSHINDIRECT: u16 = 0x02FC;
const META_POLYGON: u16 = 0x0324;
const META_POLYLINE: u16 = 0x0325;
const META_ELLIPSE: u16 = 0x0418;
const META_RECTANGLE: u16 = 0x041B;
const META_TEXTOUT: u16 = 0x0521;
const META_POLYPOLYGON: u16 = 0x0538;
const META_ROUNDRECT: u16 = 0x061C;
const META_CREATEREGION: u16 = 0x06FF;
const META_ARC: u16 = 0x0817;
const META_PIE: u16 = 0x081A;
const META_CHORD: u16 = 0x0830;
const META_DIBBITBLT: u16 = 0x0940;
const META_EXTTEXTOUT: u16 = 0x0A32;
const META_DIBSTRETCHBLT: u16 = 0x0B41;
const META_STRETCHDIB: u16 = 0x0F43;

/// ETO_OPAQUE | ETO_CLIPPED: a clipping rectangle precedes the string
const ETO_RECT: u16 = 0x0006;

/// Record parameters following the 6-byte record header.
struct Params<'a>(&'a [u8]);

impl Params<'_> {
    fn i16(&self, offset: usize) -> Option<f64> {
        read_i16_le(self.0, offset).ok().map(f64::from)
    }

    fn u16(&self, offset: usize) -> Option<u16> {
        read_u16_le(self.0, offset).ok()
    }

    fn u32(&self, offset: usize) -> Option<u32> {
        read_u32_le(self.0, offset).ok()
    }

    /// Point stored y first, as most WMF records do.
    fn point_yx(&self, offset: usize) -> Option<Point> {
        Some(Point::new(self.i16(offset + 2)?, self.i16(offset)?))
    }

    /// Rectangle stored bottom, right, top, left.
    fn rect(&self, offset: usize) -> Option<Rect> {
        Some(Rect::new(
            self.i16(offset + 6)?,
            self.i16(offset + 4)?,
            self.i16(offset + 2)?,
            self.i16(offset)?,
        ))
    }

    /// `count` points stored x, y from `offset`.
    fn points(&self, offset: usize, count: usize) -> Option<Vec<Point>> {
        let bytes = self.0.get(offset..offset.checked_add(count.checked_mul(4)?)?)?;
        Some(
            bytes
                .chunks_exact(4)
                .map(|p| {
                    Point::new(
                        f64::from(i16::from_le_bytes([p[0], p[1]])),
                        f64::from(i16::from_le_bytes([p[2], p[3]])),
                    )
                })
                .collect(),
        )
    }

    fn bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.0.get(offset..offset.checked_add(len)?)
    }
}

/// Replay a WMF as SVG.
pub fn wmf_to_svg(wmf: &[u8]) -> Result<Replay, ImageError> {
    let mut offset = 0;
    let mut placeable = None;
    if read_u32_le(wmf, 0).ok() == Some(WMF_PLACEABLE_KEY) {
        let header = Params(
            wmf.get(..WMF_PLACEABLE_SIZE)
                .ok_or_else(|| ImageError::Truncated("WMF placeable header".into()))?,
        );
        let bounds = Rect::new(
            header.i16(6).unwrap_or_default(),
            header.i16(8).unwrap_or_default(),
            header.i16(10).unwrap_or_default(),
            header.i16(12).unwrap_or_default(),
        );
        let inch = match header.u16(14) {
            Some(0) | None => TWIPS_PER_INCH,
            Some(inch) => f64::from(inch),
        };
        placeable = Some((bounds, inch));
        offset = WMF_PLACEABLE_SIZE;
    }

    // META_HEADER: HeaderSize is in 16-bit words
    let header_words = read_u16_le(wmf, offset + 2)
        .map_err(|_| ImageError::Truncated("WMF header".into()))? as usize;
    offset += header_words.max(WMF_HEADER_WORDS) * 2;

    let mut canvas = Canvas::new();
    while let (Ok(size_words), Ok(function)) = (read_u32_le(wmf, offset), read_u16_le(wmf, offset + 4)) {
        let size = (size_words as usize).saturating_mul(2);
        if function == META_EOF || size < 6 || size > wmf.len() - offset {
            break;
        }
        let params = Params(&wmf[offset + 6..offset + size]);
        if play(&mut canvas, function, size_words, &params).is_none() {
            tracing::trace!(function, "skipping malformed WMF record");
        }
        offset += size;
    }

    let window = canvas
        .mapping()
        .window()
        .or(placeable.map(|(bounds, _)| bounds))
        .or(canvas.drawing_bounds())
        .unwrap_or(Rect::new(0.0, 0.0, 1.0, 1.0));
    let (width, height) = match placeable {
        Some((bounds, inch)) => pixel_size(
            bounds.width().abs() * SCREEN_DPI / inch,
            bounds.height().abs() * SCREEN_DPI / inch,
        ),
        None => pixel_size(window.width().abs(), window.height().abs()),
    };

    Ok(Replay {
        svg: canvas.into_svg(window, width, height),
        width,
        height,
    })
}

/// Apply one record to the canvas; `None` when its parameters are short.
fn play(canvas: &mut Canvas, function: u16, size_words: u32, p: &Params<'_>) -> Option<()> {
    match function {
        META_SAVEDC => canvas.save(),
        META_RESTOREDC => canvas.restore(p.i16(0)? as i32),
        META_SETPOLYFILLMODE => canvas.state_mut().fill_rule = FillRule::from_mode(u32::from(p.u16(0)?)),
        META_SETTEXTALIGN => canvas.state_mut().text_align = u32::from(p.u16(0)?),
        META_SETTEXTCOLOR => canvas.state_mut().text_color = Color::from_colorref(p.u32(0)?),
        META_SETWINDOWORG => canvas.state_mut().mapping.window_org = p.point_yx(0)?,
        META_SETWINDOWEXT => canvas.state_mut().mapping.window_ext = Some(p.point_yx(0)?),
        META_SETVIEWPORTORG => canvas.state_mut().mapping.viewport_org = p.point_yx(0)?,
        META_SETVIEWPORTEXT => canvas.state_mut().mapping.viewport_ext = Some(p.point_yx(0)?),

        META_MOVETO => canvas.move_to(p.point_yx(0)?),
        META_LINETO => canvas.line_to(p.point_yx(0)?),
        META_RECTANGLE => canvas.rectangle(p.rect(0)?),
        META_ELLIPSE => canvas.ellipse(p.rect(0)?),
        META_ROUNDRECT => canvas.round_rect(p.rect(4)?, p.point_yx(0)?),
        META_ARC | META_PIE | META_CHORD => {
            let kind = match function {
                META_PIE => ArcKind::Pie,
                META_CHORD => ArcKind::Chord,
                _ => ArcKind::Arc,
            };
            canvas.arc(kind, p.rect(8)?, p.point_yx(4)?, p.point_yx(0)?);
        },
        META_POLYGON | META_POLYLINE => {
            let count = p.u16(0)? as usize;
            let points = p.points(2, count)?;
            if function == META_POLYGON {
                canvas.polygon(&points);
            } else {
                canvas.polyline(&points);
            }
        },
        META_POLYPOLYGON => {
            let polygons = p.u16(0)? as usize;
            let mut offset = 2 + polygons * 2;
            let mut figures = Vec::with_capacity(polygons.min(p.0.len() / 2));
            for index in 0..polygons {
                let count = p.u16(2 + index * 2)? as usize;
                figures.push(p.points(offset, count)?);
                offset += count * 4;
            }
            let figures: Vec<&[Point]> = figures.iter().map(Vec::as_slice).collect();
            canvas.figures(&figures, true);
        },

        META_TEXTOUT => {
            let len = p.u16(0)? as usize;
            let text = p.bytes(2, len)?;
            let at = p.point_yx(2 + len.next_multiple_of(2))?;
            let text = canvas.state().font.decode(text);
            canvas.text(at, text);
        },
        META_EXTTEXTOUT => {
            let at = p.point_yx(0)?;
            let len = p.u16(4)? as usize;
            let options = p.u16(6)?;
            let start = if options & ETO_RECT != 0 { 16 } else { 8 };
            let text = canvas.state().font.decode(p.bytes(start, len)?);
            canvas.text(at, text);
        },

        META_CREATEPENINDIRECT => {
            let pen = Pen::new(u32::from(p.u16(0)?), p.i16(2)?, Color::from_colorref(p.u32(6)?));
            canvas.create(GdiObject::Pen(pen));
        },
        META_CREATEBRUSHINDIRECT => {
            let brush = Brush::new(u32::from(p.u16(0)?), Color::from_colorref(p.u32(2)?));
            canvas.create(GdiObject::Brush(brush));
        },
        META_CREATEFONTINDIRECT => {
            canvas.create(GdiObject::Font(font(p)?));
        },
        META_CREATEPALETTE | META_CREATEPATTERNBRUSH | META_DIBCREATEPATTERNBRUSH | META_CREATEREGION => {
            canvas.create(GdiObject::Other);
        },
        META_SELECTOBJECT => canvas.select(p.u16(0)? as usize),
        META_DELETEOBJECT => canvas.delete(p.u16(0)? as usize),

        META_STRETCHDIB => {
            let dest = dest_rect(p, 18, 16, 14)?;
            place_dib(canvas, dest, p.0.get(22..)?);
        },
        // Records without a bitmap are pattern fills of the destination
        META_DIBSTRETCHBLT | META_DIBBITBLT if size_words == u32::from(function >> 8) + 3 => {},
        META_DIBSTRETCHBLT => {
            let dest = dest_rect(p, 16, 14, 12)?;
            place_dib(canvas, dest, p.0.get(20..)?);
        },
        META_DIBBITBLT => {
            let dest = dest_rect(p, 12, 10, 8)?;
            place_dib(canvas, dest, p.0.get(16..)?);
        },
        _ => {},
    }
    Some(())
}

/// LOGFONT: height, width, escapement, orientation, weight, then byte fields and the face name.
fn font(p: &Params<'_>) -> Option<Font> {
    let face = p.0.get(18..).unwrap_or_default();
    let face = &face[..face.iter().position(|&b| b == 0).unwrap_or(face.len())];
    let mut font = Font {
        height: p.i16(0)?,
        escapement: p.i16(4)?,
        weight: u32::from(p.u16(8)?),
        italic: p.0.get(10).is_some_and(|&b| b != 0),
        underline: p.0.get(11).is_some_and(|&b| b != 0),
        charset: p.0.get(13).copied().unwrap_or_default(),
        ..Font::default()
    };
    font.face = Font::default().decode(face);
    Some(font)
}

/// Destination rectangle from the offsets of its y (x follows), width and height.
fn dest_rect(p: &Params<'_>, at: usize, width_at: usize, height_at: usize) -> Option<Rect> {
    let origin = p.point_yx(at)?;
    let width = p.i16(width_at)?;
    let height = p.i16(height_at)?;
    Some(Rect::new(origin.x, origin.y, origin.x + width, origin.y + height))
}

fn place_dib(canvas: &mut Canvas, dest: Rect, dib: &[u8]) {
    match dib_png(dib, None) {
        Ok(png) => canvas.image(dest, png),
        Err(e) => tracing::debug!(error = %e, "skipping undecodable WMF bitmap"),
    }
}
