// GDI playback state shared by the WMF and EMF players
//
// Records are replayed onto a `Canvas` in logical coordinates. Each shape
// keeps the pen, brush and font selected when it was drawn; the mapping to
// output pixels is applied once, when the canvas is written out as SVG.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::Encoding;
use std::f64::consts::{PI, TAU};
use std::fmt::Write as _;

/// Font size in output pixels for fonts that leave the height unset.
const DEFAULT_FONT_PX: f64 = 12.0;

/// Object table slots accepted from a metafile.
const MAX_OBJECTS: usize = 0x1_0000;

pub const TA_UPDATECP: u32 = 0x0001;
pub const TA_RIGHT: u32 = 0x0002;
pub const TA_CENTER: u32 = 0x0006;
pub const TA_BOTTOM: u32 = 0x0008;
pub const TA_BASELINE: u32 = 0x0018;

const PS_NULL: u32 = 5;
const BS_SOLID: u32 = 0;
const BS_HATCHED: u32 = 2;

const SYMBOL_CHARSET: u8 = 2;

/// RGB color from a COLORREF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::gray(0);
    pub const WHITE: Self = Self::gray(0xFF);

    const fn gray(level: u8) -> Self {
        Self {
            r: level,
            g: level,
            b: level,
        }
    }

    pub const fn from_colorref(value: u32) -> Self {
        Self {
            r: (value & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: ((value >> 16) & 0xFF) as u8,
        }
    }

    fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub color: Color,
    /// Logical width; zero draws one device pixel
    pub width: f64,
    pub visible: bool,
}

impl Pen {
    const NULL: Self = Self {
        color: Color::BLACK,
        width: 0.0,
        visible: false,
    };

    pub fn new(style: u32, width: f64, color: Color) -> Self {
        Self {
            color,
            width: width.abs(),
            visible: style & 0x0F != PS_NULL,
        }
    }

    const fn solid(color: Color) -> Self {
        Self {
            color,
            width: 0.0,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub fill: Option<Color>,
}

impl Brush {
    const NULL: Self = Self { fill: None };

    /// Hatched brushes are drawn solid in their color; pattern brushes are not drawn.
    pub fn new(style: u32, color: Color) -> Self {
        let fill = match style {
            BS_SOLID | BS_HATCHED => Some(color),
            _ => None,
        };
        Self { fill }
    }

    const fn solid(color: Color) -> Self {
        Self { fill: Some(color) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    /// Logical height; negative values give the em height, zero is unset
    pub height: f64,
    pub face: String,
    pub weight: u32,
    pub italic: bool,
    pub underline: bool,
    /// Baseline angle in tenths of a degree, counterclockwise
    pub escapement: f64,
    pub charset: u8,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            height: 0.0,
            face: String::new(),
            weight: 400,
            italic: false,
            underline: false,
            escapement: 0.0,
            charset: 0,
        }
    }
}

impl Font {
    fn is_symbol(&self) -> bool {
        self.charset == SYMBOL_CHARSET || self.face.eq_ignore_ascii_case("symbol")
    }

    /// Decode 8-bit text drawn with this font.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if self.is_symbol() {
            return bytes.iter().map(|&code| symbol_char(code)).collect();
        }
        let (text, _) = charset_encoding(self.charset).decode_without_bom_handling(bytes);
        text.into_owned()
    }

    /// Map UTF-16 text drawn with this font, resolving Symbol font codes.
    pub fn decode_wide(&self, units: &[u16]) -> String {
        let text = String::from_utf16_lossy(units);
        if !self.is_symbol() {
            return text;
        }
        text.chars()
            .map(|c| match c as u32 {
                code @ 0xF020..=0xF0FF => symbol_char((code - 0xF000) as u8),
                code @ 0x20..=0xFF => symbol_char(code as u8),
                _ => c,
            })
            .collect()
    }
}

fn charset_encoding(charset: u8) -> &'static Encoding {
    match charset {
        128 => encoding_rs::SHIFT_JIS,
        129 => encoding_rs::EUC_KR,
        134 => encoding_rs::GBK,
        136 => encoding_rs::BIG5,
        161 => encoding_rs::WINDOWS_1253,
        162 => encoding_rs::WINDOWS_1254,
        163 => encoding_rs::WINDOWS_1258,
        177 => encoding_rs::WINDOWS_1255,
        178 => encoding_rs::WINDOWS_1256,
        186 => encoding_rs::WINDOWS_1257,
        204 => encoding_rs::WINDOWS_1251,
        222 => encoding_rs::WINDOWS_874,
        238 => encoding_rs::WINDOWS_1250,
        _ => encoding_rs::WINDOWS_1252,
    }
}

const SYMBOL_UPPER: [char; 26] = [
    'Α', 'Β', 'Χ', 'Δ', 'Ε', 'Φ', 'Γ', 'Η', 'Ι', 'ϑ', 'Κ', 'Λ', 'Μ', 'Ν', 'Ο', 'Π', 'Θ', 'Ρ', 'Σ', 'Τ', 'Υ', 'ς',
    'Ω', 'Ξ', 'Ψ', 'Ζ',
];
const SYMBOL_LOWER: [char; 26] = [
    'α', 'β', 'χ', 'δ', 'ε', 'φ', 'γ', 'η', 'ι', 'ϕ', 'κ', 'λ', 'μ', 'ν', 'ο', 'π', 'θ', 'ρ', 'σ', 'τ', 'υ', 'ϖ',
    'ω', 'ξ', 'ψ', 'ζ',
];

/// Unicode character for a code of the Symbol font.
fn symbol_char(code: u8) -> char {
    match code {
        b'A'..=b'Z' => SYMBOL_UPPER[(code - b'A') as usize],
        b'a'..=b'z' => SYMBOL_LOWER[(code - b'a') as usize],
        0x22 => '∀',
        0x24 => '∃',
        0x27 => '∋',
        0x2D => '−',
        0x40 => '≅',
        0x5E => '⊥',
        0xA2 => '′',
        0xA3 => '≤',
        0xA5 => '∞',
        0xAC => '←',
        0xAD => '↑',
        0xAE => '→',
        0xAF => '↓',
        0xB0 => '°',
        0xB1 => '±',
        0xB2 => '″',
        0xB3 => '≥',
        0xB4 => '×',
        0xB5 => '∝',
        0xB6 => '∂',
        0xB7 => '•',
        0xB8 => '÷',
        0xB9 => '≠',
        0xBA => '≡',
        0xBB => '≈',
        0xC5 => '⊕',
        0xC6 => '∅',
        0xC7 => '∩',
        0xC8 => '∪',
        0xCE => '∈',
        0xCF => '∉',
        0xD0 => '∠',
        0xD1 => '∇',
        0xD5 => '∏',
        0xD6 => '√',
        0xD7 => '⋅',
        0xD8 => '¬',
        0xD9 => '∧',
        0xDA => '∨',
        0xDB => '⇔',
        0xDE => '⇒',
        0xE1 => '〈',
        0xE5 => '∑',
        0xF1 => '〉',
        0xF2 => '∫',
        _ => code as char,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GdiObject {
    Pen(Pen),
    Brush(Brush),
    Font(Font),
    /// Palettes, regions and pattern brushes only occupy a slot
    Other,
}

/// Stock object for a GetStockObject index.
fn stock_object(index: u32) -> Option<GdiObject> {
    let object = match index {
        0 => GdiObject::Brush(Brush::solid(Color::WHITE)),
        1 => GdiObject::Brush(Brush::solid(Color::gray(0xC0))),
        2 => GdiObject::Brush(Brush::solid(Color::gray(0x80))),
        3 => GdiObject::Brush(Brush::solid(Color::gray(0x40))),
        4 => GdiObject::Brush(Brush::solid(Color::BLACK)),
        5 => GdiObject::Brush(Brush::NULL),
        6 => GdiObject::Pen(Pen::solid(Color::WHITE)),
        7 => GdiObject::Pen(Pen::solid(Color::BLACK)),
        8 => GdiObject::Pen(Pen::NULL),
        10..=17 => GdiObject::Font(Font::default()),
        _ => return None,
    };
    Some(object)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    EvenOdd,
    NonZero,
}

impl FillRule {
    /// ALTERNATE (1) or WINDING (2).
    pub fn from_mode(mode: u32) -> Self {
        if mode == 2 { Self::NonZero } else { Self::EvenOdd }
    }

    fn as_svg(self) -> &'static str {
        match self {
            Self::EvenOdd => "evenodd",
            Self::NonZero => "nonzero",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    fn union(self, p: Point) -> Self {
        Self::new(
            self.left.min(p.x),
            self.top.min(p.y),
            self.right.max(p.x),
            self.bottom.max(p.y),
        )
    }
}

/// Window and viewport origins and extents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mapping {
    pub window_org: Point,
    pub window_ext: Option<Point>,
    pub viewport_org: Point,
    pub viewport_ext: Option<Point>,
}

impl Mapping {
    /// Window rectangle, once an extent was set.
    pub fn window(&self) -> Option<Rect> {
        let org = self.window_org;
        let ext = self.window_ext?;
        Some(Rect::new(org.x, org.y, org.x + ext.x, org.y + ext.y))
    }

    /// Logical rectangle shown in the device rectangle `device`.
    pub fn device_to_logical(&self, device: Rect) -> Rect {
        let (sx, sy) = match (self.window_ext, self.viewport_ext) {
            (Some(window), Some(viewport)) if viewport.x != 0.0 && viewport.y != 0.0 => {
                (window.x / viewport.x, window.y / viewport.y)
            },
            _ => (1.0, 1.0),
        };
        let map = |x: f64, y: f64| {
            Point::new(
                (x - self.viewport_org.x) * sx + self.window_org.x,
                (y - self.viewport_org.y) * sy + self.window_org.y,
            )
        };
        let a = map(device.left, device.top);
        let b = map(device.right, device.bottom);
        Rect::new(a.x, a.y, b.x, b.y)
    }
}

/// Device context state saved and restored by SAVEDC / RESTOREDC.
#[derive(Debug, Clone, PartialEq)]
pub struct DcState {
    pub pen: Pen,
    pub brush: Brush,
    pub font: Font,
    pub text_color: Color,
    pub text_align: u32,
    pub fill_rule: FillRule,
    pub position: Point,
    pub mapping: Mapping,
}

impl Default for DcState {
    fn default() -> Self {
        Self {
            pen: Pen::solid(Color::BLACK),
            brush: Brush::solid(Color::WHITE),
            font: Font::default(),
            text_color: Color::BLACK,
            text_align: 0,
            fill_rule: FillRule::EvenOdd,
            position: Point::default(),
            mapping: Mapping::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcKind {
    Arc,
    Chord,
    Pie,
}

#[derive(Debug, Clone)]
enum Shape {
    Path {
        data: String,
        stroke: Option<Pen>,
        fill: Option<Color>,
        fill_rule: FillRule,
    },
    Text {
        at: Point,
        text: String,
        font: Font,
        color: Color,
        align: u32,
    },
    Image {
        rect: Rect,
        png: Vec<u8>,
    },
}

/// Drawing surface the metafile players replay records onto.
#[derive(Debug, Default)]
pub struct Canvas {
    state: DcState,
    saved: Vec<DcState>,
    objects: Vec<Option<GdiObject>>,
    shapes: Vec<Shape>,
    /// Open path bracket
    path: Option<String>,
    /// Path closed by ENDPATH, waiting to be filled or stroked
    ended_path: Option<String>,
    bounds: Option<Rect>,
    first_mapping: Option<Mapping>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DcState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DcState {
        &mut self.state
    }

    /// Mapping in effect when the first shape was drawn.
    pub fn mapping(&self) -> Mapping {
        self.first_mapping.unwrap_or(self.state.mapping)
    }

    /// Logical bounding box of everything drawn so far.
    pub fn drawing_bounds(&self) -> Option<Rect> {
        self.bounds
    }

    pub fn save(&mut self) {
        self.saved.push(self.state.clone());
    }

    /// Negative values pop relative to the top, positive ones name a saved level.
    pub fn restore(&mut self, which: i32) {
        let target = if which < 0 {
            self.saved.len().checked_sub(which.unsigned_abs() as usize)
        } else {
            (which as usize).checked_sub(1)
        };
        if let Some(target) = target
            && target < self.saved.len()
        {
            self.state = self.saved[target].clone();
            self.saved.truncate(target);
        }
    }

    /// Store an object in the lowest free slot and return its index.
    pub fn create(&mut self, object: GdiObject) -> usize {
        match self.objects.iter().position(Option::is_none) {
            Some(index) => {
                self.objects[index] = Some(object);
                index
            },
            None => {
                self.objects.push(Some(object));
                self.objects.len() - 1
            },
        }
    }

    /// Store an object at an explicit index.
    pub fn create_at(&mut self, index: usize, object: GdiObject) {
        if index >= MAX_OBJECTS {
            return;
        }
        if self.objects.len() <= index {
            self.objects.resize(index + 1, None);
        }
        self.objects[index] = Some(object);
    }

    pub fn select(&mut self, index: usize) {
        if let Some(Some(object)) = self.objects.get(index) {
            let object = object.clone();
            self.apply(object);
        }
    }

    pub fn select_stock(&mut self, index: u32) {
        if let Some(object) = stock_object(index) {
            self.apply(object);
        }
    }

    fn apply(&mut self, object: GdiObject) {
        match object {
            GdiObject::Pen(pen) => self.state.pen = pen,
            GdiObject::Brush(brush) => self.state.brush = brush,
            GdiObject::Font(font) => self.state.font = font,
            GdiObject::Other => {},
        }
    }

    pub fn delete(&mut self, index: usize) {
        if let Some(slot) = self.objects.get_mut(index) {
            *slot = None;
        }
    }

    fn include(&mut self, p: Point) {
        self.bounds = Some(match self.bounds {
            Some(bounds) => bounds.union(p),
            None => Rect::new(p.x, p.y, p.x, p.y),
        });
    }

    fn mark_drawn(&mut self) {
        if self.first_mapping.is_none() {
            self.first_mapping = Some(self.state.mapping);
        }
    }

    /// Add a figure to the open path, or draw it with the current pen and brush.
    fn emit(&mut self, data: String, closed: bool) {
        if let Some(path) = self.path.as_mut() {
            path.push_str(&data);
            return;
        }
        self.mark_drawn();
        let stroke = self.state.pen.visible.then_some(self.state.pen);
        let fill = if closed { self.state.brush.fill } else { None };
        if stroke.is_some() || fill.is_some() {
            self.shapes.push(Shape::Path {
                data,
                stroke,
                fill,
                fill_rule: self.state.fill_rule,
            });
        }
    }

    /// Segments starting at the current position.
    fn continue_from_position(&mut self, segments: &str) {
        let from = self.state.position;
        if let Some(path) = self.path.as_mut() {
            if path.is_empty() {
                push_point(path, 'M', from);
            }
            path.push_str(segments);
            return;
        }
        let mut data = String::new();
        push_point(&mut data, 'M', from);
        data.push_str(segments);
        self.emit(data, false);
    }

    pub fn move_to(&mut self, p: Point) {
        self.state.position = p;
        if let Some(path) = self.path.as_mut() {
            push_point(path, 'M', p);
        }
    }

    pub fn line_to(&mut self, p: Point) {
        self.include(self.state.position);
        self.include(p);
        let mut segment = String::new();
        push_point(&mut segment, 'L', p);
        self.continue_from_position(&segment);
        self.state.position = p;
    }

    /// Lines from the current position through `points`.
    pub fn polyline_to(&mut self, points: &[Point]) {
        let Some(&last) = points.last() else { return };
        self.include(self.state.position);
        let mut segments = String::new();
        for &p in points {
            self.include(p);
            push_point(&mut segments, 'L', p);
        }
        self.continue_from_position(&segments);
        self.state.position = last;
    }

    /// Cubic Béziers from the current position; `points` come in control, control, end triples.
    pub fn poly_bezier_to(&mut self, points: &[Point]) {
        let triples = points.chunks_exact(3);
        let Some(last) = triples.clone().last().map(|t| t[2]) else { return };
        self.include(self.state.position);
        let mut segments = String::new();
        for triple in triples {
            triple.iter().for_each(|&p| self.include(p));
            push_curve(&mut segments, triple);
        }
        self.continue_from_position(&segments);
        self.state.position = last;
    }

    /// Béziers starting at the first point.
    pub fn poly_bezier(&mut self, points: &[Point]) {
        let Some((&first, rest)) = points.split_first() else { return };
        self.include(first);
        let mut data = String::new();
        push_point(&mut data, 'M', first);
        for triple in rest.chunks_exact(3) {
            triple.iter().for_each(|&p| self.include(p));
            push_curve(&mut data, triple);
        }
        self.emit(data, false);
    }

    pub fn polyline(&mut self, points: &[Point]) {
        self.figures(&[points], false);
    }

    pub fn polygon(&mut self, points: &[Point]) {
        self.figures(&[points], true);
    }

    /// Several figures drawn as one shape, so holes follow the fill rule.
    pub fn figures(&mut self, figures: &[&[Point]], closed: bool) {
        let mut data = String::new();
        for figure in figures {
            let Some((&first, rest)) = figure.split_first() else { continue };
            self.include(first);
            push_point(&mut data, 'M', first);
            for &p in rest {
                self.include(p);
                push_point(&mut data, 'L', p);
            }
            if closed {
                data.push('Z');
            }
        }
        if !data.is_empty() {
            self.emit(data, closed);
        }
    }

    pub fn rectangle(&mut self, r: Rect) {
        let corners = [
            Point::new(r.left, r.top),
            Point::new(r.right, r.top),
            Point::new(r.right, r.bottom),
            Point::new(r.left, r.bottom),
        ];
        self.polygon(&corners);
    }

    /// Rectangle with corners rounded by an ellipse of `corner` width and height.
    pub fn round_rect(&mut self, r: Rect, corner: Point) {
        let rx = (corner.x.abs() / 2.0).min(r.width().abs() / 2.0);
        let ry = (corner.y.abs() / 2.0).min(r.height().abs() / 2.0);
        if rx == 0.0 || ry == 0.0 {
            self.rectangle(r);
            return;
        }
        let (left, right) = (r.left.min(r.right), r.left.max(r.right));
        let (top, bottom) = (r.top.min(r.bottom), r.top.max(r.bottom));
        self.include(Point::new(left, top));
        self.include(Point::new(right, bottom));

        let mut data = String::new();
        push_point(&mut data, 'M', Point::new(left + rx, top));
        push_point(&mut data, 'L', Point::new(right - rx, top));
        push_arc(&mut data, rx, ry, false, true, Point::new(right, top + ry));
        push_point(&mut data, 'L', Point::new(right, bottom - ry));
        push_arc(&mut data, rx, ry, false, true, Point::new(right - rx, bottom));
        push_point(&mut data, 'L', Point::new(left + rx, bottom));
        push_arc(&mut data, rx, ry, false, true, Point::new(left, bottom - ry));
        push_point(&mut data, 'L', Point::new(left, top + ry));
        push_arc(&mut data, rx, ry, false, true, Point::new(left + rx, top));
        data.push('Z');
        self.emit(data, true);
    }

    pub fn ellipse(&mut self, r: Rect) {
        let c = r.center();
        let (rx, ry) = (r.width().abs() / 2.0, r.height().abs() / 2.0);
        if rx == 0.0 || ry == 0.0 {
            return;
        }
        self.include(Point::new(r.left, r.top));
        self.include(Point::new(r.right, r.bottom));

        let mut data = String::new();
        push_point(&mut data, 'M', Point::new(c.x - rx, c.y));
        push_arc(&mut data, rx, ry, true, false, Point::new(c.x + rx, c.y));
        push_arc(&mut data, rx, ry, true, false, Point::new(c.x - rx, c.y));
        data.push('Z');
        self.emit(data, true);
    }

    /// Elliptic arc of the ellipse bounded by `r`, counterclockwise from the
    /// radial through `start` to the radial through `end`.
    pub fn arc(&mut self, kind: ArcKind, r: Rect, start: Point, end: Point) {
        let c = r.center();
        let (rx, ry) = (r.width().abs() / 2.0, r.height().abs() / 2.0);
        if rx == 0.0 || ry == 0.0 {
            return;
        }
        self.include(Point::new(r.left, r.top));
        self.include(Point::new(r.right, r.bottom));

        let angle = |p: Point| ((p.y - c.y) / ry).atan2((p.x - c.x) / rx);
        let on = |a: f64| Point::new(c.x + rx * a.cos(), c.y + ry * a.sin());
        let a0 = angle(start);
        // Counterclockwise on a y-down surface decreases the angle
        let sweep = match (a0 - angle(end)).rem_euclid(TAU) {
            s if s == 0.0 => TAU,
            s => s,
        };

        let mut data = String::new();
        if kind == ArcKind::Pie {
            push_point(&mut data, 'M', c);
            push_point(&mut data, 'L', on(a0));
        } else {
            push_point(&mut data, 'M', on(a0));
        }
        if sweep >= TAU {
            push_arc(&mut data, rx, ry, false, false, on(a0 - PI));
            push_arc(&mut data, rx, ry, false, false, on(a0));
        } else {
            push_arc(&mut data, rx, ry, sweep > PI, false, on(a0 - sweep));
        }
        let closed = kind != ArcKind::Arc;
        if closed {
            data.push('Z');
        }
        self.emit(data, closed);
    }

    /// Draw text at `at`, or at the current position under TA_UPDATECP.
    pub fn text(&mut self, at: Point, text: String) {
        if text.trim().is_empty() {
            return;
        }
        let at = if self.state.text_align & TA_UPDATECP != 0 {
            self.state.position
        } else {
            at
        };
        self.include(at);
        self.mark_drawn();
        self.shapes.push(Shape::Text {
            at,
            text,
            font: self.state.font.clone(),
            color: self.state.text_color,
            align: self.state.text_align,
        });
    }

    /// Place a PNG over the logical rectangle `rect`.
    pub fn image(&mut self, rect: Rect, png: Vec<u8>) {
        self.include(Point::new(rect.left, rect.top));
        self.include(Point::new(rect.right, rect.bottom));
        self.mark_drawn();
        self.shapes.push(Shape::Image { rect, png });
    }

    pub fn begin_path(&mut self) {
        self.path = Some(String::new());
        self.ended_path = None;
    }

    pub fn end_path(&mut self) {
        self.ended_path = self.path.take();
    }

    pub fn close_figure(&mut self) {
        if let Some(path) = self.path.as_mut()
            && !path.is_empty()
        {
            path.push('Z');
        }
    }

    /// Draw the last path with the pen, the brush or both.
    pub fn paint_path(&mut self, stroke: bool, fill: bool) {
        let Some(data) = self.ended_path.take().or_else(|| self.path.take()) else { return };
        if data.is_empty() {
            return;
        }
        self.mark_drawn();
        let stroke = (stroke && self.state.pen.visible).then_some(self.state.pen);
        let fill = if fill { self.state.brush.fill } else { None };
        if stroke.is_some() || fill.is_some() {
            self.shapes.push(Shape::Path {
                data,
                stroke,
                fill,
                fill_rule: self.state.fill_rule,
            });
        }
    }

    /// SVG document of `width` x `height` pixels showing the logical rectangle `window`.
    pub fn into_svg(self, window: Rect, width: u32, height: u32) -> String {
        let sx = if window.width() == 0.0 { 1.0 } else { width as f64 / window.width() };
        let sy = if window.height() == 0.0 { 1.0 } else { height as f64 / window.height() };
        let view = View {
            pixel: 2.0 / (sx.abs() + sy.abs()),
            flip_x: sx.signum(),
            flip_y: sy.signum(),
        };

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        let _ = write!(
            svg,
            r#"<g transform="matrix({sx} 0 0 {sy} {} {})">"#,
            0.0 - window.left * sx,
            0.0 - window.top * sy
        );
        for shape in &self.shapes {
            shape.write_svg(&mut svg, &view);
        }
        svg.push_str("</g></svg>");
        svg
    }
}

/// Output pixel size and axis orientation in logical units.
struct View {
    pixel: f64,
    flip_x: f64,
    flip_y: f64,
}

impl Shape {
    fn write_svg(&self, svg: &mut String, view: &View) {
        match self {
            Shape::Path {
                data,
                stroke,
                fill,
                fill_rule,
            } => {
                let fill = fill.map_or_else(|| "none".to_string(), Color::hex);
                let _ = write!(svg, r#"<path d="{data}" fill="{fill}" fill-rule="{}""#, fill_rule.as_svg());
                match stroke {
                    Some(pen) => {
                        let _ = write!(
                            svg,
                            r#" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"/>"#,
                            pen.color.hex(),
                            pen.width.max(view.pixel)
                        );
                    },
                    None => svg.push_str(r#" stroke="none"/>"#),
                }
            },
            Shape::Text {
                at,
                text,
                font,
                color,
                align,
            } => {
                let size = if font.height == 0.0 {
                    DEFAULT_FONT_PX * view.pixel
                } else {
                    font.height.abs()
                };
                let baseline = match align & TA_BASELINE {
                    TA_BASELINE => 0.0,
                    TA_BOTTOM => -0.2 * size,
                    _ => 0.8 * size,
                };
                let anchor = if align & TA_CENTER == TA_CENTER {
                    "middle"
                } else if align & TA_RIGHT != 0 {
                    "end"
                } else {
                    "start"
                };
                let face = escape(&font.face.replace(['\'', '"'], ""));
                let family = if face.is_empty() {
                    "serif".to_string()
                } else {
                    format!("'{face}', serif")
                };

                let _ = write!(
                    svg,
                    r#"<text transform="translate({} {}) scale({} {})"#,
                    at.x, at.y, view.flip_x, view.flip_y
                );
                if font.escapement != 0.0 {
                    let _ = write!(svg, " rotate({})", -font.escapement / 10.0);
                }
                let weight = ((font.weight.clamp(100, 900) + 50) / 100 * 100).min(900);
                let _ = write!(
                    svg,
                    r#"" y="{baseline}" font-family="{family}" font-size="{size}" font-weight="{weight}" fill="{}" text-anchor="{anchor}""#,
                    color.hex()
                );
                if font.italic {
                    svg.push_str(r#" font-style="italic""#);
                }
                if font.underline {
                    svg.push_str(r#" text-decoration="underline""#);
                }
                let _ = write!(svg, r#" xml:space="preserve">{}</text>"#, escape(text));
            },
            Shape::Image { rect, png } => {
                let c = rect.center();
                let (w, h) = (rect.width().abs(), rect.height().abs());
                let flip_x = view.flip_x * rect.width().signum();
                let flip_y = view.flip_y * rect.height().signum();
                let _ = write!(
                    svg,
                    r#"<image transform="translate({} {}) scale({flip_x} {flip_y})" x="{}" y="{}" width="{w}" height="{h}" preserveAspectRatio="none" xlink:href="data:image/png;base64,{}"/>"#,
                    c.x,
                    c.y,
                    -w / 2.0,
                    -h / 2.0,
                    STANDARD.encode(png)
                );
            },
        }
    }
}

fn push_point(data: &mut String, command: char, p: Point) {
    let _ = write!(data, "{command}{} {}", p.x, p.y);
}

fn push_curve(data: &mut String, triple: &[Point]) {
    let _ = write!(
        data,
        "C{} {} {} {} {} {}",
        triple[0].x, triple[0].y, triple[1].x, triple[1].y, triple[2].x, triple[2].y
    );
}

fn push_arc(data: &mut String, rx: f64, ry: f64, large: bool, sweep: bool, to: Point) {
    let _ = write!(
        data,
        "A{rx} {ry} 0 {} {} {} {}",
        u8::from(large),
        u8::from(sweep),
        to.x,
        to.y
    );
}

/// Escape XML text and drop characters XML cannot carry.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {},
            c => out.push(c),
        }
    }
    out
}
