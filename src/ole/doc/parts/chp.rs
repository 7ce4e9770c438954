/// Character Properties (CHP) for DOC files.
///
/// Only the properties that survive into the HTML rendering are decoded:
/// italic, underline, vertical position, plus the flags locating inline
/// pictures and symbol characters.
///
/// References:
/// - [MS-DOC] 2.6.1 Character Properties
use crate::ole::sprm::{Sprm, parse_sprms};

/// sprmCFItalic
const SPRM_C_F_ITALIC: u16 = 0x0836;
/// sprmCKul
const SPRM_C_KUL: u16 = 0x2A3E;
/// sprmCIss
const SPRM_C_ISS: u16 = 0x2A48;
/// sprmCPicLocation
const SPRM_C_PIC_LOCATION: u16 = 0x6A03;
/// sprmCFSpec
const SPRM_C_F_SPEC: u16 = 0x0855;
/// sprmCFOle2
const SPRM_C_F_OLE2: u16 = 0x080A;
/// sprmCFData
const SPRM_C_F_DATA: u16 = 0x0806;
/// sprmCSymbol
const SPRM_C_SYMBOL: u16 = 0x6A09;

/// Vertical text position (sprmCIss).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalPosition {
    #[default]
    Normal,
    Superscript,
    Subscript,
}

impl VerticalPosition {
    fn from_iss(iss: u8) -> Self {
        match iss {
            1 => Self::Superscript,
            2 => Self::Subscript,
            _ => Self::Normal,
        }
    }
}

/// A symbol character (sprmCSymbol) replacing the stored character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Font index of the symbol font
    pub font_index: u16,
    /// Character code in that font
    pub code: u16,
}

/// Character formatting of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacterProperties {
    pub is_italic: bool,
    pub is_underline: bool,
    pub vertical_position: VerticalPosition,
    /// fSpec: the character is a special character (picture anchor etc.)
    pub is_spec: bool,
    /// fOle2: the special character is an embedded OLE object
    pub is_ole2: bool,
    /// fData: pic_offset points at binary data, not a picture
    pub is_data: bool,
    /// Offset of the PICF in the Data stream
    pub pic_offset: Option<u32>,
    pub symbol: Option<Symbol>,
}

impl CharacterProperties {
    /// Apply a CHPX grpprl on top of the default properties.
    pub fn from_grpprl(grpprl: &[u8]) -> Self {
        let mut props = Self::default();
        for sprm in parse_sprms(grpprl) {
            props.apply(&sprm);
        }
        props
    }

    /// Whether this run anchors an inline picture.
    #[inline]
    pub fn has_picture(&self) -> bool {
        self.is_spec && !self.is_ole2 && !self.is_data && self.pic_offset.is_some()
    }

    fn apply(&mut self, sprm: &Sprm<'_>) {
        match sprm.opcode {
            SPRM_C_F_ITALIC => {
                if let Some(value) = sprm.operand_byte() {
                    self.is_italic = toggle(self.is_italic, value);
                }
            },
            SPRM_C_KUL => {
                self.is_underline = sprm.operand_byte().is_some_and(|kul| kul != 0);
            },
            SPRM_C_ISS => {
                if let Some(iss) = sprm.operand_byte() {
                    self.vertical_position = VerticalPosition::from_iss(iss);
                }
            },
            SPRM_C_PIC_LOCATION => {
                self.pic_offset = sprm.operand_dword();
            },
            SPRM_C_F_SPEC => {
                self.is_spec = sprm.operand_byte().is_some_and(|v| v != 0);
            },
            SPRM_C_F_OLE2 => {
                self.is_ole2 = sprm.operand_byte().is_some_and(|v| v != 0);
            },
            SPRM_C_F_DATA => {
                self.is_data = sprm.operand_byte().is_some_and(|v| v != 0);
            },
            SPRM_C_SYMBOL => {
                if let (Some(font_index), Some(code)) = (
                    sprm.operand_word(),
                    sprm.operand.get(2..4).map(|b| u16::from_le_bytes([b[0], b[1]])),
                ) {
                    self.symbol = Some(Symbol { font_index, code });
                }
            },
            _ => {},
        }
    }
}

/// Resolve a ToggleOperand ([MS-DOC] 2.9.322).
///
/// 0x80 keeps the inherited value and 0x81 negates it.
fn toggle(current: bool, operand: u8) -> bool {
    match operand {
        0 => false,
        1 => true,
        0x80 => current,
        0x81 => !current,
        _ => current,
    }
}
