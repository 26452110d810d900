//! Typed resource values and their textual rendering.

use crate::android::chunk::StyleSpan;
use std::borrow::Cow;
use std::fmt;

pub(crate) const TYPE_NULL: u8 = 0x00;
pub(crate) const TYPE_REFERENCE: u8 = 0x01;
pub(crate) const TYPE_ATTRIBUTE: u8 = 0x02;
pub(crate) const TYPE_STRING: u8 = 0x03;
pub(crate) const TYPE_FLOAT: u8 = 0x04;
pub(crate) const TYPE_DIMENSION: u8 = 0x05;
pub(crate) const TYPE_FRACTION: u8 = 0x06;
pub(crate) const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub(crate) const TYPE_DYNAMIC_ATTRIBUTE: u8 = 0x08;
pub(crate) const TYPE_INT_DEC: u8 = 0x10;
pub(crate) const TYPE_INT_HEX: u8 = 0x11;
pub(crate) const TYPE_INT_BOOLEAN: u8 = 0x12;
pub(crate) const TYPE_INT_COLOR_ARGB8: u8 = 0x1c;
pub(crate) const TYPE_INT_COLOR_RGB8: u8 = 0x1d;
pub(crate) const TYPE_INT_COLOR_ARGB4: u8 = 0x1e;
pub(crate) const TYPE_INT_COLOR_RGB4: u8 = 0x1f;

const DATA_NULL_UNDEFINED: u32 = 0;

const RADIX_MULTS: [f32; 4] = [
    1.0 / 256.0,
    1.0 / 32_768.0,
    1.0 / 8_388_608.0,
    1.0 / 2_147_483_648.0,
];
const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: [&str; 2] = ["%", "%p"];

/// A 32-bit resource identifier: `0xPPTTEEEE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResId(pub u32);

impl ResId {
    pub fn new(package_id: u8, type_id: u8, entry: u16) -> Self {
        ResId(((package_id as u32) << 24) | ((type_id as u32) << 16) | entry as u32)
    }

    pub fn package_id(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn type_id(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn entry_index(self) -> u16 {
        self.0 as u16
    }

    /// Both the package and the type byte are set.
    pub fn is_valid(self) -> bool {
        self.package_id() != 0 && self.type_id() != 0
    }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `@type/name`
    Resource,
    /// `?attr/name`, resolved against the current theme at runtime.
    Attribute,
}

/// A reference to another resource. An unset id is an invalid reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reference {
    pub id: Option<ResId>,
    pub kind: ReferenceKind,
}

impl Reference {
    pub fn to(id: ResId) -> Self {
        Reference {
            id: Some(id),
            kind: ReferenceKind::Resource,
        }
    }

    fn raw_text(&self) -> String {
        let sigil = match self.kind {
            ReferenceKind::Resource => '@',
            ReferenceKind::Attribute => '?',
        };
        match self.id {
            Some(id) => format!("{sigil}{id}"),
            None => format!("{sigil}null"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    Null,
    Float,
    Dimension,
    Fraction,
    IntDec,
    IntHex,
    Boolean,
    ColorArgb8,
    ColorRgb8,
    ColorArgb4,
    ColorRgb4,
    Other(u8),
}

/// A numeric `Res_value` payload together with its declared subtype.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub data: u32,
}

impl Primitive {
    pub fn new(kind: PrimitiveKind, data: u32) -> Self {
        Primitive { kind, data }
    }

    /// Source-style spelling of the value, as the resource compiler would have written it.
    pub fn to_source_text(&self) -> String {
        let data = self.data;
        match self.kind {
            PrimitiveKind::Null => String::new(),
            PrimitiveKind::Float => f32::from_bits(data).to_string(),
            PrimitiveKind::Dimension => {
                let unit = DIMENSION_UNITS.get((data & 0xF) as usize).unwrap_or(&"");
                format!("{}{unit}", complex_to_float(data))
            }
            PrimitiveKind::Fraction => {
                let unit = FRACTION_UNITS.get((data & 0xF) as usize).unwrap_or(&"");
                format!("{}{unit}", complex_to_float(data) * 100.0)
            }
            PrimitiveKind::IntDec => (data as i32).to_string(),
            PrimitiveKind::IntHex => format!("0x{data:x}"),
            PrimitiveKind::Boolean => (data != 0).to_string(),
            PrimitiveKind::ColorArgb8 | PrimitiveKind::ColorArgb4 => format!("#{data:08x}"),
            PrimitiveKind::ColorRgb8 | PrimitiveKind::ColorRgb4 => {
                format!("#{:06x}", data & 0x00FF_FFFF)
            }
            PrimitiveKind::Other(_) => format!("0x{data:08x}"),
        }
    }
}

fn complex_to_float(complex: u32) -> f32 {
    let mantissa = (complex & 0xFFFF_FF00) as i32 as f32;
    mantissa * RADIX_MULTS[((complex >> 4) & 0x3) as usize]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyledString {
    pub text: String,
    pub spans: Vec<StyleSpan>,
}

/// A resource value. The variant set is closed; every consumer matches it exhaustively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// A string from the resource table's global pool.
    String(String),
    /// A string inlined in a compiled XML document.
    RawString(String),
    StyledString(StyledString),
    Reference(Reference),
    /// A path to a file resource inside the package, such as `res/layout/main.xml`.
    FileReference(String),
    Primitive(Primitive),
}

impl Value {
    /// Decode every `Res_value` type except `TYPE_STRING`, whose meaning depends on the owner
    /// (document pool or table pool).
    pub(crate) fn from_typed_data(data_type: u8, data: u32) -> Value {
        let reference = |kind| {
            let id = ResId(data);
            Value::Reference(Reference {
                id: (data != 0).then_some(id),
                kind,
            })
        };
        match data_type {
            TYPE_REFERENCE | TYPE_DYNAMIC_REFERENCE => reference(ReferenceKind::Resource),
            TYPE_ATTRIBUTE | TYPE_DYNAMIC_ATTRIBUTE => reference(ReferenceKind::Attribute),
            TYPE_NULL if data == DATA_NULL_UNDEFINED => Value::Reference(Reference {
                id: None,
                kind: ReferenceKind::Resource,
            }),
            TYPE_NULL => Value::Primitive(Primitive::new(PrimitiveKind::Null, data)),
            other => Value::Primitive(Primitive::new(primitive_kind(other), data)),
        }
    }

    /// Text the resource compiler would have inlined for this value.
    pub fn to_source_text(&self) -> String {
        match self {
            Value::String(text) | Value::RawString(text) | Value::FileReference(text) => text.clone(),
            Value::StyledString(styled) => styled.text.clone(),
            Value::Reference(reference) => reference.raw_text(),
            Value::Primitive(primitive) => primitive.to_source_text(),
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(reference) => Some(reference),
            _ => None,
        }
    }
}

fn primitive_kind(data_type: u8) -> PrimitiveKind {
    match data_type {
        TYPE_FLOAT => PrimitiveKind::Float,
        TYPE_DIMENSION => PrimitiveKind::Dimension,
        TYPE_FRACTION => PrimitiveKind::Fraction,
        TYPE_INT_DEC => PrimitiveKind::IntDec,
        TYPE_INT_HEX => PrimitiveKind::IntHex,
        TYPE_INT_BOOLEAN => PrimitiveKind::Boolean,
        TYPE_INT_COLOR_ARGB8 => PrimitiveKind::ColorArgb8,
        TYPE_INT_COLOR_RGB8 => PrimitiveKind::ColorRgb8,
        TYPE_INT_COLOR_ARGB4 => PrimitiveKind::ColorArgb4,
        TYPE_INT_COLOR_RGB4 => PrimitiveKind::ColorRgb4,
        other => PrimitiveKind::Other(other),
    }
}

/// Text of a resolved value for embedding in an attribute, without any escaping.
///
/// Primitives render as the decimal of their raw payload; callers wanting unit or color formatting
/// inspect [`Primitive::kind`] themselves. References have no direct text and yield `None`, leaving
/// the caller to substitute its fallback.
pub fn render(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(text) | Value::RawString(text) => Some(Cow::Borrowed(text)),
        Value::StyledString(styled) => Some(Cow::Borrowed(&styled.text)),
        Value::FileReference(path) => Some(Cow::Borrowed(path)),
        Value::Primitive(primitive) => Some(Cow::Owned(primitive.data.to_string())),
        Value::Reference(_) => None,
    }
}
