//! Type definitions: the schema half of a parameter.
//!
//! A [`TypeDefinition`] names a parameter's datatype and carries the
//! optional schema fields for it: default value, numeric bounds, regex,
//! enum entries and so on. It also knows how to encode and decode bare
//! values of its datatype, because the encoding of a [`Value`] depends on
//! the schema (an enum selection is a tiny string, a plain string a long
//! one).
//!
//! # Wire layout
//!
//! ```text
//! datatype(u8) [mandatory part] { option-code option-value }* 0x00
//! ```
//!
//! The mandatory part exists for custom types (a `u32` byte size) and
//! ranges (the complete element definition block). Option codes start at
//! 0x30 and are interpreted per datatype; an unknown code is a hard error
//! because its length cannot be known.

mod custom;
mod number;
mod range;
mod scalar;
mod text;

use std::net::{Ipv4Addr, Ipv6Addr};

pub use custom::CustomDefinition;
pub use number::{NumberDefinition, NumberKind};
pub use range::RangeDefinition;
pub use scalar::DefaultDefinition;
pub use text::{EnumDefinition, StringDefinition, UriDefinition};

use crate::wire::{WireReader, WireWriter, TERMINATOR};
use crate::{Color, Datatype, ProtocolError, Value};

/// Option codes inside a type definition block.
///
/// `DEFAULT` is shared by every datatype; the remaining codes overlap and
/// are interpreted per datatype.
pub(crate) mod option {
    pub const DEFAULT: u8 = 0x30;

    pub const MINIMUM: u8 = 0x31;
    pub const MAXIMUM: u8 = 0x32;
    pub const MULTIPLE_OF: u8 = 0x33;
    pub const SCALE: u8 = 0x34;
    pub const UNIT: u8 = 0x35;

    pub const REGEX: u8 = 0x31;

    pub const ENTRIES: u8 = 0x31;
    pub const MULTISELECT: u8 = 0x32;

    pub const FILTER: u8 = 0x31;
    pub const SCHEMA: u8 = 0x32;

    pub const UUID: u8 = 0x31;
    pub const CONFIG: u8 = 0x32;
}

/// Behavior shared by every concrete definition.
pub(crate) trait Definition {
    /// Writes the optional fields due for this write (no terminator).
    fn write_options(&mut self, out: &mut WireWriter, all: bool);

    /// Consumes one option value. Returns `Ok(false)` for codes this
    /// definition does not know.
    fn parse_option(
        &mut self,
        code: u8,
        input: &mut WireReader<'_>,
    ) -> Result<bool, ProtocolError>;

    /// Copies present fields from a parsed proxy without marking changes.
    fn merge(&mut self, other: &Self) -> bool;

    fn has_changes(&self) -> bool;

    fn mark_clean(&mut self);

    fn read_value(&self, input: &mut WireReader<'_>) -> Result<Value, ProtocolError>;

    fn write_value(&self, value: &Value, out: &mut WireWriter);

    fn accepts(&self, value: &Value) -> bool;

    fn zero_value(&self) -> Value;
}

/// Schema of a parameter, one variant per supported datatype.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Boolean(DefaultDefinition<bool>),
    Int8(NumberDefinition<i8>),
    UInt8(NumberDefinition<u8>),
    Int16(NumberDefinition<i16>),
    UInt16(NumberDefinition<u16>),
    Int32(NumberDefinition<i32>),
    UInt32(NumberDefinition<u32>),
    Int64(NumberDefinition<i64>),
    UInt64(NumberDefinition<u64>),
    Float32(NumberDefinition<f32>),
    Float64(NumberDefinition<f64>),
    String(StringDefinition),
    Enum(EnumDefinition),
    Uri(UriDefinition),
    Rgb(DefaultDefinition<Color>),
    Rgba(DefaultDefinition<Color>),
    Ipv4(DefaultDefinition<Ipv4Addr>),
    Ipv6(DefaultDefinition<Ipv6Addr>),
    Range(RangeDefinition),
    Custom(CustomDefinition),
    Bang,
    Group,
}

// Runs `$body` with `$inner` bound to the concrete definition, or
// evaluates `$empty` for the option-less bang and group variants.
macro_rules! dispatch {
    ($definition:expr, $inner:ident => $body:expr, $empty:expr) => {
        match $definition {
            TypeDefinition::Boolean($inner) => $body,
            TypeDefinition::Int8($inner) => $body,
            TypeDefinition::UInt8($inner) => $body,
            TypeDefinition::Int16($inner) => $body,
            TypeDefinition::UInt16($inner) => $body,
            TypeDefinition::Int32($inner) => $body,
            TypeDefinition::UInt32($inner) => $body,
            TypeDefinition::Int64($inner) => $body,
            TypeDefinition::UInt64($inner) => $body,
            TypeDefinition::Float32($inner) => $body,
            TypeDefinition::Float64($inner) => $body,
            TypeDefinition::String($inner) => $body,
            TypeDefinition::Enum($inner) => $body,
            TypeDefinition::Uri($inner) => $body,
            TypeDefinition::Rgb($inner) => $body,
            TypeDefinition::Rgba($inner) => $body,
            TypeDefinition::Ipv4($inner) => $body,
            TypeDefinition::Ipv6($inner) => $body,
            TypeDefinition::Range($inner) => $body,
            TypeDefinition::Custom($inner) => $body,
            TypeDefinition::Bang | TypeDefinition::Group => $empty,
        }
    };
}

macro_rules! dispatch_pair {
    ($left:expr, $right:expr; $($variant:ident),*) => {
        match ($left, $right) {
            $(
                (TypeDefinition::$variant(a), TypeDefinition::$variant(b)) => a.merge(b),
            )*
            _ => false,
        }
    };
}

impl TypeDefinition {
    /// Builds an empty definition for `datatype`.
    ///
    /// Returns `None` for datatypes that need more than a tag: ranges
    /// ([`range`](Self::range)), custom types ([`custom`](Self::custom)),
    /// and the unsupported vector/array/list tags.
    pub fn for_datatype(datatype: Datatype) -> Option<Self> {
        let definition = match datatype {
            Datatype::Boolean => Self::Boolean(DefaultDefinition::default()),
            Datatype::Int8 => Self::Int8(NumberDefinition::default()),
            Datatype::UInt8 => Self::UInt8(NumberDefinition::default()),
            Datatype::Int16 => Self::Int16(NumberDefinition::default()),
            Datatype::UInt16 => Self::UInt16(NumberDefinition::default()),
            Datatype::Int32 => Self::Int32(NumberDefinition::default()),
            Datatype::UInt32 => Self::UInt32(NumberDefinition::default()),
            Datatype::Int64 => Self::Int64(NumberDefinition::default()),
            Datatype::UInt64 => Self::UInt64(NumberDefinition::default()),
            Datatype::Float32 => Self::Float32(NumberDefinition::default()),
            Datatype::Float64 => Self::Float64(NumberDefinition::default()),
            Datatype::String => Self::String(StringDefinition::default()),
            Datatype::Enum => Self::Enum(EnumDefinition::default()),
            Datatype::Uri => Self::Uri(UriDefinition::default()),
            Datatype::Rgb => Self::Rgb(DefaultDefinition::default()),
            Datatype::Rgba => Self::Rgba(DefaultDefinition::default()),
            Datatype::Ipv4 => Self::Ipv4(DefaultDefinition::default()),
            Datatype::Ipv6 => Self::Ipv6(DefaultDefinition::default()),
            Datatype::Bang => Self::Bang,
            Datatype::Group => Self::Group,
            _ => return None,
        };
        Some(definition)
    }

    /// A range over the numeric `element` datatype.
    pub fn range(element: Datatype) -> Option<Self> {
        let element = Self::for_datatype(element)?;
        RangeDefinition::new(element).ok().map(Self::Range)
    }

    /// A custom type whose values are exactly `size` bytes.
    pub fn custom(size: u32) -> Self {
        Self::Custom(CustomDefinition::new(size))
    }

    pub fn datatype(&self) -> Datatype {
        match self {
            Self::Boolean(_) => Datatype::Boolean,
            Self::Int8(_) => Datatype::Int8,
            Self::UInt8(_) => Datatype::UInt8,
            Self::Int16(_) => Datatype::Int16,
            Self::UInt16(_) => Datatype::UInt16,
            Self::Int32(_) => Datatype::Int32,
            Self::UInt32(_) => Datatype::UInt32,
            Self::Int64(_) => Datatype::Int64,
            Self::UInt64(_) => Datatype::UInt64,
            Self::Float32(_) => Datatype::Float32,
            Self::Float64(_) => Datatype::Float64,
            Self::String(_) => Datatype::String,
            Self::Enum(_) => Datatype::Enum,
            Self::Uri(_) => Datatype::Uri,
            Self::Rgb(_) => Datatype::Rgb,
            Self::Rgba(_) => Datatype::Rgba,
            Self::Ipv4(_) => Datatype::Ipv4,
            Self::Ipv6(_) => Datatype::Ipv6,
            Self::Range(_) => Datatype::Range,
            Self::Custom(_) => Datatype::CustomType,
            Self::Bang => Datatype::Bang,
            Self::Group => Datatype::Group,
        }
    }

    /// Bang and group parameters have no value.
    pub fn has_value(&self) -> bool {
        !matches!(self, Self::Bang | Self::Group)
    }

    /// Whether `value` has the right shape for this datatype.
    pub fn accepts(&self, value: &Value) -> bool {
        dispatch!(self, d => d.accepts(value), false)
    }

    /// Whether any schema field changed since the last delta write.
    pub fn has_changes(&self) -> bool {
        dispatch!(self, d => d.has_changes(), false)
    }

    pub(crate) fn mark_clean(&mut self) {
        dispatch!(self, d => d.mark_clean(), ())
    }

    /// The value written when a value field is cleared.
    pub fn zero_value(&self) -> Option<Value> {
        dispatch!(self, d => Some(d.zero_value()), None)
    }

    /// Decodes one bare value of this datatype.
    pub fn read_value(&self, input: &mut WireReader<'_>) -> Result<Value, ProtocolError> {
        dispatch!(
            self,
            d => d.read_value(input),
            Err(ProtocolError::NoValue(self.datatype()))
        )
    }

    /// Encodes one bare value. Values of the wrong shape are replaced by
    /// the zero value so the stream stays well formed.
    pub fn write_value(&self, value: &Value, out: &mut WireWriter) {
        dispatch!(self, d => d.write_value(value, out), ())
    }

    /// Writes the complete definition block, terminator included.
    pub fn write(&mut self, out: &mut WireWriter, all: bool) {
        out.write_u8(self.datatype().code());
        match self {
            Self::Custom(custom) => out.write_u32(custom.size()),
            Self::Range(range) => range.element_mut().write(out, all),
            _ => {}
        }
        dispatch!(&mut *self, d => d.write_options(out, all), ());
        out.terminate();
    }

    /// Parses a complete definition block, terminator included.
    pub fn parse(input: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let code = input.read_u8()?;
        let datatype =
            Datatype::from_code(code).ok_or(ProtocolError::UnknownDatatype(code))?;

        let mut definition = match datatype {
            Datatype::CustomType => Self::custom(input.read_u32()?),
            Datatype::Range => {
                // Check the element tag before recursing so nested range
                // tags cannot drive the parser arbitrarily deep.
                let element_code = input.peek_u8()?;
                match Datatype::from_code(element_code) {
                    Some(element) if element.is_number() => {}
                    Some(element) => return Err(ProtocolError::InvalidRangeElement(element)),
                    None => return Err(ProtocolError::UnknownDatatype(element_code)),
                }
                Self::Range(RangeDefinition::new(Self::parse(input)?)?)
            }
            other => {
                Self::for_datatype(other).ok_or(ProtocolError::UnsupportedDatatype(other))?
            }
        };

        loop {
            let code = input.read_u8()?;
            if code == TERMINATOR {
                break;
            }
            let known = dispatch!(&mut definition, d => d.parse_option(code, input)?, false);
            if !known {
                return Err(ProtocolError::UnknownOption {
                    context: "type definition",
                    code,
                });
            }
        }
        Ok(definition)
    }

    /// Applies the present schema fields of a parsed proxy of the same
    /// datatype. Returns whether anything changed.
    pub(crate) fn merge(&mut self, other: &TypeDefinition) -> bool {
        dispatch_pair!(
            self, other;
            Boolean, Int8, UInt8, Int16, UInt16, Int32, UInt32, Int64, UInt64,
            Float32, Float64, String, Enum, Uri, Rgb, Rgba, Ipv4, Ipv6, Range, Custom
        )
    }
}

// =========================================================================
// Tests
// =========================================================================
