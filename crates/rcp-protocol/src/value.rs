//! Parameter values.
//!
//! [`Value`] is the dynamic value carried by a parameter. It records the
//! *shape* of the data only: whether a text value is a plain string, an
//! enum selection or a URI, and whether a color has alpha, is decided by
//! the parameter's type definition, which also picks the wire encoding.
//!
//! The [`Scalar`] and [`Number`] traits connect Rust primitives to that
//! dynamic form and to their fixed-width wire encoding, so the type
//! definitions for numbers, booleans, colors and addresses can be written
//! once, generically.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::wire::{WireReader, WireWriter};
use crate::{Color, Datatype, ProtocolError};

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    /// String, enum selection, or URI.
    Text(String),
    /// RGB or RGBA.
    Color(Color),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Range(Box<RangeValue>),
    /// Opaque bytes of a custom type.
    Bytes(Vec<u8>),
}

impl Value {
    /// The numeric datatype this value was built from, if it is a number.
    pub fn number_datatype(&self) -> Option<Datatype> {
        let datatype = match self {
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
            _ => return None,
        };
        Some(datatype)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Color(c) => write!(f, "#{:02x}{:02x}{:02x}{:02x}", c.r, c.g, c.b, c.a),
            Self::Ipv4(v) => write!(f, "{v}"),
            Self::Ipv6(v) => write!(f, "{v}"),
            Self::Range(r) => write!(f, "{}..{}", r.lower, r.upper),
            Self::Bytes(v) => write!(f, "{} bytes", v.len()),
        }
    }
}

/// The value of a range parameter: two numbers of the element type.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeValue {
    pub lower: Value,
    pub upper: Value,
}

impl RangeValue {
    pub fn new(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self {
            lower: lower.into(),
            upper: upper.into(),
        }
    }
}

impl From<RangeValue> for Value {
    fn from(range: RangeValue) -> Self {
        Self::Range(Box::new(range))
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

// ---------------------------------------------------------------------------
// Scalar / Number
// ---------------------------------------------------------------------------

/// A fixed-width value with a direct wire encoding.
pub trait Scalar: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The value written when a field holding this type is cleared.
    fn zero() -> Self;

    fn write_to(&self, out: &mut WireWriter);

    fn read_from(input: &mut WireReader<'_>) -> Result<Self, ProtocolError>;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

/// A numeric scalar with bounds; the element type of number and range
/// definitions.
pub trait Number: Scalar + Copy + PartialOrd {
    const DATATYPE: Datatype;
    const MIN: Self;
    const MAX: Self;
}

macro_rules! number {
    ($ty:ty, $variant:ident, $write:ident, $read:ident) => {
        impl Scalar for $ty {
            fn zero() -> Self {
                0 as $ty
            }

            fn write_to(&self, out: &mut WireWriter) {
                out.$write(*self);
            }

            fn read_from(input: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
                input.$read()
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }

        impl Number for $ty {
            const DATATYPE: Datatype = Datatype::$variant;
            const MIN: Self = <$ty>::MIN;
            const MAX: Self = <$ty>::MAX;
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

number!(i8, Int8, write_i8, read_i8);
number!(u8, UInt8, write_u8, read_u8);
number!(i16, Int16, write_i16, read_i16);
number!(u16, UInt16, write_u16, read_u16);
number!(i32, Int32, write_i32, read_i32);
number!(u32, UInt32, write_u32, read_u32);
number!(i64, Int64, write_i64, read_i64);
number!(u64, UInt64, write_u64, read_u64);
number!(f32, Float32, write_f32, read_f32);
number!(f64, Float64, write_f64, read_f64);

impl Scalar for bool {
    fn zero() -> Self {
        false
    }

    fn write_to(&self, out: &mut WireWriter) {
        out.write_bool(*self);
    }

    fn read_from(input: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        input.read_bool()
    }

    fn into_value(self) -> Value {
        Value::Boolean(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl Scalar for Color {
    fn zero() -> Self {
        Color::default()
    }

    fn write_to(&self, out: &mut WireWriter) {
        out.write_u32(self.to_packed());
    }

    fn read_from(input: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Color::from_packed(input.read_u32()?))
    }

    fn into_value(self) -> Value {
        Value::Color(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Color(color) => Some(*color),
            _ => None,
        }
    }
}

impl From<Color> for Value {
    fn from(color: Color) -> Self {
        Self::Color(color)
    }
}

impl Scalar for Ipv4Addr {
    fn zero() -> Self {
        Ipv4Addr::UNSPECIFIED
    }

    fn write_to(&self, out: &mut WireWriter) {
        out.write_u32(u32::from(*self));
    }

    fn read_from(input: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Ipv4Addr::from(input.read_u32()?))
    }

    fn into_value(self) -> Value {
        Value::Ipv4(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Ipv4(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl From<Ipv4Addr> for Value {
    fn from(addr: Ipv4Addr) -> Self {
        Self::Ipv4(addr)
    }
}

// Sixteen bytes, i.e. four big-endian u32 words in address order.
impl Scalar for Ipv6Addr {
    fn zero() -> Self {
        Ipv6Addr::UNSPECIFIED
    }

    fn write_to(&self, out: &mut WireWriter) {
        out.write_bytes(&self.octets());
    }

    fn read_from(input: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let octets: [u8; 16] = input.read_array()?;
        Ok(Ipv6Addr::from(octets))
    }

    fn into_value(self) -> Value {
        Value::Ipv6(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Ipv6(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl From<Ipv6Addr> for Value {
    fn from(addr: Ipv6Addr) -> Self {
        Self::Ipv6(addr)
    }
}
