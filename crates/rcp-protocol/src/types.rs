//! Identity types, command and datatype codes, and small value types.
//!
//! Every code in this module is part of the binary wire format, so the
//! numeric values are fixed. Each enum has a `from_code` constructor that
//! returns `None` for bytes outside the known set; the parsers turn that
//! into the matching [`ProtocolError`](crate::ProtocolError).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ParameterId
// ---------------------------------------------------------------------------

/// Identifier of a parameter, unique within one registry.
///
/// Ids travel as signed 16-bit integers. Id 0 is reserved for the root
/// group, which every registry owns and which is never sent on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParameterId(pub i16);

impl ParameterId {
    /// The implicit parent of every top-level parameter.
    pub const ROOT: Self = Self(0);

    pub fn is_root(self) -> bool {
        self.0 == 0
    }

    /// The id reinterpreted as unsigned, which is how allocation scans
    /// the id space (1..=65535).
    pub(crate) fn slot(self) -> u16 {
        self.0 as u16
    }

    pub(crate) fn from_slot(slot: u16) -> Self {
        Self(slot as i16)
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "param-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The first byte of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Version/info exchange. Without data it is a request.
    Info = 0x01,
    /// Client asks for a full dump of the parameter tree.
    Initialize = 0x02,
    /// Reserved for discovery; accepted and ignored.
    Discover = 0x03,
    /// Carries a full or delta parameter.
    Update = 0x04,
    /// Carries just an id and a bare value.
    UpdateValue = 0x05,
    /// Carries the id of a parameter that no longer exists.
    Remove = 0x06,
    /// Legacy alias of [`Info`](Self::Info).
    Version = 0x07,
}

impl Command {
    /// Returns `None` for 0x00 (invalid) and anything past the last command.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Info),
            0x02 => Some(Self::Initialize),
            0x03 => Some(Self::Discover),
            0x04 => Some(Self::Update),
            0x05 => Some(Self::UpdateValue),
            0x06 => Some(Self::Remove),
            0x07 => Some(Self::Version),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Datatype
// ---------------------------------------------------------------------------

/// Type tag carried by every type definition.
///
/// The vector, array and list tags are part of the code space but have
/// no schema implementation; parameters using them are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Datatype {
    CustomType = 0x01,
    Boolean = 0x10,
    Int8 = 0x11,
    UInt8 = 0x12,
    Int16 = 0x13,
    UInt16 = 0x14,
    Int32 = 0x15,
    UInt32 = 0x16,
    Int64 = 0x17,
    UInt64 = 0x18,
    Float32 = 0x19,
    Float64 = 0x1a,
    Vector2I32 = 0x1b,
    Vector2F32 = 0x1c,
    Vector3I32 = 0x1d,
    Vector3F32 = 0x1e,
    Vector4I32 = 0x1f,
    Vector4F32 = 0x20,
    String = 0x21,
    Rgb = 0x22,
    Rgba = 0x23,
    Enum = 0x24,
    Array = 0x25,
    List = 0x26,
    Bang = 0x27,
    Group = 0x28,
    Uri = 0x2a,
    Ipv4 = 0x2b,
    Ipv6 = 0x2c,
    Range = 0x2d,
}

impl Datatype {
    pub fn from_code(code: u8) -> Option<Self> {
        let datatype = match code {
            0x01 => Self::CustomType,
            0x10 => Self::Boolean,
            0x11 => Self::Int8,
            0x12 => Self::UInt8,
            0x13 => Self::Int16,
            0x14 => Self::UInt16,
            0x15 => Self::Int32,
            0x16 => Self::UInt32,
            0x17 => Self::Int64,
            0x18 => Self::UInt64,
            0x19 => Self::Float32,
            0x1a => Self::Float64,
            0x1b => Self::Vector2I32,
            0x1c => Self::Vector2F32,
            0x1d => Self::Vector3I32,
            0x1e => Self::Vector3F32,
            0x1f => Self::Vector4I32,
            0x20 => Self::Vector4F32,
            0x21 => Self::String,
            0x22 => Self::Rgb,
            0x23 => Self::Rgba,
            0x24 => Self::Enum,
            0x25 => Self::Array,
            0x26 => Self::List,
            0x27 => Self::Bang,
            0x28 => Self::Group,
            0x2a => Self::Uri,
            0x2b => Self::Ipv4,
            0x2c => Self::Ipv6,
            0x2d => Self::Range,
            _ => return None,
        };
        Some(datatype)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Integer and floating point types; the only valid range elements.
    pub fn is_number(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::UInt8
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float32
                | Self::Float64
        )
    }
}

// ---------------------------------------------------------------------------
// Option codes
// ---------------------------------------------------------------------------

/// Option codes that may follow the command byte of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketOption {
    Timestamp = 0x01,
    Data = 0x02,
}

impl PacketOption {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Timestamp),
            0x02 => Some(Self::Data),
            _ => None,
        }
    }
}

/// Option codes inside a parameter block, after its type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParameterOption {
    Value = 0x20,
    Label = 0x21,
    Description = 0x22,
    Tags = 0x23,
    Order = 0x24,
    ParentId = 0x25,
    Widget = 0x26,
    UserData = 0x27,
    UserId = 0x28,
}

impl ParameterOption {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x20 => Some(Self::Value),
            0x21 => Some(Self::Label),
            0x22 => Some(Self::Description),
            0x23 => Some(Self::Tags),
            0x24 => Some(Self::Order),
            0x25 => Some(Self::ParentId),
            0x26 => Some(Self::Widget),
            0x27 => Some(Self::UserData),
            0x28 => Some(Self::UserId),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Option code for the application id inside an info record.
pub const INFO_APPLICATION_ID: u8 = 0x1a;

// ---------------------------------------------------------------------------
// NumberScale
// ---------------------------------------------------------------------------

/// How a UI should map a numeric parameter onto a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum NumberScale {
    #[default]
    Linear = 0,
    Logarithmic = 1,
    Exp2 = 2,
}

impl NumberScale {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Linear),
            1 => Some(Self::Logarithmic),
            2 => Some(Self::Exp2),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// An 8-bit-per-channel color.
///
/// On the wire a color is one `u32` packed as `r | g << 8 | b << 16 | a << 24`.
/// RGB parameters use the same layout and ignore alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub fn to_packed(self) -> u32 {
        u32::from(self.r)
            | u32::from(self.g) << 8
            | u32::from(self.b) << 16
            | u32::from(self.a) << 24
    }

    pub fn from_packed(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_le_bytes();
        Self { r, g, b, a }
    }
}
