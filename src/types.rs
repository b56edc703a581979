//! This module contains the datapoint types and values carried by the Uyat MCU protocol.

use alloc::{string::String, vec::Vec};
use strum_macros::{EnumIter, FromRepr, IntoStaticStr};

use crate::error::DatapointError;

/// Identifier of a datapoint within the device's protocol namespace.
pub type DatapointNumber = u8;

/// Monotonic millisecond timestamp used for retry deadlines.
pub type Instant = fugit::TimerInstantU64<1_000>;

/// Millisecond duration used for retry timeouts.
pub type Timeout = fugit::MillisDurationU32;

/// Index of an entity within a [`Device`](crate::device::Device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u16);

impl EntityId {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Concrete type of a datapoint as it is tagged on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, FromRepr, IntoStaticStr)]
#[repr(u8)]
pub enum WireType {
    /// 0: Raw byte sequence.
    Raw = 0x00,
    /// 1: Boolean, one byte.
    Bool = 0x01,
    /// 2: Unsigned 32 bit value, big endian. Called "value" by the vendor.
    UInt = 0x02,
    /// 3: String, remainder of the payload.
    String = 0x03,
    /// 4: Enum ordinal, one byte.
    Enum = 0x04,
    /// 5: Bitmask of 1, 2 or 4 bytes, big endian.
    Bitmask = 0x05,
}

impl WireType {
    /// Protocol type code of this wire type.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Look up the wire type for a protocol type code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::from_repr(code)
    }
}

impl From<WireType> for u8 {
    fn from(value: WireType) -> Self {
        value.code()
    }
}

/// Type declared for a datapoint binding.
///
/// Besides the concrete wire types this includes [`DatapointType::Any`], which accepts every
/// observed type, and [`DatapointType::Detect`], which is bound to the first type observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum DatapointType {
    Bool,
    UInt,
    Enum,
    String,
    Raw,
    Bitmask,
    /// Opaque passthrough, never rebound.
    Any,
    /// Unresolved until the first message for the datapoint arrives.
    Detect,
}

impl DatapointType {
    /// The concrete wire type, if this type is not `Any` or `Detect`.
    pub const fn concrete(self) -> Option<WireType> {
        match self {
            Self::Bool => Some(WireType::Bool),
            Self::UInt => Some(WireType::UInt),
            Self::Enum => Some(WireType::Enum),
            Self::String => Some(WireType::String),
            Self::Raw => Some(WireType::Raw),
            Self::Bitmask => Some(WireType::Bitmask),
            Self::Any | Self::Detect => None,
        }
    }

    pub const fn is_concrete(self) -> bool {
        self.concrete().is_some()
    }

    /// Whether a message of the observed wire type may be delivered for this declared type.
    pub fn accepts(self, observed: WireType) -> bool {
        match self.concrete() {
            Some(wire_type) => wire_type == observed,
            None => true,
        }
    }
}

impl From<WireType> for DatapointType {
    fn from(value: WireType) -> Self {
        match value {
            WireType::Raw => Self::Raw,
            WireType::Bool => Self::Bool,
            WireType::UInt => Self::UInt,
            WireType::String => Self::String,
            WireType::Enum => Self::Enum,
            WireType::Bitmask => Self::Bitmask,
        }
    }
}

/// A decoded datapoint value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatapointValue {
    Bool(bool),
    UInt(u32),
    Enum(u8),
    String(String),
    Raw(Vec<u8>),
    Bitmask(u32),
}

impl DatapointValue {
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Bool(_) => WireType::Bool,
            Self::UInt(_) => WireType::UInt,
            Self::Enum(_) => WireType::Enum,
            Self::String(_) => WireType::String,
            Self::Raw(_) => WireType::Raw,
            Self::Bitmask(_) => WireType::Bitmask,
        }
    }

    /// Encode this value into its wire payload.
    ///
    /// Bitmasks are always sent with the full 4 bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Bool(value) => alloc::vec![u8::from(*value)],
            Self::UInt(value) | Self::Bitmask(value) => value.to_be_bytes().to_vec(),
            Self::Enum(value) => alloc::vec![*value],
            Self::String(value) => value.as_bytes().to_vec(),
            Self::Raw(value) => value.clone(),
        }
    }

    /// Decode a wire payload of the given type.
    pub fn decode(wire_type: WireType, raw: &[u8]) -> Result<Self, DatapointError> {
        let malformed = DatapointError::Malformed {
            wire_type,
            len: raw.len(),
        };
        match wire_type {
            WireType::Bool => match raw {
                [value] => Ok(Self::Bool(*value != 0)),
                _ => Err(malformed),
            },
            WireType::UInt => {
                let bytes: [u8; 4] = raw.try_into().map_err(|_| malformed)?;
                Ok(Self::UInt(u32::from_be_bytes(bytes)))
            }
            WireType::Enum => match raw {
                [value] => Ok(Self::Enum(*value)),
                _ => Err(malformed),
            },
            WireType::Bitmask => match raw {
                [b0] => Ok(Self::Bitmask(u32::from(*b0))),
                [b0, b1] => Ok(Self::Bitmask(u32::from(u16::from_be_bytes([*b0, *b1])))),
                [b0, b1, b2, b3] => Ok(Self::Bitmask(u32::from_be_bytes([*b0, *b1, *b2, *b3]))),
                _ => Err(malformed),
            },
            WireType::String => core::str::from_utf8(raw)
                .map(|value| Self::String(String::from(value)))
                .map_err(|_| malformed),
            WireType::Raw => Ok(Self::Raw(raw.to_vec())),
        }
    }

    /// Numeric view of the value, for every fixed width type.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Bool(value) => Some(u32::from(*value)),
            Self::UInt(value) | Self::Bitmask(value) => Some(*value),
            Self::Enum(value) => Some(u32::from(*value)),
            Self::String(_) | Self::Raw(_) => None,
        }
    }

    /// Boolean view of the value. Numeric types are true when non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_u32().map(|value| value != 0)
    }

    /// Byte view of the value, for strings and raw payloads.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::String(value) => Some(value.as_bytes()),
            Self::Raw(value) => Some(value),
            _ => None,
        }
    }

    /// Build a boolean value for a datapoint of the given wire type.
    pub fn from_bool(wire_type: WireType, value: bool) -> Option<Self> {
        match wire_type {
            WireType::Bool => Some(Self::Bool(value)),
            WireType::UInt => Some(Self::UInt(u32::from(value))),
            WireType::Enum => Some(Self::Enum(u8::from(value))),
            _ => None,
        }
    }

    /// Build a numeric value for a datapoint of the given wire type.
    ///
    /// Returns `None` if the value does not fit, e.g. an enum ordinal above 255.
    pub fn from_u32(wire_type: WireType, value: u32) -> Option<Self> {
        match wire_type {
            WireType::UInt => Some(Self::UInt(value)),
            WireType::Enum => u8::try_from(value).ok().map(Self::Enum),
            WireType::Bitmask => Some(Self::Bitmask(value)),
            WireType::Bool => match value {
                0 => Some(Self::Bool(false)),
                1 => Some(Self::Bool(true)),
                _ => None,
            },
            WireType::String | WireType::Raw => None,
        }
    }
}

/// Round a non-negative float to the nearest integer.
///
/// `f32::round` is not available without `std`; negative inputs saturate to zero.
pub(crate) fn round_u32(value: f32) -> u32 {
    (value + 0.5) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn wire_type_code_conversions() {
        // Converting between the type code and WireType should be the same in both directions.
        for wire_type in WireType::iter() {
            assert_eq!(WireType::from_code(wire_type.code()), Some(wire_type));
            assert!(DatapointType::from(wire_type).accepts(wire_type));
        }
        assert_eq!(WireType::from_code(0x06), None);
    }

    #[test]
    fn only_any_and_detect_are_not_concrete() {
        assert!(!DatapointType::Any.is_concrete());
        assert!(!DatapointType::Detect.is_concrete());
        assert!(DatapointType::Detect.accepts(WireType::String));
        assert!(!DatapointType::Bool.accepts(WireType::UInt));
    }

    #[test]
    fn decode_fixed_width_values() {
        assert_eq!(
            DatapointValue::decode(WireType::Bool, &[0x01]),
            Ok(DatapointValue::Bool(true))
        );
        assert_eq!(
            DatapointValue::decode(WireType::UInt, &[0x00, 0x00, 0x01, 0x2C]),
            Ok(DatapointValue::UInt(300))
        );
        assert_eq!(
            DatapointValue::decode(WireType::Enum, &[0x02]),
            Ok(DatapointValue::Enum(2))
        );
        assert_eq!(
            DatapointValue::decode(WireType::Bitmask, &[0x01, 0x02]),
            Ok(DatapointValue::Bitmask(0x0102))
        );
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        assert_eq!(
            DatapointValue::decode(WireType::UInt, &[0x01, 0x02]),
            Err(DatapointError::Malformed {
                wire_type: WireType::UInt,
                len: 2
            })
        );
        assert!(DatapointValue::decode(WireType::Bool, &[]).is_err());
        assert!(DatapointValue::decode(WireType::Bitmask, &[0, 0, 0]).is_err());
        assert!(DatapointValue::decode(WireType::String, &[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn encode_uint_is_big_endian() {
        assert_eq!(
            DatapointValue::UInt(0x0102_0304).encode(),
            vec![0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(DatapointValue::Bool(true).encode(), vec![0x01]);
        assert_eq!(DatapointValue::Bitmask(0x05).encode(), vec![0, 0, 0, 0x05]);
    }

    #[test]
    fn bool_follows_wire_type() {
        assert_eq!(
            DatapointValue::from_bool(WireType::Enum, true),
            Some(DatapointValue::Enum(1))
        );
        assert_eq!(
            DatapointValue::from_bool(WireType::UInt, false),
            Some(DatapointValue::UInt(0))
        );
        assert_eq!(DatapointValue::from_bool(WireType::String, true), None);
        assert_eq!(DatapointValue::from_u32(WireType::Enum, 256), None);
    }

    #[test]
    fn rounding_helper() {
        assert_eq!(round_u32(84.5), 85);
        assert_eq!(round_u32(84.49), 84);
        assert_eq!(round_u32(-3.0), 0);
    }
}
