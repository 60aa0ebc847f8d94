//! Numeric definitions: default, bounds, step, scale, and unit.

use super::{option, Definition, TypeDefinition};
use crate::field::Field;
use crate::value::Number;
use crate::wire::{WireReader, WireWriter};
use crate::{NumberScale, ProtocolError, Value};

/// Schema for one of the ten numeric datatypes.
///
/// A cleared minimum is sent as the type's lowest value and a cleared
/// maximum as its highest, so a receiver that applies the sentinel ends up
/// unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberDefinition<T> {
    default: Field<T>,
    minimum: Field<T>,
    maximum: Field<T>,
    multiple_of: Field<T>,
    scale: Field<NumberScale>,
    unit: Field<String>,
}

impl<T> Default for NumberDefinition<T> {
    fn default() -> Self {
        Self {
            default: Field::default(),
            minimum: Field::default(),
            maximum: Field::default(),
            multiple_of: Field::default(),
            scale: Field::default(),
            unit: Field::default(),
        }
    }
}

impl<T: Number> NumberDefinition<T> {
    pub fn default_value(&self) -> Option<T> {
        self.default.get().copied()
    }

    pub fn set_default(&mut self, value: T) -> bool {
        self.default.set(value)
    }

    pub fn clear_default(&mut self) {
        self.default.clear();
    }

    pub fn minimum(&self) -> Option<T> {
        self.minimum.get().copied()
    }

    pub fn set_minimum(&mut self, value: T) -> bool {
        self.minimum.set(value)
    }

    pub fn clear_minimum(&mut self) {
        self.minimum.clear();
    }

    pub fn maximum(&self) -> Option<T> {
        self.maximum.get().copied()
    }

    pub fn set_maximum(&mut self, value: T) -> bool {
        self.maximum.set(value)
    }

    pub fn clear_maximum(&mut self) {
        self.maximum.clear();
    }

    pub fn multiple_of(&self) -> Option<T> {
        self.multiple_of.get().copied()
    }

    pub fn set_multiple_of(&mut self, value: T) -> bool {
        self.multiple_of.set(value)
    }

    pub fn clear_multiple_of(&mut self) {
        self.multiple_of.clear();
    }

    pub fn scale(&self) -> Option<NumberScale> {
        self.scale.get().copied()
    }

    pub fn set_scale(&mut self, scale: NumberScale) -> bool {
        self.scale.set(scale)
    }

    pub fn clear_scale(&mut self) {
        self.scale.clear();
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.get().map(String::as_str)
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) -> bool {
        self.unit.set(unit.into())
    }

    pub fn clear_unit(&mut self) {
        self.unit.clear();
    }

    /// Whether `value` lies within the configured bounds. Missing bounds
    /// do not constrain.
    pub fn contains(&self, value: T) -> bool {
        let above = self.minimum().is_none_or(|min| value >= min);
        let below = self.maximum().is_none_or(|max| value <= max);
        above && below
    }
}

impl<T: Number> Definition for NumberDefinition<T> {
    fn write_options(&mut self, out: &mut WireWriter, all: bool) {
        let write = |out: &mut WireWriter, v: &T| v.write_to(out);
        self.default
            .write_option(out, option::DEFAULT, all, T::zero, write);
        self.minimum
            .write_option(out, option::MINIMUM, all, || T::MIN, write);
        self.maximum
            .write_option(out, option::MAXIMUM, all, || T::MAX, write);
        self.multiple_of
            .write_option(out, option::MULTIPLE_OF, all, T::zero, write);
        self.scale.write_option(
            out,
            option::SCALE,
            all,
            NumberScale::default,
            |out, scale| out.write_u8(scale.code()),
        );
        self.unit.write_option(out, option::UNIT, all, String::new, |out, unit| {
            out.write_tiny_string(unit)
        });
    }

    fn parse_option(
        &mut self,
        code: u8,
        input: &mut WireReader<'_>,
    ) -> Result<bool, ProtocolError> {
        match code {
            option::DEFAULT => {
                self.default.apply(T::read_from(input)?);
            }
            option::MINIMUM => {
                self.minimum.apply(T::read_from(input)?);
            }
            option::MAXIMUM => {
                self.maximum.apply(T::read_from(input)?);
            }
            option::MULTIPLE_OF => {
                self.multiple_of.apply(T::read_from(input)?);
            }
            option::SCALE => {
                let raw = input.read_u8()?;
                let scale = NumberScale::from_code(raw).ok_or_else(|| {
                    ProtocolError::InvalidMessage(format!("unknown number scale {raw}"))
                })?;
                self.scale.apply(scale);
            }
            option::UNIT => {
                self.unit.apply(input.read_tiny_string()?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn merge(&mut self, other: &Self) -> bool {
        let mut applied = self.default.merge(&other.default);
        applied |= self.minimum.merge(&other.minimum);
        applied |= self.maximum.merge(&other.maximum);
        applied |= self.multiple_of.merge(&other.multiple_of);
        applied |= self.scale.merge(&other.scale);
        applied |= self.unit.merge(&other.unit);
        applied
    }

    fn has_changes(&self) -> bool {
        self.default.is_changed()
            || self.minimum.is_changed()
            || self.maximum.is_changed()
            || self.multiple_of.is_changed()
            || self.scale.is_changed()
            || self.unit.is_changed()
    }

    fn mark_clean(&mut self) {
        self.default.mark_clean();
        self.minimum.mark_clean();
        self.maximum.mark_clean();
        self.multiple_of.mark_clean();
        self.scale.mark_clean();
        self.unit.mark_clean();
    }

    fn read_value(&self, input: &mut WireReader<'_>) -> Result<Value, ProtocolError> {
        T::read_from(input).map(T::into_value)
    }

    fn write_value(&self, value: &Value, out: &mut WireWriter) {
        match T::from_value(value) {
            Some(v) => v.write_to(out),
            None => {
                tracing::warn!(%value, datatype = ?T::DATATYPE, "value shape does not match definition");
                T::zero().write_to(out);
            }
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        T::from_value(value).is_some()
    }

    fn zero_value(&self) -> Value {
        T::zero().into_value()
    }
}

// ---------------------------------------------------------------------------
// Typed access from TypeDefinition
// ---------------------------------------------------------------------------

/// Links a numeric primitive to its [`TypeDefinition`] variant.
pub trait NumberKind: Number {
    fn wrap(definition: NumberDefinition<Self>) -> TypeDefinition;

    fn unwrap(definition: &TypeDefinition) -> Option<&NumberDefinition<Self>>;

    fn unwrap_mut(definition: &mut TypeDefinition) -> Option<&mut NumberDefinition<Self>>;
}

macro_rules! number_kind {
    ($ty:ty, $variant:ident) => {
        impl NumberKind for $ty {
            fn wrap(definition: NumberDefinition<Self>) -> TypeDefinition {
                TypeDefinition::$variant(definition)
            }

            fn unwrap(definition: &TypeDefinition) -> Option<&NumberDefinition<Self>> {
                match definition {
                    TypeDefinition::$variant(d) => Some(d),
                    _ => None,
                }
            }

            fn unwrap_mut(
                definition: &mut TypeDefinition,
            ) -> Option<&mut NumberDefinition<Self>> {
                match definition {
                    TypeDefinition::$variant(d) => Some(d),
                    _ => None,
                }
            }
        }
    };
}

number_kind!(i8, Int8);
number_kind!(u8, UInt8);
number_kind!(i16, Int16);
number_kind!(u16, UInt16);
number_kind!(i32, Int32);
number_kind!(u32, UInt32);
number_kind!(i64, Int64);
number_kind!(u64, UInt64);
number_kind!(f32, Float32);
number_kind!(f64, Float64);

impl TypeDefinition {
    /// An empty number definition for `T`.
    pub fn number<T: NumberKind>() -> Self {
        T::wrap(NumberDefinition::default())
    }

    pub fn as_number<T: NumberKind>(&self) -> Option<&NumberDefinition<T>> {
        T::unwrap(self)
    }

    pub fn as_number_mut<T: NumberKind>(&mut self) -> Option<&mut NumberDefinition<T>> {
        T::unwrap_mut(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(definition: &mut NumberDefinition<i32>, all: bool) -> Vec<u8> {
        let mut out = WireWriter::new();
        definition.write_options(&mut out, all);
        out.into_vec()
    }

    #[test]
    fn test_write_options_in_code_order() {
        let mut definition = NumberDefinition::<i32>::default();
        definition.set_unit("ms");
        definition.set_minimum(-1);
        definition.set_default(3);
        assert_eq!(
            options(&mut definition, true),
            vec![
                0x30, 0, 0, 0, 3, //
                0x31, 0xff, 0xff, 0xff, 0xff, //
                0x35, 2, b'm', b's',
            ]
        );
    }

    #[test]
    fn test_clear_minimum_sends_type_lowest() {
        let mut definition = NumberDefinition::<i16>::default();
        definition.set_minimum(5);
        let mut out = WireWriter::new();
        definition.write_options(&mut out, false);

        definition.clear_minimum();
        let mut out = WireWriter::new();
        definition.write_options(&mut out, false);
        assert_eq!(out.as_slice(), &[0x31, 0x80, 0x00]);
    }

    #[test]
    fn test_clear_maximum_sends_type_highest() {
        let mut definition = NumberDefinition::<u8>::default();
        definition.clear_maximum();
        let mut out = WireWriter::new();
        definition.write_options(&mut out, false);
        assert_eq!(out.as_slice(), &[0x32, 0xff]);
    }

    #[test]
    fn test_second_delta_without_changes_is_empty() {
        let mut definition = NumberDefinition::<i32>::default();
        definition.set_maximum(100);
        assert!(!options(&mut definition, false).is_empty());
        assert!(options(&mut definition, false).is_empty());
    }

    #[test]
    fn test_parse_scale_unknown_code_returns_error() {
        let mut definition = NumberDefinition::<f32>::default();
        let mut input = WireReader::new(&[9]);
        assert!(definition.parse_option(option::SCALE, &mut input).is_err());
    }

    #[test]
    fn test_contains_respects_bounds() {
        let mut definition = NumberDefinition::<f64>::default();
        assert!(definition.contains(1e9));
        definition.set_minimum(0.0);
        definition.set_maximum(1.0);
        assert!(definition.contains(0.5));
        assert!(!definition.contains(1.5));
        assert!(!definition.contains(-0.1));
    }

    #[test]
    fn test_type_definition_number_typed_access() {
        let mut definition = TypeDefinition::number::<u64>();
        assert!(definition.as_number::<i64>().is_none());
        definition.as_number_mut::<u64>().unwrap().set_default(8);
        assert_eq!(definition.as_number::<u64>().unwrap().default_value(), Some(8));
    }
}
