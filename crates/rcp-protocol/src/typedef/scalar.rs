//! Definitions whose only option is a default value.
//!
//! Used for booleans, colors, and IP addresses.

use super::{option, Definition};
use crate::field::Field;
use crate::value::Scalar;
use crate::wire::{WireReader, WireWriter};
use crate::{ProtocolError, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct DefaultDefinition<T> {
    default: Field<T>,
}

impl<T> Default for DefaultDefinition<T> {
    fn default() -> Self {
        Self {
            default: Field::default(),
        }
    }
}

impl<T: Scalar> DefaultDefinition<T> {
    pub fn default_value(&self) -> Option<&T> {
        self.default.get()
    }

    pub fn set_default(&mut self, value: T) -> bool {
        self.default.set(value)
    }

    pub fn clear_default(&mut self) {
        self.default.clear();
    }
}

impl<T: Scalar> Definition for DefaultDefinition<T> {
    fn write_options(&mut self, out: &mut WireWriter, all: bool) {
        self.default
            .write_option(out, option::DEFAULT, all, T::zero, |out, v| v.write_to(out));
    }

    fn parse_option(
        &mut self,
        code: u8,
        input: &mut WireReader<'_>,
    ) -> Result<bool, ProtocolError> {
        if code != option::DEFAULT {
            return Ok(false);
        }
        self.default.apply(T::read_from(input)?);
        Ok(true)
    }

    fn merge(&mut self, other: &Self) -> bool {
        self.default.merge(&other.default)
    }

    fn has_changes(&self) -> bool {
        self.default.is_changed()
    }

    fn mark_clean(&mut self) {
        self.default.mark_clean();
    }

    fn read_value(&self, input: &mut WireReader<'_>) -> Result<Value, ProtocolError> {
        T::read_from(input).map(T::into_value)
    }

    fn write_value(&self, value: &Value, out: &mut WireWriter) {
        match T::from_value(value) {
            Some(v) => v.write_to(out),
            None => {
                tracing::warn!(%value, "value shape does not match definition");
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
