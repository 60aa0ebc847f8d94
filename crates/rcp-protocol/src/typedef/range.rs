//! Ranges: a pair of numbers described by a nested element definition.

use super::{option, Definition, TypeDefinition};
use crate::field::Field;
use crate::wire::{WireReader, WireWriter};
use crate::{ProtocolError, RangeValue, Value};

/// Schema for a range parameter.
///
/// The element definition (any numeric datatype, with its own bounds and
/// unit) is written as a complete block right after the range tag. The
/// range's own options follow.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeDefinition {
    element: Box<TypeDefinition>,
    default: Field<RangeValue>,
}

impl RangeDefinition {
    /// Fails unless `element` is a number definition.
    pub fn new(element: TypeDefinition) -> Result<Self, ProtocolError> {
        let datatype = element.datatype();
        if !datatype.is_number() {
            return Err(ProtocolError::InvalidRangeElement(datatype));
        }
        Ok(Self {
            element: Box::new(element),
            default: Field::default(),
        })
    }

    pub fn element(&self) -> &TypeDefinition {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut TypeDefinition {
        &mut self.element
    }

    pub fn default_value(&self) -> Option<&RangeValue> {
        self.default.get()
    }

    /// Rejects pairs whose sides are not values of the element type.
    pub fn set_default(&mut self, value: RangeValue) -> Result<bool, ProtocolError> {
        if !self.accepts_pair(&value) {
            return Err(ProtocolError::ValueMismatch {
                expected: self.element.datatype(),
            });
        }
        Ok(self.default.set(value))
    }

    pub fn clear_default(&mut self) {
        self.default.clear();
    }

    fn accepts_pair(&self, range: &RangeValue) -> bool {
        self.element.accepts(&range.lower) && self.element.accepts(&range.upper)
    }

    fn read_pair(&self, input: &mut WireReader<'_>) -> Result<RangeValue, ProtocolError> {
        let lower = self.element.read_value(input)?;
        let upper = self.element.read_value(input)?;
        Ok(RangeValue { lower, upper })
    }

    fn zero_pair(&self) -> RangeValue {
        let zero = self.element.zero_value().unwrap_or(Value::Int32(0));
        RangeValue {
            lower: zero.clone(),
            upper: zero,
        }
    }
}

impl Definition for RangeDefinition {
    fn write_options(&mut self, out: &mut WireWriter, all: bool) {
        let zero = self.zero_pair();
        let element = &self.element;
        self.default
            .write_option(out, option::DEFAULT, all, || zero, |out, pair| {
                element.write_value(&pair.lower, out);
                element.write_value(&pair.upper, out);
            });
    }

    fn parse_option(
        &mut self,
        code: u8,
        input: &mut WireReader<'_>,
    ) -> Result<bool, ProtocolError> {
        if code != option::DEFAULT {
            return Ok(false);
        }
        let pair = self.read_pair(input)?;
        self.default.apply(pair);
        Ok(true)
    }

    fn merge(&mut self, other: &Self) -> bool {
        let applied = self.element.merge(&other.element);
        self.default.merge(&other.default) || applied
    }

    fn has_changes(&self) -> bool {
        self.element.has_changes() || self.default.is_changed()
    }

    fn mark_clean(&mut self) {
        self.element.mark_clean();
        self.default.mark_clean();
    }

    fn read_value(&self, input: &mut WireReader<'_>) -> Result<Value, ProtocolError> {
        self.read_pair(input).map(Value::from)
    }

    fn write_value(&self, value: &Value, out: &mut WireWriter) {
        let pair = match value {
            Value::Range(pair) => pair.as_ref().clone(),
            other => {
                tracing::warn!(value = %other, "expected a range value");
                self.zero_pair()
            }
        };
        self.element.write_value(&pair.lower, out);
        self.element.write_value(&pair.upper, out);
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Range(pair) if self.accepts_pair(pair))
    }

    fn zero_value(&self) -> Value {
        self.zero_pair().into()
    }
}
