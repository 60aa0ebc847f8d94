//! Application-defined opaque values of a fixed byte size.

use super::{option, Definition};
use crate::field::Field;
use crate::wire::{WireReader, WireWriter};
use crate::{ProtocolError, Value};

/// Schema for a custom type.
///
/// The byte size is mandatory and written right after the datatype tag.
/// Values and the default are exactly `size` raw bytes; the UUID names the
/// application type and the config blob is free-form.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomDefinition {
    size: u32,
    default: Field<Vec<u8>>,
    uuid: Field<[u8; 16]>,
    config: Field<Vec<u8>>,
}

impl CustomDefinition {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            default: Field::default(),
            uuid: Field::default(),
            config: Field::default(),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn default_value(&self) -> Option<&[u8]> {
        self.default.get().map(Vec::as_slice)
    }

    /// Sets the default, padding with zeros or cutting to the type size.
    pub fn set_default(&mut self, value: Vec<u8>) -> bool {
        let value = fit(&value, self.size);
        self.default.set(value)
    }

    pub fn clear_default(&mut self) {
        self.default.clear();
    }

    pub fn uuid(&self) -> Option<[u8; 16]> {
        self.uuid.get().copied()
    }

    pub fn set_uuid(&mut self, uuid: [u8; 16]) -> bool {
        self.uuid.set(uuid)
    }

    pub fn clear_uuid(&mut self) {
        self.uuid.clear();
    }

    pub fn config(&self) -> Option<&[u8]> {
        self.config.get().map(Vec::as_slice)
    }

    pub fn set_config(&mut self, config: Vec<u8>) -> bool {
        self.config.set(config)
    }

    pub fn clear_config(&mut self) {
        self.config.clear();
    }
}

fn fit(data: &[u8], size: u32) -> Vec<u8> {
    let mut fitted = data.to_vec();
    fitted.resize(size as usize, 0);
    fitted
}

impl Definition for CustomDefinition {
    fn write_options(&mut self, out: &mut WireWriter, all: bool) {
        let size = self.size;
        self.default.write_option(
            out,
            option::DEFAULT,
            all,
            || vec![0; size as usize],
            |out, v| out.write_bytes(&fit(v, size)),
        );
        self.uuid
            .write_option(out, option::UUID, all, || [0; 16], |out, v| out.write_bytes(v));
        self.config
            .write_option(out, option::CONFIG, all, Vec::new, |out, v| out.write_blob(v));
    }

    fn parse_option(
        &mut self,
        code: u8,
        input: &mut WireReader<'_>,
    ) -> Result<bool, ProtocolError> {
        match code {
            option::DEFAULT => {
                self.default.apply(input.read_bytes(self.size as usize)?);
            }
            option::UUID => {
                self.uuid.apply(input.read_array()?);
            }
            option::CONFIG => {
                self.config.apply(input.read_blob()?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn merge(&mut self, other: &Self) -> bool {
        if other.size != self.size {
            tracing::warn!(
                local = self.size,
                remote = other.size,
                "custom type size differs, ignoring schema update"
            );
            return false;
        }
        let mut applied = self.default.merge(&other.default);
        applied |= self.uuid.merge(&other.uuid);
        applied |= self.config.merge(&other.config);
        applied
    }

    fn has_changes(&self) -> bool {
        self.default.is_changed() || self.uuid.is_changed() || self.config.is_changed()
    }

    fn mark_clean(&mut self) {
        self.default.mark_clean();
        self.uuid.mark_clean();
        self.config.mark_clean();
    }

    fn read_value(&self, input: &mut WireReader<'_>) -> Result<Value, ProtocolError> {
        input.read_bytes(self.size as usize).map(Value::Bytes)
    }

    fn write_value(&self, value: &Value, out: &mut WireWriter) {
        match value {
            Value::Bytes(data) => out.write_bytes(&fit(data, self.size)),
            other => {
                tracing::warn!(value = %other, "expected a byte value");
                out.write_bytes(&fit(&[], self.size));
            }
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(data) if data.len() == self.size as usize)
    }

    fn zero_value(&self) -> Value {
        Value::Bytes(vec![0; self.size as usize])
    }
}
