//! Text-valued definitions: string, enum, and URI.

use super::{option, Definition};
use crate::field::Field;
use crate::wire::{WireReader, WireWriter, TERMINATOR};
use crate::{ProtocolError, Value};

fn text_value(value: &Value) -> &str {
    match value.as_text() {
        Some(text) => text,
        None => {
            tracing::warn!(%value, "expected a text value");
            ""
        }
    }
}

// ---------------------------------------------------------------------------
// StringDefinition
// ---------------------------------------------------------------------------

/// Free text. Default, regex, and values are long strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringDefinition {
    default: Field<String>,
    regex: Field<String>,
}

impl StringDefinition {
    pub fn default_value(&self) -> Option<&str> {
        self.default.get().map(String::as_str)
    }

    pub fn set_default(&mut self, value: impl Into<String>) -> bool {
        self.default.set(value.into())
    }

    pub fn clear_default(&mut self) {
        self.default.clear();
    }

    pub fn regex(&self) -> Option<&str> {
        self.regex.get().map(String::as_str)
    }

    pub fn set_regex(&mut self, regex: impl Into<String>) -> bool {
        self.regex.set(regex.into())
    }

    pub fn clear_regex(&mut self) {
        self.regex.clear();
    }
}

impl Definition for StringDefinition {
    fn write_options(&mut self, out: &mut WireWriter, all: bool) {
        self.default.write_option(out, option::DEFAULT, all, String::new, |out, v| {
            out.write_long_string(v)
        });
        self.regex.write_option(out, option::REGEX, all, String::new, |out, v| {
            out.write_long_string(v)
        });
    }

    fn parse_option(
        &mut self,
        code: u8,
        input: &mut WireReader<'_>,
    ) -> Result<bool, ProtocolError> {
        match code {
            option::DEFAULT => {
                self.default.apply(input.read_long_string()?);
            }
            option::REGEX => {
                self.regex.apply(input.read_long_string()?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn merge(&mut self, other: &Self) -> bool {
        let applied = self.default.merge(&other.default);
        self.regex.merge(&other.regex) || applied
    }

    fn has_changes(&self) -> bool {
        self.default.is_changed() || self.regex.is_changed()
    }

    fn mark_clean(&mut self) {
        self.default.mark_clean();
        self.regex.mark_clean();
    }

    fn read_value(&self, input: &mut WireReader<'_>) -> Result<Value, ProtocolError> {
        input.read_long_string().map(Value::Text)
    }

    fn write_value(&self, value: &Value, out: &mut WireWriter) {
        out.write_long_string(text_value(value));
    }

    fn accepts(&self, value: &Value) -> bool {
        value.as_text().is_some()
    }

    fn zero_value(&self) -> Value {
        Value::Text(String::new())
    }
}

// ---------------------------------------------------------------------------
// EnumDefinition
// ---------------------------------------------------------------------------

/// A selection from an ordered list of entries.
///
/// The entry list is written as tiny strings closed by a zero length byte,
/// so an entry can never be empty. The selection itself is a tiny string.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumDefinition {
    default: Field<String>,
    entries: Field<Vec<String>>,
    multiselect: Field<bool>,
}

impl EnumDefinition {
    pub fn default_value(&self) -> Option<&str> {
        self.default.get().map(String::as_str)
    }

    pub fn set_default(&mut self, value: impl Into<String>) -> bool {
        self.default.set(value.into())
    }

    pub fn clear_default(&mut self) {
        self.default.clear();
    }

    pub fn entries(&self) -> &[String] {
        self.entries.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Replaces the entry list. Empty entries are dropped.
    pub fn set_entries<I, S>(&mut self, entries: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(Into::into)
            .filter(|entry: &String| !entry.is_empty())
            .collect();
        self.entries.set(entries)
    }

    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    pub fn multiselect(&self) -> Option<bool> {
        self.multiselect.get().copied()
    }

    pub fn set_multiselect(&mut self, multiselect: bool) -> bool {
        self.multiselect.set(multiselect)
    }

    pub fn clear_multiselect(&mut self) {
        self.multiselect.clear();
    }
}

impl Definition for EnumDefinition {
    fn write_options(&mut self, out: &mut WireWriter, all: bool) {
        self.default.write_option(out, option::DEFAULT, all, String::new, |out, v| {
            out.write_tiny_string(v)
        });
        self.entries
            .write_option(out, option::ENTRIES, all, Vec::new, |out, entries| {
                for entry in entries {
                    out.write_tiny_string(entry);
                }
                out.terminate();
            });
        self.multiselect
            .write_option(out, option::MULTISELECT, all, || false, |out, v| {
                out.write_bool(*v)
            });
    }

    fn parse_option(
        &mut self,
        code: u8,
        input: &mut WireReader<'_>,
    ) -> Result<bool, ProtocolError> {
        match code {
            option::DEFAULT => {
                self.default.apply(input.read_tiny_string()?);
            }
            option::ENTRIES => {
                let mut entries = Vec::new();
                while input.peek_u8()? != TERMINATOR {
                    entries.push(input.read_tiny_string()?);
                }
                input.read_u8()?;
                self.entries.apply(entries);
            }
            option::MULTISELECT => {
                self.multiselect.apply(input.read_bool()?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn merge(&mut self, other: &Self) -> bool {
        let mut applied = self.default.merge(&other.default);
        applied |= self.entries.merge(&other.entries);
        applied |= self.multiselect.merge(&other.multiselect);
        applied
    }

    fn has_changes(&self) -> bool {
        self.default.is_changed() || self.entries.is_changed() || self.multiselect.is_changed()
    }

    fn mark_clean(&mut self) {
        self.default.mark_clean();
        self.entries.mark_clean();
        self.multiselect.mark_clean();
    }

    fn read_value(&self, input: &mut WireReader<'_>) -> Result<Value, ProtocolError> {
        input.read_tiny_string().map(Value::Text)
    }

    fn write_value(&self, value: &Value, out: &mut WireWriter) {
        out.write_tiny_string(text_value(value));
    }

    fn accepts(&self, value: &Value) -> bool {
        value.as_text().is_some()
    }

    fn zero_value(&self) -> Value {
        Value::Text(String::new())
    }
}

// ---------------------------------------------------------------------------
// UriDefinition
// ---------------------------------------------------------------------------

/// A URI with an optional file filter and list of accepted schemas.
///
/// The schema list travels as one tiny string, space separated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UriDefinition {
    default: Field<String>,
    filter: Field<String>,
    schemas: Field<Vec<String>>,
}

impl UriDefinition {
    pub fn default_value(&self) -> Option<&str> {
        self.default.get().map(String::as_str)
    }

    pub fn set_default(&mut self, value: impl Into<String>) -> bool {
        self.default.set(value.into())
    }

    pub fn clear_default(&mut self) {
        self.default.clear();
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.get().map(String::as_str)
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) -> bool {
        self.filter.set(filter.into())
    }

    pub fn clear_filter(&mut self) {
        self.filter.clear();
    }

    pub fn schemas(&self) -> &[String] {
        self.schemas.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn set_schemas<I, S>(&mut self, schemas: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemas.set(schemas.into_iter().map(Into::into).collect())
    }

    pub fn clear_schemas(&mut self) {
        self.schemas.clear();
    }
}

impl Definition for UriDefinition {
    fn write_options(&mut self, out: &mut WireWriter, all: bool) {
        self.default.write_option(out, option::DEFAULT, all, String::new, |out, v| {
            out.write_long_string(v)
        });
        self.filter.write_option(out, option::FILTER, all, String::new, |out, v| {
            out.write_tiny_string(v)
        });
        self.schemas
            .write_option(out, option::SCHEMA, all, Vec::new, |out, schemas| {
                out.write_tiny_string(&schemas.join(" "))
            });
    }

    fn parse_option(
        &mut self,
        code: u8,
        input: &mut WireReader<'_>,
    ) -> Result<bool, ProtocolError> {
        match code {
            option::DEFAULT => {
                self.default.apply(input.read_long_string()?);
            }
            option::FILTER => {
                self.filter.apply(input.read_tiny_string()?);
            }
            option::SCHEMA => {
                let joined = input.read_tiny_string()?;
                self.schemas
                    .apply(joined.split_whitespace().map(str::to_string).collect());
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn merge(&mut self, other: &Self) -> bool {
        let mut applied = self.default.merge(&other.default);
        applied |= self.filter.merge(&other.filter);
        applied |= self.schemas.merge(&other.schemas);
        applied
    }

    fn has_changes(&self) -> bool {
        self.default.is_changed() || self.filter.is_changed() || self.schemas.is_changed()
    }

    fn mark_clean(&mut self) {
        self.default.mark_clean();
        self.filter.mark_clean();
        self.schemas.mark_clean();
    }

    fn read_value(&self, input: &mut WireReader<'_>) -> Result<Value, ProtocolError> {
        input.read_long_string().map(Value::Text)
    }

    fn write_value(&self, value: &Value, out: &mut WireWriter) {
        out.write_long_string(text_value(value));
    }

    fn accepts(&self, value: &Value) -> bool {
        value.as_text().is_some()
    }

    fn zero_value(&self) -> Value {
        Value::Text(String::new())
    }
}
