//! The parameter node: metadata, typed value, and group children.
//!
//! A [`Parameter`] is one entry in the exposed tree. It is always owned by
//! a [`ParameterRegistry`](crate::ParameterRegistry); other parameters
//! refer to it by [`ParameterId`], never by pointer. A group keeps the ids
//! of its children and every child keeps the id of its group.
//!
//! # Wire layout
//!
//! ```text
//! id(i16)
//! type definition block            (datatype, options, 0x00)
//! [0x20 value]                     (value parameters only)
//! [0x21 label block]
//! [0x22 description block]
//! [0x23 tags: tiny string]
//! [0x24 order: i32]
//! [0x25 parent id: i16]            (0 = root)
//! [0x27 user data: u32 len + bytes]
//! [0x28 user id: tiny string]
//! 0x00
//! ```
//!
//! Top-level parameters carry no parent option; their parent is the root
//! implicitly.

use std::collections::BTreeSet;
use std::fmt;

use crate::field::{Field, LocalizedText, TextWidth};
use crate::wire::{WireReader, WireWriter, TERMINATOR};
use crate::{Datatype, ParameterId, ParameterOption, ProtocolError, TypeDefinition, Value};

/// Called after a remote update changed anything on the parameter.
pub type UpdatedCallback = Box<dyn FnMut(&Parameter) + Send>;

/// Called after a remote update changed the parameter's value.
pub type ValueCallback = Box<dyn FnMut(&Value) + Send>;

pub struct Parameter {
    id: ParameterId,
    definition: TypeDefinition,
    value: Field<Value>,
    label: LocalizedText,
    description: LocalizedText,
    tags: Field<String>,
    order: Field<i32>,
    parent: Field<ParameterId>,
    user_data: Field<Vec<u8>>,
    user_id: Field<String>,
    children: BTreeSet<ParameterId>,
    on_updated: Option<UpdatedCallback>,
    on_value: Option<ValueCallback>,
}

impl Parameter {
    pub fn new(id: ParameterId, definition: TypeDefinition) -> Self {
        Self {
            id,
            definition,
            value: Field::default(),
            label: LocalizedText::default(),
            description: LocalizedText::default(),
            tags: Field::default(),
            order: Field::default(),
            parent: Field::default(),
            user_data: Field::default(),
            user_id: Field::default(),
            children: BTreeSet::new(),
            on_updated: None,
            on_value: None,
        }
    }

    pub fn id(&self) -> ParameterId {
        self.id
    }

    pub fn datatype(&self) -> Datatype {
        self.definition.datatype()
    }

    pub fn definition(&self) -> &TypeDefinition {
        &self.definition
    }

    pub fn definition_mut(&mut self) -> &mut TypeDefinition {
        &mut self.definition
    }

    pub fn is_group(&self) -> bool {
        matches!(self.definition, TypeDefinition::Group)
    }

    // -- Value -----------------------------------------------------------

    pub fn value(&self) -> Option<&Value> {
        self.value.get()
    }

    /// Sets the value after checking it against the type definition.
    ///
    /// Returns `Ok(false)` when the value is unchanged.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<bool, ProtocolError> {
        let value = value.into();
        if !self.definition.has_value() {
            return Err(ProtocolError::NoValue(self.datatype()));
        }
        if !self.definition.accepts(&value) {
            return Err(ProtocolError::ValueMismatch {
                expected: self.datatype(),
            });
        }
        Ok(self.value.set(value))
    }

    pub fn clear_value(&mut self) {
        if self.definition.has_value() {
            self.value.clear();
        }
    }

    // -- Metadata --------------------------------------------------------

    pub fn label(&self) -> Option<&str> {
        self.label.text()
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> bool {
        self.label.set(label)
    }

    pub fn language_label(&self, code: &str) -> Option<&str> {
        self.label.language(code)
    }

    pub fn set_language_label(&mut self, code: &str, label: impl Into<String>) -> bool {
        self.label.set_language(code, label)
    }

    pub fn remove_language_label(&mut self, code: &str) -> bool {
        self.label.remove_language(code)
    }

    /// Clears the label and all of its translations.
    pub fn clear_label(&mut self) {
        self.label.clear();
    }

    pub fn labels(&self) -> &LocalizedText {
        &self.label
    }

    pub fn description(&self) -> Option<&str> {
        self.description.text()
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> bool {
        self.description.set(description)
    }

    pub fn language_description(&self, code: &str) -> Option<&str> {
        self.description.language(code)
    }

    pub fn set_language_description(
        &mut self,
        code: &str,
        description: impl Into<String>,
    ) -> bool {
        self.description.set_language(code, description)
    }

    pub fn remove_language_description(&mut self, code: &str) -> bool {
        self.description.remove_language(code)
    }

    pub fn clear_description(&mut self) {
        self.description.clear();
    }

    pub fn descriptions(&self) -> &LocalizedText {
        &self.description
    }

    pub fn tags(&self) -> Option<&str> {
        self.tags.get().map(String::as_str)
    }

    pub fn set_tags(&mut self, tags: impl Into<String>) -> bool {
        self.tags.set(tags.into())
    }

    pub fn clear_tags(&mut self) {
        self.tags.clear();
    }

    pub fn order(&self) -> Option<i32> {
        self.order.get().copied()
    }

    pub fn set_order(&mut self, order: i32) -> bool {
        self.order.set(order)
    }

    pub fn clear_order(&mut self) {
        self.order.clear();
    }

    pub fn user_data(&self) -> Option<&[u8]> {
        self.user_data.get().map(Vec::as_slice)
    }

    pub fn set_user_data(&mut self, data: impl Into<Vec<u8>>) -> bool {
        self.user_data.set(data.into())
    }

    pub fn clear_user_data(&mut self) {
        self.user_data.clear();
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.get().map(String::as_str)
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> bool {
        self.user_id.set(user_id.into())
    }

    pub fn clear_user_id(&mut self) {
        self.user_id.clear();
    }

    // -- Tree ------------------------------------------------------------

    /// The enclosing group, or `None` when the parameter sits at the root.
    pub fn parent(&self) -> Option<ParameterId> {
        self.parent.get().copied().filter(|id| !id.is_root())
    }

    /// The parent reference as received, where `Some(ROOT)` is an explicit
    /// move to the root.
    pub(crate) fn parent_reference(&self) -> Option<ParameterId> {
        self.parent.get().copied()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ParameterId>) {
        match parent {
            Some(id) if !id.is_root() => {
                self.parent.set(id);
            }
            _ if self.parent.is_present() => self.parent.clear(),
            _ => {}
        }
    }

    /// Records a parent without marking it changed.
    pub(crate) fn apply_parent(&mut self, parent: Option<ParameterId>) -> bool {
        match parent {
            Some(id) if !id.is_root() => self.parent.apply(id),
            _ if self.parent.is_present() => {
                self.parent = Field::default();
                true
            }
            _ => false,
        }
    }

    /// Ids of direct children, in ascending order. Empty for non-groups.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = ParameterId> + '_ {
        self.children.iter().copied()
    }

    pub fn has_child(&self, id: ParameterId) -> bool {
        self.children.contains(&id)
    }

    pub(crate) fn insert_child(&mut self, id: ParameterId) -> bool {
        self.children.insert(id)
    }

    pub(crate) fn remove_child(&mut self, id: ParameterId) -> bool {
        self.children.remove(&id)
    }

    // -- Callbacks -------------------------------------------------------

    pub fn set_on_updated(&mut self, callback: impl FnMut(&Parameter) + Send + 'static) {
        self.on_updated = Some(Box::new(callback));
    }

    pub fn set_on_value_updated(&mut self, callback: impl FnMut(&Value) + Send + 'static) {
        self.on_value = Some(Box::new(callback));
    }

    pub fn clear_callbacks(&mut self) {
        self.on_updated = None;
        self.on_value = None;
    }

    pub(crate) fn notify_updated(&mut self) {
        if let Some(mut callback) = self.on_updated.take() {
            callback(self);
            // The callback may have installed a replacement.
            if self.on_updated.is_none() {
                self.on_updated = Some(callback);
            }
        }
    }

    // -- Change tracking -------------------------------------------------

    /// Whether any field changed since the last delta write.
    pub fn has_changes(&self) -> bool {
        self.value.is_changed()
            || self.label.is_changed()
            || self.description.is_changed()
            || self.tags.is_changed()
            || self.order.is_changed()
            || self.parent.is_changed()
            || self.user_data.is_changed()
            || self.user_id.is_changed()
            || self.definition.has_changes()
    }

    pub(crate) fn mark_clean(&mut self) {
        self.value.mark_clean();
        self.label.mark_clean();
        self.description.mark_clean();
        self.tags.mark_clean();
        self.order.mark_clean();
        self.parent.mark_clean();
        self.user_data.mark_clean();
        self.user_id.mark_clean();
        self.definition.mark_clean();
    }

    // -- Codec -----------------------------------------------------------

    /// Writes the parameter block. With `all` every present field is
    /// written; otherwise only changed fields, whose flags are then reset.
    pub fn write(&mut self, out: &mut WireWriter, all: bool) {
        out.write_i16(self.id.0);
        self.definition.write(out, all);

        if self.definition.has_value() {
            let definition = &self.definition;
            self.value.write_option(
                out,
                ParameterOption::Value.code(),
                all,
                || definition.zero_value().unwrap_or_else(|| Value::Bytes(Vec::new())),
                |out, value| definition.write_value(value, out),
            );
        }

        self.label
            .write(out, ParameterOption::Label.code(), all, TextWidth::Tiny);
        self.description
            .write(out, ParameterOption::Description.code(), all, TextWidth::Short);
        self.tags
            .write_option(out, ParameterOption::Tags.code(), all, String::new, |out, v| {
                out.write_tiny_string(v)
            });
        self.order
            .write_option(out, ParameterOption::Order.code(), all, || 0, |out, v| {
                out.write_i32(*v)
            });
        self.parent.write_option(
            out,
            ParameterOption::ParentId.code(),
            all,
            || ParameterId::ROOT,
            |out, v| out.write_i16(v.0),
        );
        self.user_data.write_option(
            out,
            ParameterOption::UserData.code(),
            all,
            Vec::new,
            |out, v| out.write_blob(v),
        );
        self.user_id
            .write_option(out, ParameterOption::UserId.code(), all, String::new, |out, v| {
                out.write_tiny_string(v)
            });

        out.terminate();
    }

    pub fn to_bytes(&mut self, all: bool) -> Vec<u8> {
        let mut out = WireWriter::new();
        self.write(&mut out, all);
        out.into_vec()
    }

    /// Parses a parameter block into a detached proxy.
    ///
    /// Schema errors discard the parameter. An unsupported metadata option
    /// ends option parsing but keeps what was read so far, since its length
    /// is unknown.
    pub fn parse(input: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let id = ParameterId(input.read_i16()?);
        let definition = TypeDefinition::parse(input)?;
        let mut parameter = Parameter::new(id, definition);

        loop {
            let code = input.read_u8()?;
            if code == TERMINATOR {
                break;
            }
            match ParameterOption::from_code(code) {
                Some(ParameterOption::Value) if parameter.definition.has_value() => {
                    let value = parameter.definition.read_value(input)?;
                    parameter.value.apply(value);
                }
                Some(ParameterOption::Label) => {
                    parameter.label = LocalizedText::parse(input, TextWidth::Tiny)?;
                }
                Some(ParameterOption::Description) => {
                    parameter.description = LocalizedText::parse(input, TextWidth::Short)?;
                }
                Some(ParameterOption::Tags) => {
                    parameter.tags.apply(input.read_tiny_string()?);
                }
                Some(ParameterOption::Order) => {
                    parameter.order.apply(input.read_i32()?);
                }
                Some(ParameterOption::ParentId) => {
                    parameter.parent.apply(ParameterId(input.read_i16()?));
                }
                Some(ParameterOption::UserData) => {
                    parameter.user_data.apply(input.read_blob()?);
                }
                Some(ParameterOption::UserId) => {
                    parameter.user_id.apply(input.read_tiny_string()?);
                }
                _ => {
                    tracing::warn!(%id, code, "unsupported parameter option, skipping rest");
                    break;
                }
            }
        }
        Ok(parameter)
    }

    /// Applies every present field of a parsed proxy except the parent,
    /// which only the registry can resolve. Fires the value callback when
    /// the value changed and returns whether anything changed.
    pub(crate) fn merge(&mut self, other: &Parameter) -> bool {
        let mut value_applied = false;
        if let Some(value) = other.value.get() {
            if self.definition.accepts(value) {
                value_applied = self.value.apply(value.clone());
            } else {
                tracing::warn!(id = %self.id, %value, "ignoring value of wrong shape");
            }
        }

        let mut applied = value_applied;
        applied |= self.definition.merge(&other.definition);
        applied |= self.label.merge(&other.label);
        applied |= self.description.merge(&other.description);
        applied |= self.tags.merge(&other.tags);
        applied |= self.order.merge(&other.order);
        applied |= self.user_data.merge(&other.user_data);
        applied |= self.user_id.merge(&other.user_id);

        if value_applied {
            if let (Some(callback), Some(value)) = (self.on_value.as_mut(), self.value.get()) {
                callback(value);
            }
        }
        applied
    }

    /// Applies a bare value received through a compact value update.
    pub(crate) fn apply_value(&mut self, value: Value) -> Result<bool, ProtocolError> {
        if !self.definition.accepts(&value) {
            return Err(ProtocolError::ValueMismatch {
                expected: self.datatype(),
            });
        }
        let applied = self.value.apply(value);
        if applied {
            if let (Some(callback), Some(value)) = (self.on_value.as_mut(), self.value.get()) {
                callback(value);
            }
        }
        Ok(applied)
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.definition == other.definition
            && self.value == other.value
            && self.label == other.label
            && self.description == other.description
            && self.tags == other.tags
            && self.order == other.order
            && self.parent == other.parent
            && self.user_data == other.user_data
            && self.user_id == other.user_id
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("id", &self.id)
            .field("definition", &self.definition)
            .field("value", &self.value.get())
            .field("label", &self.label)
            .field("parent", &self.parent())
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{Color, RangeValue};

    fn boolean(id: i16) -> Parameter {
        Parameter::new(
            ParameterId(id),
            TypeDefinition::for_datatype(Datatype::Boolean).unwrap(),
        )
    }

    fn roundtrip(parameter: &mut Parameter) -> Parameter {
        let bytes = parameter.to_bytes(true);
        let mut input = WireReader::new(&bytes);
        let parsed = Parameter::parse(&mut input).expect("parse");
        assert!(input.is_empty(), "trailing bytes");
        parsed
    }

    // =====================================================================
    // set / clear
    // =====================================================================

    #[test]
    fn test_set_value_matching_type_marks_changed() {
        let mut p = boolean(1);
        assert!(p.set_value(true).unwrap());
        assert!(p.has_changes());
        assert_eq!(p.value(), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_set_value_wrong_type_returns_mismatch() {
        let mut p = boolean(1);
        assert!(matches!(
            p.set_value(5i32),
            Err(ProtocolError::ValueMismatch {
                expected: Datatype::Boolean
            })
        ));
        assert!(!p.has_changes());
    }

    #[test]
    fn test_set_value_on_group_returns_no_value() {
        let mut group = Parameter::new(ParameterId(1), TypeDefinition::Group);
        assert!(matches!(
            group.set_value(true),
            Err(ProtocolError::NoValue(Datatype::Group))
        ));
    }

    #[test]
    fn test_set_label_equal_value_stays_clean() {
        let mut p = boolean(1);
        p.set_label("a");
        p.mark_clean();
        assert!(!p.set_label("a"));
        assert!(!p.has_changes());
    }

    // =====================================================================
    // write
    // =====================================================================

    #[test]
    fn test_write_bool_delta_bytes() {
        let mut p = boolean(1);
        p.set_label("BOOL");
        p.set_value(true).unwrap();
        assert_eq!(
            p.to_bytes(false),
            vec![
                0x00, 0x01, // id
                0x10, 0x00, // boolean definition, no options
                0x20, 0x01, // value
                0x21, b'a', b'n', b'y', 4, b'B', b'O', b'O', b'L', 0x00, // label
                0x00,
            ]
        );
    }

    #[test]
    fn test_write_second_delta_is_minimal() {
        let mut p = boolean(3);
        p.set_label("x");
        p.set_value(false).unwrap();
        p.set_order(2);
        p.to_bytes(false);
        assert!(!p.has_changes());
        assert_eq!(p.to_bytes(false), vec![0x00, 0x03, 0x10, 0x00, 0x00]);
    }

    #[test]
    fn test_write_full_keeps_dirty_flags() {
        let mut p = boolean(3);
        p.set_label("x");
        p.to_bytes(true);
        assert!(p.has_changes());
    }

    #[test]
    fn test_write_cleared_order_sends_zero() {
        let mut p = boolean(1);
        p.set_order(5);
        p.to_bytes(false);
        p.clear_order();
        assert_eq!(
            p.to_bytes(false),
            vec![0x00, 0x01, 0x10, 0x00, 0x24, 0, 0, 0, 0, 0x00]
        );
    }

    #[test]
    fn test_write_moved_to_root_sends_parent_zero() {
        let mut p = boolean(4);
        p.set_parent(Some(ParameterId(2)));
        p.to_bytes(false);
        p.set_parent(None);
        assert_eq!(
            p.to_bytes(false),
            vec![0x00, 0x04, 0x10, 0x00, 0x25, 0x00, 0x00, 0x00]
        );
    }

    // =====================================================================
    // parse round-trips
    // =====================================================================

    #[test]
    fn test_roundtrip_all_metadata() {
        let mut p = Parameter::new(ParameterId(-7), TypeDefinition::number::<i32>());
        p.set_value(42i32).unwrap();
        p.set_label("gain");
        p.set_language_label("deu", "Verstärkung");
        p.set_description("input gain");
        p.set_language_description("fra", "gain d'entrée");
        p.set_tags("audio input");
        p.set_order(3);
        p.set_parent(Some(ParameterId(9)));
        p.set_user_data(vec![1, 2, 3]);
        p.set_user_id("gain-1");
        {
            let number = p.definition_mut().as_number_mut::<i32>().unwrap();
            number.set_minimum(-10);
            number.set_maximum(100);
        }
        let parsed = roundtrip(&mut p);
        assert_eq!(parsed, p);
        assert_eq!(parsed.parent(), Some(ParameterId(9)));
        assert_eq!(parsed.language_label("deu"), Some("Verstärkung"));
    }

    #[test]
    fn test_roundtrip_every_value_datatype() {
        let cases: Vec<(TypeDefinition, Value)> = vec![
            (TypeDefinition::number::<i8>(), Value::Int8(-5)),
            (TypeDefinition::number::<u8>(), Value::UInt8(200)),
            (TypeDefinition::number::<i16>(), Value::Int16(-300)),
            (TypeDefinition::number::<u16>(), Value::UInt16(60_000)),
            (TypeDefinition::number::<u32>(), Value::UInt32(4_000_000_000)),
            (TypeDefinition::number::<i64>(), Value::Int64(-1 << 40)),
            (TypeDefinition::number::<u64>(), Value::UInt64(u64::MAX)),
            (TypeDefinition::number::<f32>(), Value::Float32(0.5)),
            (TypeDefinition::number::<f64>(), Value::Float64(-1.25)),
            (
                TypeDefinition::for_datatype(Datatype::String).unwrap(),
                Value::Text("hello".into()),
            ),
            (
                TypeDefinition::for_datatype(Datatype::Enum).unwrap(),
                Value::Text("b".into()),
            ),
            (
                TypeDefinition::for_datatype(Datatype::Uri).unwrap(),
                Value::Text("file:///tmp".into()),
            ),
            (
                TypeDefinition::for_datatype(Datatype::Rgb).unwrap(),
                Value::Color(Color::rgb(1, 2, 3)),
            ),
            (
                TypeDefinition::for_datatype(Datatype::Ipv4).unwrap(),
                Value::Ipv4("127.0.0.1".parse().unwrap()),
            ),
            (
                TypeDefinition::for_datatype(Datatype::Ipv6).unwrap(),
                Value::Ipv6("::1".parse().unwrap()),
            ),
            (
                TypeDefinition::range(Datatype::Int16).unwrap(),
                RangeValue::new(-1i16, 1i16).into(),
            ),
            (TypeDefinition::custom(2), Value::Bytes(vec![0xab, 0xcd])),
        ];

        for (index, (definition, value)) in cases.into_iter().enumerate() {
            let mut p = Parameter::new(ParameterId(index as i16 + 1), definition);
            p.set_value(value).unwrap();
            let parsed = roundtrip(&mut p);
            assert_eq!(parsed, p, "datatype {:?}", p.datatype());
        }
    }

    #[test]
    fn test_roundtrip_absent_and_cleared_fields_come_back_absent() {
        let mut p = boolean(2);
        p.set_tags("t");
        p.clear_tags();
        let parsed = roundtrip(&mut p);
        assert_eq!(parsed.tags(), None);
        assert_eq!(parsed.value(), None);
        assert_eq!(parsed.label(), None);
    }

    #[test]
    fn test_roundtrip_bang_and_group() {
        let mut bang = Parameter::new(
            ParameterId(1),
            TypeDefinition::for_datatype(Datatype::Bang).unwrap(),
        );
        bang.set_label("fire");
        assert_eq!(roundtrip(&mut bang), bang);

        let mut group = Parameter::new(ParameterId(2), TypeDefinition::Group);
        group.set_label("folder");
        let parsed = roundtrip(&mut group);
        assert!(parsed.is_group());
        assert_eq!(parsed.label(), Some("folder"));
    }

    #[test]
    fn test_parse_unknown_option_keeps_parsed_fields() {
        let bytes = [
            0x00, 0x05, 0x10, 0x00, // id 5, boolean
            0x20, 0x01, // value true
            0x26, 0x99, // widget (unsupported)
        ];
        let mut input = WireReader::new(&bytes);
        let parsed = Parameter::parse(&mut input).unwrap();
        assert_eq!(parsed.value(), Some(&Value::Boolean(true)));
        assert_eq!(input.remaining(), 1);
    }

    #[test]
    fn test_parse_truncated_value_returns_error() {
        let bytes = [0x00, 0x05, 0x15, 0x00, 0x20, 0x00, 0x01];
        let mut input = WireReader::new(&bytes);
        assert!(matches!(
            Parameter::parse(&mut input),
            Err(ProtocolError::UnexpectedEnd { .. })
        ));
    }

    // =====================================================================
    // merge
    // =====================================================================

    #[test]
    fn test_merge_applies_present_fields_without_dirtying() {
        let mut local = boolean(1);
        local.set_label("old");
        local.set_order(1);
        local.mark_clean();

        let mut incoming = boolean(1);
        incoming.set_label("new");
        incoming.set_value(true).unwrap();

        assert!(local.merge(&incoming));
        assert_eq!(local.label(), Some("new"));
        assert_eq!(local.order(), Some(1));
        assert_eq!(local.value(), Some(&Value::Boolean(true)));
        assert!(!local.has_changes());
    }

    #[test]
    fn test_merge_fires_value_callback_only_on_change() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut local = boolean(1);
        let sink = Arc::clone(&seen);
        local.set_on_value_updated(move |value| sink.lock().unwrap().push(value.clone()));

        let mut incoming = boolean(1);
        incoming.set_value(true).unwrap();
        local.merge(&incoming);
        local.merge(&incoming);

        assert_eq!(*seen.lock().unwrap(), vec![Value::Boolean(true)]);
    }

    #[test]
    fn test_notify_updated_keeps_callback_installed() {
        let count = Arc::new(Mutex::new(0));
        let mut p = boolean(1);
        let counter = Arc::clone(&count);
        p.set_on_updated(move |_| *counter.lock().unwrap() += 1);
        p.notify_updated();
        p.notify_updated();
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn test_apply_value_wrong_shape_returns_error() {
        let mut p = boolean(1);
        assert!(p.apply_value(Value::Int8(1)).is_err());
        assert!(p.apply_value(Value::Boolean(true)).unwrap());
        assert!(!p.has_changes());
    }

    #[test]
    fn test_label_delta_of_huge_custom_type_stays_small() {
        let mut p = Parameter::new(ParameterId(9), TypeDefinition::custom(u32::MAX));
        p.mark_clean();
        p.set_label("blob");

        let bytes = p.to_bytes(false);
        assert!(bytes.len() < 32, "{} bytes", bytes.len());
        assert!(!p.has_changes());
    }
}
