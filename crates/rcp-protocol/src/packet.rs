//! Packet framing: the envelope around every message.
//!
//! A packet starts with a [`Command`] byte. Most commands are followed by
//! options, each introduced by a [`PacketOption`] code, and a `0x00`
//! terminator:
//!
//! ```text
//! command [0x01 timestamp(u64)] [0x02 data] 0x00
//! ```
//!
//! The shape of `data` depends on the command:
//!
//! | Command                            | Data                          |
//! |------------------------------------|-------------------------------|
//! | `INFO`, `VERSION`                  | info record                   |
//! | `INITIALIZE`, `DISCOVER`, `REMOVE` | parameter id (i16)            |
//! | `UPDATE`                           | full parameter block          |
//!
//! `UPDATEVALUE` is the exception. It has no options and no terminator;
//! the compact payload follows the command byte directly:
//!
//! ```text
//! 0x05 id(i16) datatype(u8) [element datatype(u8), ranges only] value
//! ```

use crate::parameter::Parameter;
use crate::types::INFO_APPLICATION_ID;
use crate::wire::{WireReader, WireWriter, TERMINATOR};
use crate::{Command, Datatype, PacketOption, ParameterId, ProtocolError, TypeDefinition, Value};

/// The version and identity a server reports in reply to `INFO`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InfoData {
    pub version: String,
    pub application_id: Option<String>,
}

impl InfoData {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            application_id: None,
        }
    }

    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }

    fn write(&self, out: &mut WireWriter) {
        out.write_tiny_string(&self.version);
        if let Some(application_id) = &self.application_id {
            out.write_u8(INFO_APPLICATION_ID);
            out.write_tiny_string(application_id);
        }
        out.terminate();
    }

    fn parse(input: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let mut info = Self::new(input.read_tiny_string()?);
        loop {
            match input.read_u8()? {
                TERMINATOR => break,
                INFO_APPLICATION_ID => info.application_id = Some(input.read_tiny_string()?),
                code => {
                    return Err(ProtocolError::UnknownOption {
                        context: "info",
                        code,
                    });
                }
            }
        }
        Ok(info)
    }
}

/// A bare value addressed to an existing parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueUpdate {
    pub id: ParameterId,
    pub datatype: Datatype,
    /// The element datatype when `datatype` is a range.
    pub element: Option<Datatype>,
    pub value: Value,
}

impl ValueUpdate {
    /// Builds the compact form of `parameter`'s current value.
    ///
    /// Returns `None` for parameters without a value and for custom types,
    /// whose size is not part of the compact form.
    pub fn from_parameter(parameter: &Parameter) -> Option<Self> {
        let value = parameter.value()?.clone();
        let element = match parameter.definition() {
            TypeDefinition::Custom(_) => return None,
            TypeDefinition::Range(range) => Some(range.element().datatype()),
            _ => None,
        };
        Some(Self {
            id: parameter.id(),
            datatype: parameter.datatype(),
            element,
            value,
        })
    }

    /// A definition able to read and write this update's value.
    fn definition(datatype: Datatype, element: Option<Datatype>) -> Result<TypeDefinition, ProtocolError> {
        match (datatype, element) {
            (Datatype::Range, Some(element)) => {
                TypeDefinition::range(element).ok_or(ProtocolError::InvalidRangeElement(element))
            }
            (Datatype::CustomType, _) => Err(ProtocolError::UnsupportedDatatype(datatype)),
            _ => TypeDefinition::for_datatype(datatype)
                .filter(TypeDefinition::has_value)
                .ok_or(ProtocolError::UnsupportedDatatype(datatype)),
        }
    }

    fn write(&self, out: &mut WireWriter) -> Result<(), ProtocolError> {
        let definition = Self::definition(self.datatype, self.element)?;
        if !definition.accepts(&self.value) {
            return Err(ProtocolError::ValueMismatch {
                expected: self.datatype,
            });
        }
        out.write_i16(self.id.0);
        out.write_u8(self.datatype.code());
        if let Some(element) = self.element {
            out.write_u8(element.code());
        }
        definition.write_value(&self.value, out);
        Ok(())
    }

    fn parse(input: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let id = ParameterId(input.read_i16()?);
        let code = input.read_u8()?;
        let datatype = Datatype::from_code(code).ok_or(ProtocolError::UnknownDatatype(code))?;
        let element = if datatype == Datatype::Range {
            let code = input.read_u8()?;
            Some(Datatype::from_code(code).ok_or(ProtocolError::UnknownDatatype(code))?)
        } else {
            None
        };
        let definition = Self::definition(datatype, element)?;
        let value = definition.read_value(input)?;
        Ok(Self {
            id,
            datatype,
            element,
            value,
        })
    }
}

/// The payload of a packet.
#[derive(Debug, PartialEq)]
pub enum PacketData {
    Info(InfoData),
    Id(ParameterId),
    Parameter(Box<Parameter>),
    Value(ValueUpdate),
}

/// One framed message.
#[derive(Debug, PartialEq)]
pub struct Packet {
    pub command: Command,
    pub timestamp: Option<u64>,
    pub data: Option<PacketData>,
}

impl Packet {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            timestamp: None,
            data: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_data(mut self, data: PacketData) -> Self {
        self.data = Some(data);
        self
    }

    /// `INFO` without data: asks the peer for its version.
    pub fn info_request() -> Self {
        Self::new(Command::Info)
    }

    /// `INITIALIZE` without data: asks for a full dump.
    pub fn initialize_request() -> Self {
        Self::new(Command::Initialize)
    }

    pub fn info(info: InfoData) -> Self {
        Self::new(Command::Info).with_data(PacketData::Info(info))
    }

    pub fn remove(id: ParameterId) -> Self {
        Self::new(Command::Remove).with_data(PacketData::Id(id))
    }

    pub fn update(parameter: Parameter) -> Self {
        Self::new(Command::Update).with_data(PacketData::Parameter(Box::new(parameter)))
    }

    pub fn update_value(update: ValueUpdate) -> Self {
        Self::new(Command::UpdateValue).with_data(PacketData::Value(update))
    }

    pub fn parameter(&self) -> Option<&Parameter> {
        match &self.data {
            Some(PacketData::Parameter(parameter)) => Some(parameter),
            _ => None,
        }
    }

    pub fn into_parameter(self) -> Option<Parameter> {
        match self.data {
            Some(PacketData::Parameter(parameter)) => Some(*parameter),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<ParameterId> {
        match &self.data {
            Some(PacketData::Id(id)) => Some(*id),
            Some(PacketData::Parameter(parameter)) => Some(parameter.id()),
            Some(PacketData::Value(update)) => Some(update.id),
            _ => None,
        }
    }

    /// Parses one packet.
    ///
    /// Returns `Ok(None)` for an invalid command byte (0x00 or past the
    /// last command); such input is not an error, just nothing to do.
    pub fn parse(input: &mut WireReader<'_>) -> Result<Option<Self>, ProtocolError> {
        let code = input.read_u8()?;
        let Some(command) = Command::from_code(code) else {
            return Ok(None);
        };
        let mut packet = Self::new(command);

        if command == Command::UpdateValue {
            packet.data = Some(PacketData::Value(ValueUpdate::parse(input)?));
            return Ok(Some(packet));
        }

        loop {
            let code = input.read_u8()?;
            if code == TERMINATOR {
                break;
            }
            match PacketOption::from_code(code) {
                Some(PacketOption::Timestamp) => packet.timestamp = Some(input.read_u64()?),
                Some(PacketOption::Data) => packet.data = Some(Self::parse_data(command, input)?),
                None => {
                    tracing::warn!(?command, code, "unknown packet option, skipping rest");
                    break;
                }
            }
        }
        Ok(Some(packet))
    }

    fn parse_data(command: Command, input: &mut WireReader<'_>) -> Result<PacketData, ProtocolError> {
        let data = match command {
            Command::Info | Command::Version => PacketData::Info(InfoData::parse(input)?),
            Command::Initialize | Command::Discover | Command::Remove => {
                PacketData::Id(ParameterId(input.read_i16()?))
            }
            Command::Update => PacketData::Parameter(Box::new(Parameter::parse(input)?)),
            Command::UpdateValue => PacketData::Value(ValueUpdate::parse(input)?),
        };
        Ok(data)
    }

    /// Parses a complete message buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Option<Self>, ProtocolError> {
        Self::parse(&mut WireReader::new(bytes))
    }

    /// Writes the packet. `all` selects a full or delta parameter write.
    pub fn write(&mut self, out: &mut WireWriter, all: bool) -> Result<(), ProtocolError> {
        out.write_u8(self.command.code());

        if let Some(PacketData::Value(update)) = &self.data {
            return update.write(out);
        }

        if let Some(timestamp) = self.timestamp {
            out.write_u8(PacketOption::Timestamp as u8);
            out.write_u64(timestamp);
        }
        if let Some(data) = &mut self.data {
            out.write_u8(PacketOption::Data as u8);
            match data {
                PacketData::Info(info) => info.write(out),
                PacketData::Id(id) => out.write_i16(id.0),
                PacketData::Parameter(parameter) => parameter.write(out, all),
                PacketData::Value(_) => {}
            }
        }
        out.terminate();
        Ok(())
    }

    pub fn to_bytes(&mut self, all: bool) -> Result<Vec<u8>, ProtocolError> {
        let mut out = WireWriter::new();
        self.write(&mut out, all)?;
        Ok(out.into_vec())
    }
}

/// Encodes an `UPDATE` packet around a registered parameter without
/// taking it out of its registry. A delta write resets its change flags.
pub fn encode_update(parameter: &mut Parameter, all: bool) -> Vec<u8> {
    let mut out = WireWriter::new();
    out.write_u8(Command::Update.code());
    out.write_u8(PacketOption::Data as u8);
    parameter.write(&mut out, all);
    out.terminate();
    out.into_vec()
}

/// Encodes a `REMOVE` packet for `id`.
pub fn encode_remove(id: ParameterId) -> Vec<u8> {
    let mut out = WireWriter::new();
    out.write_u8(Command::Remove.code());
    out.write_u8(PacketOption::Data as u8);
    out.write_i16(id.0);
    out.terminate();
    out.into_vec()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RangeValue;

    // =====================================================================
    // parse
    // =====================================================================

    #[test]
    fn test_parse_invalid_command_returns_none() {
        assert!(Packet::from_bytes(&[0x00, 0x00]).unwrap().is_none());
        assert!(Packet::from_bytes(&[0x08, 0x00]).unwrap().is_none());
    }

    #[test]
    fn test_parse_empty_input_returns_unexpected_end() {
        assert!(matches!(
            Packet::from_bytes(&[]),
            Err(ProtocolError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_parse_bare_requests() {
        let info = Packet::from_bytes(&[0x01, 0x00]).unwrap().unwrap();
        assert_eq!(info, Packet::info_request());
        let init = Packet::from_bytes(&[0x02, 0x00]).unwrap().unwrap();
        assert_eq!(init, Packet::initialize_request());
    }

    #[test]
    fn test_parse_timestamp_option() {
        let bytes = [0x03, 0x01, 0, 0, 0, 0, 0, 0, 0x01, 0x00, 0x00];
        let packet = Packet::from_bytes(&bytes).unwrap().unwrap();
        assert_eq!(packet.command, Command::Discover);
        assert_eq!(packet.timestamp, Some(256));
    }

    #[test]
    fn test_parse_unknown_option_returns_partial_packet() {
        let bytes = [0x06, 0x02, 0x00, 0x05, 0x77, 0x01];
        let packet = Packet::from_bytes(&bytes).unwrap().unwrap();
        assert_eq!(packet.id(), Some(ParameterId(5)));
    }

    #[test]
    fn test_parse_version_reads_info_record() {
        let bytes = [0x07, 0x02, 3, b'1', b'.', b'0', 0x1a, 2, b'i', b'd', 0x00, 0x00];
        let packet = Packet::from_bytes(&bytes).unwrap().unwrap();
        assert_eq!(
            packet.data,
            Some(PacketData::Info(InfoData::new("1.0").with_application_id("id")))
        );
    }

    // =====================================================================
    // write
    // =====================================================================

    #[test]
    fn test_write_remove_bytes() {
        assert_eq!(
            Packet::remove(ParameterId(5)).to_bytes(true).unwrap(),
            vec![0x06, 0x02, 0x00, 0x05, 0x00]
        );
        assert_eq!(encode_remove(ParameterId(5)), vec![0x06, 0x02, 0x00, 0x05, 0x00]);
    }

    #[test]
    fn test_write_info_roundtrip() {
        let mut packet = Packet::info(InfoData::new("0.3.0").with_application_id("demo"))
            .with_timestamp(42);
        let bytes = packet.to_bytes(true).unwrap();
        assert_eq!(Packet::from_bytes(&bytes).unwrap(), Some(packet));
    }

    #[test]
    fn test_encode_update_matches_packet_write() {
        let mut parameter = Parameter::new(ParameterId(2), TypeDefinition::number::<u8>());
        parameter.set_value(7u8).unwrap();
        let direct = encode_update(&mut parameter, true);

        let mut copy = Parameter::new(ParameterId(2), TypeDefinition::number::<u8>());
        copy.set_value(7u8).unwrap();
        let framed = Packet::update(copy).to_bytes(true).unwrap();
        assert_eq!(direct, framed);
        assert_eq!(direct, vec![0x04, 0x02, 0x00, 0x02, 0x12, 0x00, 0x20, 7, 0x00, 0x00]);
    }

    // =====================================================================
    // UPDATEVALUE
    // =====================================================================

    #[test]
    fn test_update_value_has_no_terminator() {
        let mut parameter = Parameter::new(ParameterId(3), TypeDefinition::number::<i16>());
        parameter.set_value(-2i16).unwrap();
        let update = ValueUpdate::from_parameter(&parameter).unwrap();
        let bytes = Packet::update_value(update.clone()).to_bytes(false).unwrap();
        assert_eq!(bytes, vec![0x05, 0x00, 0x03, 0x13, 0xff, 0xfe]);

        let parsed = Packet::from_bytes(&bytes).unwrap().unwrap();
        assert_eq!(parsed.data, Some(PacketData::Value(update)));
    }

    #[test]
    fn test_update_value_range_carries_element_type() {
        let mut parameter = Parameter::new(ParameterId(1), TypeDefinition::range(Datatype::UInt8).unwrap());
        parameter.set_value(RangeValue::new(1u8, 2u8)).unwrap();
        let update = ValueUpdate::from_parameter(&parameter).unwrap();
        let bytes = Packet::update_value(update).to_bytes(false).unwrap();
        assert_eq!(bytes, vec![0x05, 0x00, 0x01, 0x2d, 0x12, 1, 2]);
    }

    #[test]
    fn test_update_value_custom_type_unsupported() {
        let mut parameter = Parameter::new(ParameterId(1), TypeDefinition::custom(1));
        parameter.set_value(vec![9u8]).unwrap();
        assert!(ValueUpdate::from_parameter(&parameter).is_none());
        assert!(matches!(
            Packet::from_bytes(&[0x05, 0x00, 0x01, 0x01, 9]),
            Err(ProtocolError::UnsupportedDatatype(Datatype::CustomType))
        ));
    }

    #[test]
    fn test_update_value_wrong_shape_fails_to_write() {
        let update = ValueUpdate {
            id: ParameterId(1),
            datatype: Datatype::Boolean,
            element: None,
            value: Value::Int8(1),
        };
        assert!(Packet::update_value(update).to_bytes(false).is_err());
    }
}
