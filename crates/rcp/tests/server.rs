//! Integration tests for `ParameterServer`, driven by raw memory clients
//! that speak bytes, so every assertion is about what goes on the wire.

use rcp::prelude::*;
use rcp::rcp_protocol::{encode_remove, Command, Packet, PacketData};
use rcp::rcp_transport::{ClientEvent, MemoryClientTransporter};

// =========================================================================
// Helpers
// =========================================================================

const PORT: u16 = 9000;

/// A server with `int32` (id 1), a group (id 2), and a string inside the
/// group (id 3), already flushed so nothing is pending.
fn server_with_tree(network: &MemoryNetwork) -> ParameterServer {
    let mut transporter = network.server();
    transporter.bind(PORT).unwrap();
    let mut server = ParameterServer::builder()
        .version("1.2.3")
        .application_id("test-rig")
        .transporter(transporter)
        .build();

    let number = server
        .create_parameter(TypeDefinition::number::<i32>(), None)
        .unwrap();
    let group = server.create_group(None).unwrap();
    let text = server
        .create_parameter(
            TypeDefinition::for_datatype(Datatype::String).unwrap(),
            Some(group),
        )
        .unwrap();
    assert_eq!(
        (number, group, text),
        (ParameterId(1), ParameterId(2), ParameterId(3))
    );
    server.parameter_mut(number).unwrap().set_value(10i32).unwrap();
    server.parameter_mut(text).unwrap().set_label("name");
    server.update();
    server
}

fn raw_client(network: &MemoryNetwork) -> MemoryClientTransporter {
    let mut client = network.client();
    client.connect("localhost", PORT).unwrap();
    assert_eq!(client.try_recv(), Some(ClientEvent::Connected));
    client
}

fn received(client: &mut MemoryClientTransporter) -> Vec<Vec<u8>> {
    let mut messages = Vec::new();
    while let Some(event) = client.try_recv() {
        if let ClientEvent::Received(data) = event {
            messages.push(data);
        }
    }
    messages
}

fn update_for(id: ParameterId, definition: TypeDefinition, value: impl Into<Value>) -> Vec<u8> {
    let mut parameter = Parameter::new(id, definition);
    parameter.set_value(value).unwrap();
    Packet::update(parameter).to_bytes(false).unwrap()
}

// =========================================================================
// INITIALIZE
// =========================================================================

#[test]
fn test_initialize_dumps_tree_to_requester_only() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut requester = raw_client(&network);
    let mut bystander = raw_client(&network);

    requester.send(&[0x02, 0x00]).unwrap();
    assert_eq!(server.poll(), 1);

    let packets: Vec<Packet> = received(&mut requester)
        .iter()
        .map(|bytes| Packet::from_bytes(bytes).unwrap().unwrap())
        .collect();
    assert_eq!(packets.len(), 3);
    assert!(packets.iter().all(|p| p.command == Command::Update));

    let ids: Vec<ParameterId> = packets.iter().filter_map(Packet::id).collect();
    assert_eq!(ids, vec![ParameterId(1), ParameterId(2), ParameterId(3)]);

    let text = packets[2].parameter().unwrap();
    assert_eq!(text.parent(), Some(ParameterId(2)));
    assert_eq!(text.label(), Some("name"));
    assert_eq!(
        packets[0].parameter().unwrap().value(),
        Some(&Value::from(10i32))
    );

    assert!(received(&mut bystander).is_empty());
}

#[test]
fn test_initialize_on_empty_server_sends_nothing() {
    let network = MemoryNetwork::new();
    let mut transporter = network.server();
    transporter.bind(PORT).unwrap();
    let mut server = ParameterServer::builder().transporter(transporter).build();
    let mut client = raw_client(&network);

    client.send(&[0x02, 0x00]).unwrap();
    server.poll();
    assert!(received(&mut client).is_empty());
}

// =========================================================================
// INFO / VERSION
// =========================================================================

#[test]
fn test_info_request_gets_configured_version() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut client = raw_client(&network);

    client.send(&[0x01, 0x00]).unwrap();
    server.poll();

    let messages = received(&mut client);
    assert_eq!(messages.len(), 1);
    let packet = Packet::from_bytes(&messages[0]).unwrap().unwrap();
    assert_eq!(packet.command, Command::Info);
    assert_eq!(
        packet.data,
        Some(PacketData::Info(
            InfoData::new("1.2.3").with_application_id("test-rig")
        ))
    );
}

#[test]
fn test_version_request_is_answered_like_info() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut client = raw_client(&network);

    client.send(&[0x07, 0x00]).unwrap();
    server.poll();
    let messages = received(&mut client);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0][0], Command::Info.code());
}

// =========================================================================
// UPDATE from clients
// =========================================================================

#[test]
fn test_client_update_is_merged_and_forwarded_to_others() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut sender = raw_client(&network);
    let mut other = raw_client(&network);

    let bytes = update_for(ParameterId(1), TypeDefinition::number::<i32>(), 42i32);
    sender.send(&bytes).unwrap();
    server.poll();

    assert_eq!(
        server.get(ParameterId(1)).unwrap().value(),
        Some(&Value::from(42i32))
    );
    assert_eq!(received(&mut other), vec![bytes]);
    assert!(received(&mut sender).is_empty());

    // Merged state is not echoed back on the next tick.
    assert_eq!(server.update(), 0);
}

#[test]
fn test_client_update_reaches_other_transporters() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut second = network.server();
    second.bind(PORT + 1).unwrap();
    server.add_transporter(second);

    let mut sender = raw_client(&network);
    let mut remote = network.client();
    remote.connect("localhost", PORT + 1).unwrap();
    remote.try_recv();
    assert_eq!(server.connection_count(), 2);

    let bytes = update_for(ParameterId(1), TypeDefinition::number::<i32>(), 5i32);
    sender.send(&bytes).unwrap();
    server.poll();
    assert_eq!(received(&mut remote), vec![bytes]);
}

#[test]
fn test_client_update_for_unknown_id_registers_it() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut sender = raw_client(&network);

    let bytes = update_for(ParameterId(40), TypeDefinition::number::<u8>(), 1u8);
    sender.send(&bytes).unwrap();
    server.poll();
    assert!(server.get(ParameterId(40)).is_some());
    assert_eq!(server.registry().len(), 4);
}

#[test]
fn test_client_update_with_wrong_datatype_is_dropped() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut sender = raw_client(&network);
    let mut other = raw_client(&network);

    let bytes = update_for(ParameterId(1), TypeDefinition::number::<f32>(), 1.5f32);
    sender.send(&bytes).unwrap();
    server.poll();

    assert_eq!(
        server.get(ParameterId(1)).unwrap().value(),
        Some(&Value::from(10i32))
    );
    assert!(received(&mut other).is_empty());
}

// =========================================================================
// Ignored and refused commands
// =========================================================================

#[test]
fn test_client_remove_is_refused() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut client = raw_client(&network);
    let mut other = raw_client(&network);

    client.send(&encode_remove(ParameterId(1))).unwrap();
    server.poll();
    assert!(server.get(ParameterId(1)).is_some());
    assert!(received(&mut other).is_empty());
}

#[test]
fn test_discover_and_update_value_are_ignored() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut client = raw_client(&network);

    client.send(&[0x03, 0x00]).unwrap();
    client.send(&[0x05, 0x00, 0x01, 0x15, 0, 0, 0, 9]).unwrap();
    assert_eq!(server.poll(), 2);
    assert!(received(&mut client).is_empty());
    assert_eq!(
        server.get(ParameterId(1)).unwrap().value(),
        Some(&Value::from(10i32))
    );
}

// =========================================================================
// update()
// =========================================================================

#[test]
fn test_update_broadcasts_delta_to_everyone() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut first = raw_client(&network);
    let mut second = raw_client(&network);

    server.parameter_mut(ParameterId(1)).unwrap().set_value(11i32).unwrap();
    assert_eq!(server.update(), 1);

    let expected = vec![vec![
        0x04, 0x02, 0x00, 0x01, 0x15, 0x00, 0x20, 0, 0, 0, 11, 0x00, 0x00,
    ]];
    assert_eq!(received(&mut first), expected);
    assert_eq!(received(&mut second), expected);
    assert_eq!(server.update(), 0);
}

#[test]
fn test_removing_group_sends_single_remove() {
    let network = MemoryNetwork::new();
    let mut server = server_with_tree(&network);
    let mut client = raw_client(&network);

    assert!(server.remove(ParameterId(2)).unwrap());
    assert!(server.get(ParameterId(3)).is_none());
    assert_eq!(server.update(), 1);
    assert_eq!(
        received(&mut client),
        vec![vec![0x06, 0x02, 0x00, 0x02, 0x00]]
    );
}

#[test]
fn test_hierarchy_serializes_to_json() {
    let network = MemoryNetwork::new();
    let server = server_with_tree(&network);
    let json = serde_json::to_value(server.hierarchy()).unwrap();

    let children = json["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["value"], "10");
    assert_eq!(children[1]["children"][0]["label"], "name");
}
