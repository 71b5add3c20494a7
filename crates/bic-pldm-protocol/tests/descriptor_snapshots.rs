//! Snapshot tests for rendered responses and error messages.

use bic_pldm_protocol::{
    DescriptorEncoder, DeviceIdentity, PresenceState, ProtocolError, ProtocolResult, SensorEvent,
    StateSensorEvent,
};

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn snapshot_default_identifiers() -> ProtocolResult<()> {
    let mut resp = Vec::new();
    DescriptorEncoder::default().query_device_identifiers(&DeviceIdentity::default(), &mut resp)?;
    insta::assert_snapshot!(hex_dump(&resp), @"00 0a 00 00 00 02 01 04 00 00 a0 15 10 02 00 00");
    Ok(())
}

#[test]
fn snapshot_custom_identity() -> ProtocolResult<()> {
    let identity = DeviceIdentity {
        iana_enterprise_id: [0x00, 0x00, 0x19, 0xA7],
        pci_device_id: [0x34, 0x12],
    };
    let mut resp = Vec::new();
    DescriptorEncoder::default().query_device_identifiers(&identity, &mut resp)?;
    insta::assert_snapshot!(hex_dump(&resp), @"00 0a 00 00 00 02 01 04 00 00 19 a7 10 02 34 12");
    Ok(())
}

#[test]
fn snapshot_error_response() {
    let mut resp = Vec::new();
    let result =
        DescriptorEncoder::new(8).query_device_identifiers(&DeviceIdentity::default(), &mut resp);
    assert!(matches!(result, Err(ProtocolError::BufferTooSmall { .. })));
    insta::assert_snapshot!(hex_dump(&resp), @"01 00 00 00 00 00");
}

#[test]
fn snapshot_error_messages() {
    insta::assert_snapshot!(
        ProtocolError::BufferTooSmall { required: 16, limit: 15 }.to_string(),
        @"Encoded size 16 exceeds maximum payload size 15"
    );
    insta::assert_snapshot!(
        ProtocolError::PayloadTooLong(300).to_string(),
        @"Descriptor payload of 300 bytes does not fit a one-byte length field"
    );
    insta::assert_snapshot!(
        ProtocolError::MissingArgument("resp").to_string(),
        @"Missing argument: resp"
    );
}

#[test]
fn snapshot_presence_event() -> ProtocolResult<()> {
    let event = SensorEvent {
        sensor_id: 0x0007,
        state: StateSensorEvent::presence(PresenceState::Present, PresenceState::NotPresent),
    };
    insta::assert_snapshot!(hex_dump(&event.encode()?), @"07 00 01 00 01 02");
    Ok(())
}
