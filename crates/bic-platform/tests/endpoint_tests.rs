//! End-to-end tests of the endpoint operations against recording mocks

use async_trait::async_trait;
use bic_firmware_update::{
    ActivationOutcome, ComponentId, ComponentRegistry, FirmwareUpdateError, Hardware,
};
use bic_hal::{BusId, BusTarget, HalResult, MonitorDomain, VrVendor};
use bic_platform::board::{BIC, VR_PVDD11_S3, VR_PVDDCR_CPU0, X8_RETIMER, X16_RETIMER};
use bic_platform::{Endpoint, EndpointConfig, PresenceConfig, PresenceSlotConfig, PresenceSource};
use bic_pldm_protocol::{
    CompletionCode, DeviceIdentifiersResponse, DeviceIdentity, PLDM_SENSOR_EVENT, PresenceState,
    ProtocolError,
};
use bic_test_helpers::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;

/// Every slot reads as empty.
struct EmptySlots;

#[async_trait]
impl PresenceSource for EmptySlots {
    async fn is_present(&self, _slot: u8) -> HalResult<bool> {
        Ok(false)
    }
}

fn hardware(hw: &MockHardware) -> Hardware {
    Hardware {
        straps: hw.straps.clone(),
        regulators: hw.regulators.clone(),
        retimers: hw.retimers.clone(),
        writer: hw.writer.clone(),
    }
}

fn endpoint_with(config: EndpointConfig, hw: &MockHardware) -> Endpoint {
    let registry = ComponentRegistry::new();
    must(Endpoint::new(
        &config,
        &registry,
        hardware(hw),
        hw.monitor.clone(),
    ))
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn test_query_device_identifiers() {
    let hw = MockHardware::new();
    let endpoint = endpoint_with(EndpointConfig::default(), &hw);

    let mut resp = Vec::new();
    assert_eq!(endpoint.query_device_identifiers(&[], &mut resp), Ok(16));
    insta::assert_snapshot!(hex_dump(&resp), @"00 0a 00 00 00 02 01 04 00 00 a0 15 10 02 00 00");

    let parsed = must(DeviceIdentifiersResponse::parse(&resp));
    assert_eq!(parsed.completion_code, CompletionCode::Success as u8);
    assert_eq!(parsed.descriptors.len(), 2);
}

#[test]
fn test_query_device_identifiers_uses_configured_identity() {
    let hw = MockHardware::new();
    let config = EndpointConfig {
        identity: DeviceIdentity {
            iana_enterprise_id: [0x00, 0x00, 0xA0, 0x15],
            pci_device_id: [0x12, 0x34],
        },
        ..EndpointConfig::default()
    };
    let endpoint = endpoint_with(config, &hw);

    let mut resp = Vec::new();
    must(endpoint.query_device_identifiers(&[0xFF], &mut resp));
    assert_eq!(resp.get(14..16), Some(&[0x12, 0x34][..]));
}

#[test]
fn test_query_device_identifiers_too_small() {
    let hw = MockHardware::new();
    let config = EndpointConfig {
        max_payload_size: 15,
        ..EndpointConfig::default()
    };
    let endpoint = endpoint_with(config, &hw);

    let mut resp = Vec::new();
    assert_eq!(
        endpoint.query_device_identifiers(&[], &mut resp),
        Err(ProtocolError::BufferTooSmall {
            required: 16,
            limit: 15
        })
    );
    assert_eq!(resp, vec![0x01, 0, 0, 0, 0, 0]);
}

#[test]
fn test_supported_message_types() {
    let hw = MockHardware::new();
    let endpoint = endpoint_with(EndpointConfig::default(), &hw);

    assert_eq!(endpoint.get_supported_message_types(), vec![0x00, 0x01]);
}

#[tokio::test]
async fn test_update_through_endpoint() {
    let hw = MockHardware::new();
    hw.straps.set_vendor(VrVendor::Mps);
    let endpoint = endpoint_with(EndpointConfig::default(), &hw);

    let outcome = must(endpoint.update_component(VR_PVDDCR_CPU0, &[0x11; 64]).await);
    assert_eq!(outcome.activation, ActivationOutcome::PowerCycleRequired);
    assert_eq!(outcome.params.target, Some(BusTarget::new(BusId::I2C4, 0x76)));

    let bic = must(endpoint.update_component(BIC, &[0x22; 64]).await);
    assert_eq!(bic.activation, ActivationOutcome::Activated);
    assert_eq!(hw.writer.images().len(), 2);
    assert!(hw.monitor.is_enabled(MonitorDomain::VoltageRegulators));
}

#[tokio::test]
async fn test_disabled_components_from_config() {
    let hw = MockHardware::new();
    let config = EndpointConfig {
        disabled_components: vec![VR_PVDD11_S3.0],
        ..EndpointConfig::default()
    };
    let endpoint = endpoint_with(config, &hw);

    assert_eq!(
        endpoint.update_component(VR_PVDD11_S3, &[1]).await,
        Err(FirmwareUpdateError::UnknownComponent(VR_PVDD11_S3))
    );
    assert!(!endpoint.table().is_enabled(VR_PVDD11_S3));
    assert!(endpoint.table().is_enabled(VR_PVDDCR_CPU0));
}

#[test]
fn test_unknown_disabled_component_rejected() {
    let hw = MockHardware::new();
    let config = EndpointConfig {
        disabled_components: vec![42],
        ..EndpointConfig::default()
    };
    let registry = ComponentRegistry::new();

    let result = Endpoint::new(&config, &registry, hardware(&hw), hw.monitor.clone());
    assert!(matches!(result, Err(e) if e.to_string().contains("Cannot disable component 42")));
}

#[test]
fn test_rebuilt_endpoint_resets_availability() {
    let hw = MockHardware::new();
    let registry = ComponentRegistry::new();
    let first_config = EndpointConfig {
        disabled_components: vec![VR_PVDD11_S3.0, X8_RETIMER.0],
        ..EndpointConfig::default()
    };
    let second_config = EndpointConfig {
        disabled_components: vec![BIC.0],
        ..EndpointConfig::default()
    };

    let first = must(Endpoint::new(&first_config, &registry, hardware(&hw), hw.monitor.clone()));
    assert!(!first.table().is_enabled(VR_PVDD11_S3));
    assert!(!first.table().is_enabled(X8_RETIMER));

    let second = must(Endpoint::new(&second_config, &registry, hardware(&hw), hw.monitor.clone()));
    assert!(second.table().is_enabled(VR_PVDD11_S3));
    assert!(second.table().is_enabled(X8_RETIMER));
    assert!(!second.table().is_enabled(BIC));
    assert!(!first.table().is_enabled(BIC));
}

#[test]
fn test_unknown_disabled_component_leaves_table_untouched() {
    let hw = MockHardware::new();
    let registry = ComponentRegistry::new();
    let config = EndpointConfig {
        disabled_components: vec![VR_PVDD11_S3.0],
        ..EndpointConfig::default()
    };
    let endpoint = must(Endpoint::new(&config, &registry, hardware(&hw), hw.monitor.clone()));

    let bad = EndpointConfig {
        disabled_components: vec![BIC.0, 42],
        ..EndpointConfig::default()
    };
    assert!(matches!(
        Endpoint::new(&bad, &registry, hardware(&hw), hw.monitor.clone()),
        Err(e) if e.to_string().contains("Cannot disable component 42")
    ));
    assert!(!endpoint.table().is_enabled(VR_PVDD11_S3));
    assert!(endpoint.table().is_enabled(BIC));
}

#[tokio::test(start_paused = true)]
async fn test_presence_polling_started_from_config() {
    let hw = MockHardware::new();
    let config = EndpointConfig {
        presence: PresenceConfig {
            enabled: true,
            poll_interval_ms: 200,
            slots: vec![PresenceSlotConfig {
                slot: 3,
                sensor_id: 0x0010,
            }],
        },
        ..EndpointConfig::default()
    };
    let endpoint = endpoint_with(config, &hw);

    let task = must_some(
        endpoint.start_presence(Arc::new(EmptySlots), hw.events.clone()),
        "presence polling not started",
    );
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(task.checker().state(3), Some(PresenceState::NotPresent));
    assert_eq!(
        hw.events.events(),
        vec![(PLDM_SENSOR_EVENT, vec![0x10, 0x00, 0x01, 0x00, 0x02, 0x02])]
    );
}

#[tokio::test]
async fn test_presence_polling_off_by_default() {
    let hw = MockHardware::new();
    let endpoint = endpoint_with(EndpointConfig::default(), &hw);

    assert!(
        endpoint
            .start_presence(Arc::new(EmptySlots), hw.events.clone())
            .is_none()
    );
    assert!(hw.events.events().is_empty());
}

#[tokio::test]
async fn test_versions_through_endpoint() {
    let hw = MockHardware::new();
    hw.straps.set_vendor(VrVendor::Renesas);
    hw.regulators.set_checksum(0xCAFE_F00D);
    hw.regulators.set_remaining_writes(3);
    hw.retimers.set_version([0x01, 0x02, 0x03, 0x04]);
    let endpoint = endpoint_with(EndpointConfig::default(), &hw);

    let vr = must(endpoint.get_component_version(VR_PVDD11_S3).await);
    assert_eq!(vr.as_str(), "Renesas cafef00d, Remaining Write: 03");

    let retimer = must(endpoint.get_component_version(X16_RETIMER).await);
    assert_eq!(retimer.as_str(), "01020304");

    let err = must_err(endpoint.get_component_version(BIC).await);
    assert_eq!(err.completion_code(), CompletionCode::ErrorUnsupportedPldmCmd);
}

#[tokio::test]
async fn test_version_limited_by_configured_payload() {
    let hw = MockHardware::new();
    hw.straps.set_vendor(VrVendor::Renesas);
    let config = EndpointConfig {
        max_payload_size: 32,
        ..EndpointConfig::default()
    };
    let endpoint = endpoint_with(config, &hw);

    assert_eq!(
        endpoint.get_component_version(VR_PVDD11_S3).await,
        Err(FirmwareUpdateError::BufferTooSmall {
            required: 37,
            limit: 32
        })
    );
}

#[test]
#[traced_test]
fn test_endpoints_share_registered_table() {
    let hw = MockHardware::new();
    let registry = ComponentRegistry::new();
    let config = EndpointConfig::default();

    let first = must(Endpoint::new(&config, &registry, hardware(&hw), hw.monitor.clone()));
    let second = must(Endpoint::new(&config, &registry, hardware(&hw), hw.monitor.clone()));

    assert!(Arc::ptr_eq(first.table(), second.table()));
    must(first.table().set_enabled(ComponentId(5), false));
    assert!(!second.table().is_enabled(ComponentId(5)));
    assert!(logs_contain("PLDM endpoint ready"));
}
