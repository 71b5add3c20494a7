//! Platform event records (DSP0248 `PlatformEventMessage`, sensor class).

use crate::ProtocolResult;
use async_trait::async_trait;
use bic_hal::FrameBuilder;
use serde::{Deserialize, Serialize};

/// `eventClass` for sensor events.
pub const PLDM_SENSOR_EVENT: u8 = 0x00;
/// `sensorEventClassType` for state sensors.
pub const PLDM_STATE_SENSOR_STATE: u8 = 0x01;
/// Offset of the device-presence state within its state set.
pub const STATE_SET_OFFSET_DEVICE_PRESENCE: u8 = 0x00;

/// Sensor id, event class type and the three state bytes.
pub const SENSOR_EVENT_DATA_SIZE: usize = 6;

/// Values of the DSP0249 presence state set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PresenceState {
    Present = 0x01,
    NotPresent = 0x02,
}

impl PresenceState {
    pub fn from_present(present: bool) -> Self {
        if present {
            PresenceState::Present
        } else {
            PresenceState::NotPresent
        }
    }
}

/// `stateSensorState` event data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSensorEvent {
    pub sensor_offset: u8,
    pub event_state: u8,
    pub previous_event_state: u8,
}

impl StateSensorEvent {
    pub fn presence(current: PresenceState, previous: PresenceState) -> Self {
        Self {
            sensor_offset: STATE_SET_OFFSET_DEVICE_PRESENCE,
            event_state: current as u8,
            previous_event_state: previous as u8,
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.sensor_offset, self.event_state, self.previous_event_state]
    }
}

/// A sensor event addressed to one sensor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub sensor_id: u16,
    pub state: StateSensorEvent,
}

impl SensorEvent {
    /// Event data as carried after the `eventClass` byte.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut frame = FrameBuilder::new(SENSOR_EVENT_DATA_SIZE);
        frame
            .write_u16_le(self.sensor_id)?
            .write_u8(PLDM_STATE_SENSOR_STATE)?
            .write_bytes(&self.state.to_bytes())?;
        Ok(frame.into_inner())
    }
}

/// Where platform events go. Delivery is fire-and-forget: callers log a
/// failure and carry on.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send_platform_event(&self, event_class: u8, data: &[u8]) -> ProtocolResult<()>;
}

/// Encode `event` and hand it to `sink` as a sensor-class event.
pub async fn send_sensor_event(sink: &dyn EventSink, event: &SensorEvent) -> ProtocolResult<()> {
    let data = event.encode()?;
    sink.send_platform_event(PLDM_SENSOR_EVENT, &data).await
}
