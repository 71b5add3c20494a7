//! Slot presence polling
//!
//! Each poll reads every configured slot and reports a PLDM state-sensor
//! event when a slot's presence changes. A slot seen for the first time is
//! reported only if it is empty, with the previous state equal to the current
//! one, so the host learns about missing devices at boot without being told
//! about every populated slot.

use crate::config::{PresenceConfig, PresenceSlotConfig};
use async_trait::async_trait;
use bic_hal::HalResult;
use bic_pldm_protocol::{EventSink, PresenceState, SensorEvent, StateSensorEvent, send_sensor_event};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Reads whether a slot is populated.
#[async_trait]
pub trait PresenceSource: Send + Sync {
    async fn is_present(&self, slot: u8) -> HalResult<bool>;
}

/// A polled slot and the sensor id its events carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSlot {
    pub slot: u8,
    pub sensor_id: u16,
}

impl From<PresenceSlotConfig> for PresenceSlot {
    fn from(config: PresenceSlotConfig) -> Self {
        Self {
            slot: config.slot,
            sensor_id: config.sensor_id,
        }
    }
}

pub struct PresenceChecker {
    source: Arc<dyn PresenceSource>,
    sink: Arc<dyn EventSink>,
    slots: Vec<PresenceSlot>,
    last_seen: Mutex<HashMap<u8, PresenceState>>,
}

impl std::fmt::Debug for PresenceChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceChecker")
            .field("slots", &self.slots)
            .field("last_seen", &*self.last_seen.lock())
            .finish_non_exhaustive()
    }
}

impl PresenceChecker {
    pub fn new(
        source: Arc<dyn PresenceSource>,
        sink: Arc<dyn EventSink>,
        slots: impl IntoIterator<Item = PresenceSlot>,
    ) -> Self {
        Self {
            source,
            sink,
            slots: slots.into_iter().collect(),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Last observed state of `slot`, if it has been read successfully.
    pub fn state(&self, slot: u8) -> Option<PresenceState> {
        self.last_seen.lock().get(&slot).copied()
    }

    /// Poll every slot once. Returns the number of events handed to the sink.
    ///
    /// Read failures skip the slot and keep its last state. Delivery failures
    /// are logged and the new state is still recorded.
    pub async fn poll(&self) -> usize {
        let mut emitted = 0usize;
        for slot in &self.slots {
            let present = match self.source.is_present(slot.slot).await {
                Ok(present) => present,
                Err(e) => {
                    warn!(slot = slot.slot, "Presence read failed: {}", e);
                    continue;
                }
            };
            let current = PresenceState::from_present(present);
            let previous = self.last_seen.lock().insert(slot.slot, current);

            let state = match previous {
                Some(previous) if previous == current => continue,
                Some(previous) => StateSensorEvent::presence(current, previous),
                None if current == PresenceState::NotPresent => {
                    StateSensorEvent::presence(current, current)
                }
                None => continue,
            };

            info!(slot = slot.slot, sensor_id = slot.sensor_id, ?current, "Slot presence changed");
            let event = SensorEvent {
                sensor_id: slot.sensor_id,
                state,
            };
            if let Err(e) = send_sensor_event(self.sink.as_ref(), &event).await {
                error!(slot = slot.slot, "Send presence event failed: {}", e);
            }
            emitted = emitted.saturating_add(1);
        }
        debug!(emitted, "Presence poll complete");
        emitted
    }

    /// Build a checker for the slots in `config` and poll it every
    /// `poll_interval_ms`. `None` when polling is disabled or no slot is
    /// configured.
    pub fn start(
        config: &PresenceConfig,
        source: Arc<dyn PresenceSource>,
        sink: Arc<dyn EventSink>,
    ) -> Option<PresenceTask> {
        if !config.enabled || config.slots.is_empty() {
            debug!(enabled = config.enabled, "Presence polling not started");
            return None;
        }
        let checker = Arc::new(Self::new(
            source,
            sink,
            config.slots.iter().copied().map(PresenceSlot::from),
        ));
        let period = Duration::from_millis(config.poll_interval_ms);
        info!(
            slots = config.slots.len(),
            interval_ms = config.poll_interval_ms,
            "Starting presence polling"
        );
        let handle = checker.clone().spawn(period);
        Some(PresenceTask { checker, handle })
    }

    /// Poll on a fixed period until the returned task is aborted.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.poll().await;
            }
        })
    }
}

/// A running presence poller. Polling stops when this is dropped.
#[derive(Debug)]
pub struct PresenceTask {
    checker: Arc<PresenceChecker>,
    handle: JoinHandle<()>,
}

impl PresenceTask {
    pub fn checker(&self) -> &Arc<PresenceChecker> {
        &self.checker
    }
}

impl Drop for PresenceTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bic_hal::HalError;
    use bic_pldm_protocol::PLDM_SENSOR_EVENT;
    use bic_test_helpers::prelude::*;

    #[derive(Default)]
    struct Slots {
        present: Mutex<HashMap<u8, bool>>,
        broken: Mutex<Option<u8>>,
    }

    impl Slots {
        fn set(&self, slot: u8, present: bool) {
            self.present.lock().insert(slot, present);
        }
    }

    #[async_trait]
    impl PresenceSource for Slots {
        async fn is_present(&self, slot: u8) -> HalResult<bool> {
            if *self.broken.lock() == Some(slot) {
                return Err(HalError::Flash("gpio unavailable".to_string()));
            }
            Ok(self.present.lock().get(&slot).copied().unwrap_or(false))
        }
    }

    fn checker(source: Arc<Slots>, hw: &MockHardware) -> PresenceChecker {
        PresenceChecker::new(
            source,
            hw.events.clone(),
            [
                PresenceSlot { slot: 5, sensor_id: 0x0007 },
                PresenceSlot { slot: 6, sensor_id: 0x0008 },
            ],
        )
    }

    #[tokio::test]
    async fn test_first_poll_reports_empty_slots_only() {
        let hw = MockHardware::new();
        let source = Arc::new(Slots::default());
        source.set(5, true);
        let checker = checker(source, &hw);

        assert_eq!(checker.poll().await, 1);
        assert_eq!(
            hw.events.events(),
            vec![(PLDM_SENSOR_EVENT, vec![0x08, 0x00, 0x01, 0x00, 0x02, 0x02])]
        );
        assert_eq!(checker.state(5), Some(PresenceState::Present));
    }

    #[tokio::test]
    async fn test_transitions_are_reported_once() {
        let hw = MockHardware::new();
        let source = Arc::new(Slots::default());
        source.set(5, true);
        source.set(6, true);
        let checker = checker(source.clone(), &hw);

        assert_eq!(checker.poll().await, 0);
        source.set(6, false);
        assert_eq!(checker.poll().await, 1);
        assert_eq!(checker.poll().await, 0);
        source.set(6, true);
        assert_eq!(checker.poll().await, 1);

        assert_eq!(
            hw.events.events(),
            vec![
                (PLDM_SENSOR_EVENT, vec![0x08, 0x00, 0x01, 0x00, 0x02, 0x01]),
                (PLDM_SENSOR_EVENT, vec![0x08, 0x00, 0x01, 0x00, 0x01, 0x02]),
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_polling() {
        let hw = MockHardware::new();
        hw.events.fail_delivery(true);
        let source = Arc::new(Slots::default());
        *source.broken.lock() = Some(5);
        let checker = checker(source, &hw);

        assert_eq!(checker.poll().await, 1);
        assert_eq!(checker.state(5), None);
        assert_eq!(checker.state(6), Some(PresenceState::NotPresent));
        assert_eq!(checker.poll().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_checker_polls_periodically() {
        let hw = MockHardware::new();
        let source = Arc::new(Slots::default());
        source.set(5, true);
        source.set(6, true);
        let checker = Arc::new(checker(source.clone(), &hw));

        let task = checker.clone().spawn(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(50)).await;
        source.set(5, false);
        tokio::time::sleep(Duration::from_millis(100)).await;

        task.abort();
        assert_eq!(checker.state(5), Some(PresenceState::NotPresent));
        assert_eq!(hw.events.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_follows_config() {
        let hw = MockHardware::new();
        let source = Arc::new(Slots::default());
        let mut config = PresenceConfig {
            enabled: false,
            poll_interval_ms: 250,
            slots: vec![PresenceSlotConfig {
                slot: 2,
                sensor_id: 0x0011,
            }],
        };

        assert!(PresenceChecker::start(&config, source.clone(), hw.events.clone()).is_none());

        config.enabled = true;
        let task = must_some(
            PresenceChecker::start(&config, source.clone(), hw.events.clone()),
            "presence polling not started",
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(task.checker().state(2), Some(PresenceState::NotPresent));

        let checker = task.checker().clone();
        drop(task);
        source.set(2, true);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(checker.state(2), Some(PresenceState::NotPresent));
        assert_eq!(hw.events.events().len(), 1);
    }
}
