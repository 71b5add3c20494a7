//! Recording mocks of the outbound hardware capabilities.
//!
//! Every mock appends to a shared [`CallLog`] so tests can assert on the
//! order of hardware accesses across capabilities, e.g. that monitoring was
//! switched off before the first image write and back on after it.

use async_trait::async_trait;
use bic_hal::{
    BusTarget, FirmwareWriter, HalError, HalResult, ImageWrite, MonitorControl, MonitorDomain,
    RegulatorChip, RetimerChip, StrapPin, StrapReader, Transport, VrVendor,
};
use bic_pldm_protocol::{EventSink, ProtocolError, ProtocolResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// One recorded hardware access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadStrap(StrapPin),
    SetMonitoring {
        domain: MonitorDomain,
        enabled: bool,
    },
    ReadChecksum {
        vendor: VrVendor,
        target: BusTarget,
    },
    ReadRemainingWrites {
        vendor: VrVendor,
        target: BusTarget,
    },
    ReadRetimerVersion(BusTarget),
    WriteImage {
        transport: Transport,
        target: Option<BusTarget>,
        vendor: Option<VrVendor>,
        len: usize,
    },
    SelfActivate,
    PlatformEvent {
        event_class: u8,
        data: Vec<u8>,
    },
}

/// Ordered log shared by a set of mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| matches(c)).count()
    }

    pub fn position(&self, matches: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.lock().iter().position(matches)
    }

    pub fn writes(&self) -> usize {
        self.count(|c| matches!(c, Call::WriteImage { .. }))
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

fn injected(reason: &str) -> HalError {
    HalError::Flash(format!("injected failure: {reason}"))
}

/// Strap reader returning configurable levels.
#[derive(Debug)]
pub struct MockStraps {
    log: CallLog,
    levels: Mutex<HashMap<StrapPin, u8>>,
    fail: AtomicBool,
}

impl MockStraps {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            levels: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_level(&self, pin: StrapPin, level: u8) {
        self.levels.lock().insert(pin, level);
    }

    pub fn set_vendor(&self, vendor: VrVendor) {
        let level = match vendor {
            VrVendor::Mps => 0,
            VrVendor::Renesas => 1,
        };
        self.set_level(StrapPin::VrType, level);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl StrapReader for MockStraps {
    fn read_strap(&self, pin: StrapPin) -> HalResult<u8> {
        self.log.push(Call::ReadStrap(pin));
        if self.fail.load(Ordering::SeqCst) {
            return Err(HalError::StrapUnavailable(pin));
        }
        Ok(self.levels.lock().get(&pin).copied().unwrap_or(0))
    }
}

/// Monitoring switch with one flag per domain, enabled by default.
#[derive(Debug)]
pub struct MockMonitor {
    log: CallLog,
    flags: Mutex<HashMap<MonitorDomain, bool>>,
}

impl MockMonitor {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            flags: Mutex::new(HashMap::new()),
        }
    }

    /// Preset a flag without recording a call.
    pub fn preset(&self, domain: MonitorDomain, enabled: bool) {
        self.flags.lock().insert(domain, enabled);
    }

    pub fn is_enabled(&self, domain: MonitorDomain) -> bool {
        self.flags.lock().get(&domain).copied().unwrap_or(true)
    }
}

impl MonitorControl for MockMonitor {
    fn set_monitoring(&self, domain: MonitorDomain, enabled: bool) {
        self.log.push(Call::SetMonitoring { domain, enabled });
        self.flags.lock().insert(domain, enabled);
    }

    fn monitoring_enabled(&self, domain: MonitorDomain) -> bool {
        self.is_enabled(domain)
    }
}

/// Voltage-regulator chip with a programmable checksum and write counter.
#[derive(Debug)]
pub struct MockRegulator {
    log: CallLog,
    checksum: Mutex<u32>,
    remaining_writes: Mutex<u8>,
    fail_checksum: AtomicBool,
    fail_remaining_writes: AtomicBool,
}

impl MockRegulator {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            checksum: Mutex::new(0),
            remaining_writes: Mutex::new(0),
            fail_checksum: AtomicBool::new(false),
            fail_remaining_writes: AtomicBool::new(false),
        }
    }

    pub fn set_checksum(&self, checksum: u32) {
        *self.checksum.lock() = checksum;
    }

    pub fn set_remaining_writes(&self, count: u8) {
        *self.remaining_writes.lock() = count;
    }

    pub fn fail_checksum(&self, fail: bool) {
        self.fail_checksum.store(fail, Ordering::SeqCst);
    }

    pub fn fail_remaining_writes(&self, fail: bool) {
        self.fail_remaining_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegulatorChip for MockRegulator {
    async fn read_checksum(&self, vendor: VrVendor, target: BusTarget) -> HalResult<u32> {
        self.log.push(Call::ReadChecksum { vendor, target });
        if self.fail_checksum.load(Ordering::SeqCst) {
            return Err(HalError::read_failed(target, "injected checksum failure"));
        }
        Ok(*self.checksum.lock())
    }

    async fn read_remaining_writes(&self, vendor: VrVendor, target: BusTarget) -> HalResult<u8> {
        self.log.push(Call::ReadRemainingWrites { vendor, target });
        if self.fail_remaining_writes.load(Ordering::SeqCst) {
            return Err(HalError::read_failed(target, "injected remaining-write failure"));
        }
        Ok(*self.remaining_writes.lock())
    }
}

/// Retimer returning fixed version bytes.
#[derive(Debug)]
pub struct MockRetimer {
    log: CallLog,
    version: Mutex<Vec<u8>>,
    fail: AtomicBool,
}

impl MockRetimer {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            version: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_version(&self, version: impl Into<Vec<u8>>) {
        *self.version.lock() = version.into();
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RetimerChip for MockRetimer {
    async fn read_version(&self, target: BusTarget) -> HalResult<Vec<u8>> {
        self.log.push(Call::ReadRetimerVersion(target));
        if self.fail.load(Ordering::SeqCst) {
            return Err(HalError::read_failed(target, "injected version failure"));
        }
        Ok(self.version.lock().clone())
    }
}

/// Image writer that records payloads and can hold a write in flight.
#[derive(Debug)]
pub struct MockFirmwareWriter {
    log: CallLog,
    images: Mutex<Vec<Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_activation: AtomicBool,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl MockFirmwareWriter {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            images: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            fail_activation: AtomicBool::new(false),
            hold: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_activation(&self, fail: bool) {
        self.fail_activation.store(fail, Ordering::SeqCst);
    }

    /// Park the next write until [`release_writes`](Self::release_writes).
    pub fn hold_writes(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Resolve once a write has started.
    pub async fn wait_for_write(&self) {
        self.entered.notified().await;
    }

    pub fn release_writes(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub fn images(&self) -> Vec<Vec<u8>> {
        self.images.lock().clone()
    }
}

#[async_trait]
impl FirmwareWriter for MockFirmwareWriter {
    async fn write_image(&self, request: ImageWrite<'_>) -> HalResult<()> {
        self.log.push(Call::WriteImage {
            transport: request.transport,
            target: request.target,
            vendor: request.vendor,
            len: request.image.len(),
        });
        self.entered.notify_one();
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(match request.target {
                Some(target) => HalError::write_failed(target, "injected write failure"),
                None => injected("write"),
            });
        }
        self.images.lock().push(request.image.to_vec());
        Ok(())
    }

    async fn self_activate(&self) -> HalResult<()> {
        self.log.push(Call::SelfActivate);
        if self.fail_activation.load(Ordering::SeqCst) {
            return Err(injected("activate"));
        }
        Ok(())
    }
}

/// Event sink that records every delivered event.
#[derive(Debug)]
pub struct MockEventSink {
    log: CallLog,
    fail: AtomicBool,
}

impl MockEventSink {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_delivery(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<(u8, Vec<u8>)> {
        self.log
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::PlatformEvent { event_class, data } => Some((event_class, data)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for MockEventSink {
    async fn send_platform_event(&self, event_class: u8, data: &[u8]) -> ProtocolResult<()> {
        self.log.push(Call::PlatformEvent {
            event_class,
            data: data.to_vec(),
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProtocolError::EventDelivery("injected failure".to_string()));
        }
        Ok(())
    }
}

/// Every capability mock wired to one call log.
#[derive(Debug, Clone)]
pub struct MockHardware {
    pub log: CallLog,
    pub straps: Arc<MockStraps>,
    pub monitor: Arc<MockMonitor>,
    pub regulators: Arc<MockRegulator>,
    pub retimers: Arc<MockRetimer>,
    pub writer: Arc<MockFirmwareWriter>,
    pub events: Arc<MockEventSink>,
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHardware {
    pub fn new() -> Self {
        let log = CallLog::new();
        Self {
            straps: Arc::new(MockStraps::new(log.clone())),
            monitor: Arc::new(MockMonitor::new(log.clone())),
            regulators: Arc::new(MockRegulator::new(log.clone())),
            retimers: Arc::new(MockRetimer::new(log.clone())),
            writer: Arc::new(MockFirmwareWriter::new(log.clone())),
            events: Arc::new(MockEventSink::new(log.clone())),
            log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bic_hal::BusId;

    #[test]
    fn test_straps_and_monitor_record_calls() {
        let hw = MockHardware::new();
        hw.straps.set_vendor(VrVendor::Renesas);

        assert_eq!(hw.straps.read_strap(StrapPin::VrType).ok(), Some(1));
        hw.monitor.set_monitoring(MonitorDomain::Retimers, false);

        assert!(!hw.monitor.is_enabled(MonitorDomain::Retimers));
        assert!(hw.monitor.is_enabled(MonitorDomain::VoltageRegulators));
        assert_eq!(
            hw.log.calls(),
            vec![
                Call::ReadStrap(StrapPin::VrType),
                Call::SetMonitoring {
                    domain: MonitorDomain::Retimers,
                    enabled: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_writer_failure_injection() {
        let hw = MockHardware::new();
        hw.writer.fail_writes(true);
        let target = BusTarget::new(BusId::I2C4, 0x63);

        let result = hw
            .writer
            .write_image(ImageWrite {
                transport: Transport::I2c,
                target: Some(target),
                vendor: None,
                image: &[1, 2, 3],
            })
            .await;

        assert!(matches!(result, Err(HalError::WriteFailed { addr: 0x63, .. })));
        assert!(hw.writer.images().is_empty());
        assert_eq!(hw.log.writes(), 1);
    }
}
