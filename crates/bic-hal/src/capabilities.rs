//! Outbound hardware capability traits

use crate::{BusTarget, HalResult, MonitorDomain, StrapPin, VrVendor};
use async_trait::async_trait;

/// Physical path a firmware payload takes to its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Transport {
    /// In-band block transfer into the controller's own SPI flash.
    Spi,
    /// Burst transfer to a bus-attached device.
    I2c,
}

/// One firmware payload write request.
#[derive(Debug, Clone, Copy)]
pub struct ImageWrite<'a> {
    pub transport: Transport,
    /// Resolved device for bus-attached transfers; `None` for SPI.
    pub target: Option<BusTarget>,
    /// Regulator vendor selected during pre-update, when relevant.
    pub vendor: Option<VrVendor>,
    pub image: &'a [u8],
}

pub trait StrapReader: Send + Sync {
    fn read_strap(&self, pin: StrapPin) -> HalResult<u8>;
}

/// The switch consulted by the periodic sensor poller before it touches a
/// device group. Toggling it is synchronous so it can run from `Drop`.
pub trait MonitorControl: Send + Sync {
    fn set_monitoring(&self, domain: MonitorDomain, enabled: bool);

    fn monitoring_enabled(&self, domain: MonitorDomain) -> bool;
}

#[async_trait]
pub trait RegulatorChip: Send + Sync {
    /// Read the configuration checksum (MPS) or CRC (Renesas) in host order.
    async fn read_checksum(&self, vendor: VrVendor, target: BusTarget) -> HalResult<u32>;

    /// Read how many more times the configuration memory may be written.
    async fn read_remaining_writes(&self, vendor: VrVendor, target: BusTarget) -> HalResult<u8>;
}

#[async_trait]
pub trait RetimerChip: Send + Sync {
    /// Read the retimer's native firmware version bytes.
    async fn read_version(&self, target: BusTarget) -> HalResult<Vec<u8>>;
}

#[async_trait]
pub trait FirmwareWriter: Send + Sync {
    async fn write_image(&self, request: ImageWrite<'_>) -> HalResult<()>;

    /// Switch the controller over to its freshly written image.
    async fn self_activate(&self) -> HalResult<()>;
}
