//! Component firmware version probe
//!
//! Versions are read fresh from the hardware on every request and rendered as
//! short ASCII strings:
//!
//! - regulators: `"<vendor> <checksum hex>"`, plus
//!   `", Remaining Write: <bcd hex>"` for vendors that count remaining writes
//! - retimers: the first four native version bytes in hex

use crate::component::{ComponentId, ComponentTable};
use crate::error::{FirmwareUpdateError, FirmwareUpdateResult};
use crate::hooks::Hardware;
use crate::locks::ComponentLocks;
use crate::monitor::MonitorGate;
use bic_hal::VrVendor;
use bic_pldm_protocol::PLDM_MAX_DATA_SIZE;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

pub const REMAINING_WRITE_SEPARATOR: &str = ", Remaining Write: ";

/// Hex characters used for a 32-bit checksum.
const CHECKSUM_HEX_LEN: usize = 8;
/// Native retimer version bytes included in the report.
const RETIMER_VERSION_BYTES: usize = 4;

/// Raw version data as read from a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionReading {
    Regulator {
        vendor: VrVendor,
        checksum: u32,
        remaining_writes: Option<u8>,
    },
    Retimer {
        raw: Vec<u8>,
    },
}

impl VersionReading {
    /// Render into a report of at most `max_len` bytes. Nothing is produced
    /// on failure.
    pub fn render(
        &self,
        component: ComponentId,
        max_len: usize,
    ) -> FirmwareUpdateResult<VersionReport> {
        match self {
            VersionReading::Regulator {
                vendor,
                checksum,
                remaining_writes,
            } => {
                let name = vendor.display_name();
                let suffix_len = remaining_writes.map_or(0, |_| REMAINING_WRITE_SEPARATOR.len() + 2);
                let required = name.len() + CHECKSUM_HEX_LEN + suffix_len;
                let mut text = reserve(required, max_len)?;
                text.push_str(name);
                text.push_str(&hex::encode(checksum.to_be_bytes()));
                if let Some(count) = remaining_writes {
                    text.push_str(REMAINING_WRITE_SEPARATOR);
                    text.push_str(&hex::encode([packed_bcd(*count)]));
                }
                Ok(VersionReport { text })
            }
            VersionReading::Retimer { raw } => {
                let version = raw.get(..RETIMER_VERSION_BYTES).ok_or_else(|| {
                    FirmwareUpdateError::read_failed(
                        component,
                        format!("retimer returned {} version bytes", raw.len()),
                    )
                })?;
                let mut text = reserve(RETIMER_VERSION_BYTES * 2, max_len)?;
                text.push_str(&hex::encode(version));
                Ok(VersionReport { text })
            }
        }
    }
}

fn reserve(required: usize, limit: usize) -> FirmwareUpdateResult<String> {
    if required > limit {
        return Err(FirmwareUpdateError::BufferTooSmall { required, limit });
    }
    let mut text = String::new();
    text.try_reserve_exact(required)
        .map_err(|_alloc| FirmwareUpdateError::AllocationFailure(required))?;
    Ok(text)
}

/// Two decimal digits packed into one byte, tens in the high nibble.
///
/// Counts above 99 saturate at 99 so the result stays valid BCD.
pub fn packed_bcd(count: u8) -> u8 {
    let count = count.min(99);
    ((count / 10) << 4) | (count % 10)
}

/// Rendered version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReport {
    text: String,
}

impl VersionReport {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.text.into_bytes()
    }
}

impl fmt::Display for VersionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Answers `get_component_version` requests.
#[derive(Debug, Clone)]
pub struct VersionProbe {
    table: Arc<ComponentTable>,
    hardware: Hardware,
    gate: Arc<MonitorGate>,
    locks: Arc<ComponentLocks>,
    max_payload_size: usize,
}

impl VersionProbe {
    pub fn new(
        table: Arc<ComponentTable>,
        hardware: Hardware,
        gate: Arc<MonitorGate>,
        locks: Arc<ComponentLocks>,
    ) -> Self {
        Self {
            table,
            hardware,
            gate,
            locks,
            max_payload_size: PLDM_MAX_DATA_SIZE,
        }
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub async fn get_component_version(
        &self,
        component_id: ComponentId,
    ) -> FirmwareUpdateResult<VersionReport> {
        let descriptor = self.table.lookup(component_id)?;
        if !descriptor.hooks.get_version {
            return Err(FirmwareUpdateError::Unsupported {
                component: component_id,
                operation: "get_version",
            });
        }
        let _lease = self.locks.try_acquire(component_id)?;

        let reading = {
            let _suspension = descriptor
                .kind
                .monitor_domain()
                .map(|domain| self.gate.suspend(domain));
            descriptor
                .kind
                .hooks()
                .get_version(&self.hardware, component_id)
                .await
        };

        let report = reading
            .and_then(|reading| reading.render(component_id, self.max_payload_size))
            .inspect_err(|e| error!(component_id = %component_id, "Version read failed: {}", e))?;
        debug!(component_id = %component_id, version = %report, "Version read");
        Ok(report)
    }
}
