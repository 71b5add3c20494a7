//! Addressing and identification types shared by every hardware capability

use serde::{Deserialize, Serialize};
use std::fmt;

/// Board-level I2C bus label (`I2C4` is bus number 4 on the schematic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BusId(u8);

impl BusId {
    pub const I2C4: BusId = BusId(4);
    pub const I2C6: BusId = BusId(6);

    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I2C{}", self.0)
    }
}

/// A 7-bit device address on a specific bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusTarget {
    pub bus: BusId,
    pub addr: u8,
}

impl BusTarget {
    pub const fn new(bus: BusId, addr: u8) -> Self {
        Self { bus, addr }
    }
}

impl fmt::Display for BusTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#04x}", self.bus, self.addr)
    }
}

/// Straps sampled to distinguish otherwise identical parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrapPin {
    /// Selects the voltage-regulator vendor populated on the board.
    VrType,
}

impl fmt::Display for StrapPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrapPin::VrType => write!(f, "VR_TYPE"),
        }
    }
}

/// Groups of devices polled together by the background sensor monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorDomain {
    VoltageRegulators,
    Retimers,
}

impl fmt::Display for MonitorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorDomain::VoltageRegulators => write!(f, "vr"),
            MonitorDomain::Retimers => write!(f, "retimer"),
        }
    }
}

/// Voltage-regulator vendor families that can be populated on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VrVendor {
    /// MPS MP2971 family: exposes a 32-bit configuration checksum.
    Mps,
    /// Renesas RAA229621 family: exposes a CRC and a remaining-write counter
    /// for its one-time-programmable configuration memory.
    Renesas,
}

impl VrVendor {
    /// Decode the `VR_TYPE` strap level. Unknown levels yield `None`.
    pub fn from_strap(level: u8) -> Option<Self> {
        match level {
            0 => Some(VrVendor::Mps),
            1 => Some(VrVendor::Renesas),
            _ => None,
        }
    }

    /// Name prefix used in version strings, including the trailing space.
    pub fn display_name(self) -> &'static str {
        match self {
            VrVendor::Mps => "MPS ",
            VrVendor::Renesas => "Renesas ",
        }
    }

    pub fn has_remaining_writes(self) -> bool {
        matches!(self, VrVendor::Renesas)
    }
}

impl fmt::Display for VrVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name().trim_end())
    }
}
