//! Hardware capability layer for BIC firmware services
//!
//! This crate describes the hardware a BIC talks to without implementing any
//! of it. Bus drivers, vendor chip register protocols and the sensor-polling
//! toggle live elsewhere; the firmware-update core only sees the traits
//! defined here:
//!
//! - [`StrapReader`]: board strap / GPIO reads used to tell chip variants apart
//! - [`MonitorControl`]: the background-monitoring enable switch
//! - [`RegulatorChip`]: voltage-regulator checksum and remaining-write reads
//! - [`RetimerChip`]: retimer native version reads
//! - [`FirmwareWriter`]: the payload writers and controller self-activation
//!
//! It also provides [`FrameBuilder`] and [`FrameParser`], bounded byte
//! cursors used by the PLDM encoders.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod capabilities;
pub mod frame;
pub mod target;

pub use capabilities::*;
pub use frame::*;
pub use target::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    #[error("Bus {bus} read from {addr:#04x} failed: {reason}")]
    ReadFailed { bus: u8, addr: u8, reason: String },

    #[error("Bus {bus} write to {addr:#04x} failed: {reason}")]
    WriteFailed { bus: u8, addr: u8, reason: String },

    #[error("Strap {0} could not be read")]
    StrapUnavailable(StrapPin),

    #[error("SPI flash operation failed: {0}")]
    Flash(String),

    #[error("Frame would exceed {limit} bytes (needs {required})")]
    FrameOverflow { required: usize, limit: usize },

    #[error("Frame allocation of {0} bytes failed")]
    FrameAllocation(usize),

    #[error("Unexpected end of frame: wanted {wanted} bytes, {remaining} left")]
    FrameTruncated { wanted: usize, remaining: usize },
}

impl HalError {
    pub fn read_failed(target: BusTarget, reason: impl Into<String>) -> Self {
        HalError::ReadFailed {
            bus: target.bus.index(),
            addr: target.addr,
            reason: reason.into(),
        }
    }

    pub fn write_failed(target: BusTarget, reason: impl Into<String>) -> Self {
        HalError::WriteFailed {
            bus: target.bus.index(),
            addr: target.addr,
            reason: reason.into(),
        }
    }
}

pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let err = HalError::read_failed(BusTarget::new(BusId::I2C4, 0x63), "nack");
        assert_eq!(format!("{}", err), "Bus 4 read from 0x63 failed: nack");

        let err = HalError::StrapUnavailable(StrapPin::VrType);
        assert_eq!(format!("{}", err), "Strap VR_TYPE could not be read");
    }

    #[test]
    fn test_frame_errors_render_limits() {
        let err = HalError::FrameOverflow {
            required: 17,
            limit: 16,
        };
        assert_eq!(err.to_string(), "Frame would exceed 16 bytes (needs 17)");
    }
}
