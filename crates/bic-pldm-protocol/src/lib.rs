//! PLDM protocol pieces answered directly by the BIC.
//!
//! This crate is I/O-free: it turns typed values into the byte layouts the
//! enclosing PLDM/MCTP stack sends back to the host.
//!
//! ## Contents
//!
//! - **`ids`**: PLDM completion codes, firmware-update command codes, MCTP
//!   message types and the DSP0267 component classification values.
//! - **`descriptor`**: the `QueryDeviceIdentifiers` response encoder. The
//!   response is a fixed header followed by compact type/length/value
//!   descriptor records:
//!
//! | Field | Size | Notes |
//! |-------|------|-------|
//! | completion code | 1 | `PLDM_SUCCESS` or `PLDM_ERROR` |
//! | device identifiers length | 4 (LE) | sum of all TLV bytes |
//! | descriptor count | 1 | number of TLVs |
//! | TLV type | 1 | [`DescriptorType`] tag |
//! | TLV length | 1 | payload length |
//! | TLV payload | length | opaque |
//!
//! - **`message_types`**: the MCTP message types this endpoint accepts.
//! - **`event`**: state-sensor platform event records and the sink they are
//!   pushed into.
//!
//! The whole response is capped at [`PLDM_MAX_DATA_SIZE`]; an encoder never
//! truncates, it fails and reports an error completion code instead.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod descriptor;
pub mod event;
pub mod ids;
pub mod message_types;

pub use descriptor::*;
pub use event::*;
pub use ids::*;
pub use message_types::*;

use bic_hal::HalError;
use thiserror::Error;

/// Errors returned by PLDM encoding operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Encoded size {required} exceeds maximum payload size {limit}")]
    BufferTooSmall { required: usize, limit: usize },

    #[error("Could not allocate {0} bytes for the response")]
    AllocationFailure(usize),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Descriptor payload of {0} bytes does not fit a one-byte length field")]
    PayloadTooLong(usize),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Platform event not delivered: {0}")]
    EventDelivery(String),
}

/// Convenience result alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

impl From<HalError> for ProtocolError {
    fn from(e: HalError) -> Self {
        match e {
            HalError::FrameOverflow { required, limit } => {
                ProtocolError::BufferTooSmall { required, limit }
            }
            HalError::FrameAllocation(size) => ProtocolError::AllocationFailure(size),
            other => ProtocolError::Malformed(other.to_string()),
        }
    }
}

/// Largest PLDM payload the BIC will emit, in bytes.
pub const PLDM_MAX_DATA_SIZE: usize = 256;

/// IANA Private Enterprise Number assigned to Meta/Facebook (40981),
/// big-endian as it appears on the wire.
pub const IANA_ENTERPRISE_ID: [u8; 4] = [0x00, 0x00, 0xA0, 0x15];

/// PCI device id reported by the SD BIC. Placeholder until one is assigned.
pub const PCI_DEVICE_ID_PLACEHOLDER: [u8; 2] = [0x00, 0x00];
