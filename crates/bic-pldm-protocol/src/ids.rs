//! Numeric identifiers from DSP0240 (PLDM base), DSP0267 (firmware update)
//! and DSP0236 (MCTP).

use serde::{Deserialize, Serialize};

/// PLDM completion codes used by the BIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompletionCode {
    Success = 0x00,
    Error = 0x01,
    ErrorInvalidData = 0x02,
    ErrorInvalidLength = 0x03,
    ErrorNotReady = 0x04,
    ErrorUnsupportedPldmCmd = 0x05,
    ErrorInvalidPldmType = 0x20,
    // DSP0267 firmware-update specific codes
    NotInUpdateMode = 0x80,
    AlreadyInUpdateMode = 0x81,
    DataOutOfRange = 0x82,
    InvalidStateForCommand = 0x84,
    BusyInBackground = 0x86,
    UnableToInitiateUpdate = 0x8A,
    ActivationNotRequired = 0x8B,
}

impl CompletionCode {
    pub fn is_success(self) -> bool {
        self == CompletionCode::Success
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x01 => Some(Self::Error),
            0x02 => Some(Self::ErrorInvalidData),
            0x03 => Some(Self::ErrorInvalidLength),
            0x04 => Some(Self::ErrorNotReady),
            0x05 => Some(Self::ErrorUnsupportedPldmCmd),
            0x20 => Some(Self::ErrorInvalidPldmType),
            0x80 => Some(Self::NotInUpdateMode),
            0x81 => Some(Self::AlreadyInUpdateMode),
            0x82 => Some(Self::DataOutOfRange),
            0x84 => Some(Self::InvalidStateForCommand),
            0x86 => Some(Self::BusyInBackground),
            0x8A => Some(Self::UnableToInitiateUpdate),
            0x8B => Some(Self::ActivationNotRequired),
            _ => None,
        }
    }
}

/// MCTP message types (DSP0239).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MctpMessageType {
    MctpControl = 0x00,
    Pldm = 0x01,
    NcSi = 0x02,
    Ethernet = 0x03,
    NvmeManagement = 0x04,
    Spdm = 0x05,
    VendorDefinedPci = 0x7E,
    VendorDefinedIana = 0x7F,
}

/// DSP0267 component classification for a device behind this controller.
pub const COMP_CLASS_TYPE_DOWNSTREAM: u16 = 0xFFFF;
