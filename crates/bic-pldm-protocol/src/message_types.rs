//! MCTP message types accepted by this endpoint.

use crate::{MctpMessageType, ProtocolError, ProtocolResult};

/// Answer to the MCTP control `GetMessageTypeSupport` request.
pub const SUPPORTED_MESSAGE_TYPES: [MctpMessageType; 2] =
    [MctpMessageType::MctpControl, MctpMessageType::Pldm];

/// Copy the supported message type codes into `buf`.
///
/// Returns the number of bytes written. A buffer shorter than the list is
/// rejected without being touched.
pub fn load_message_types(buf: &mut [u8]) -> ProtocolResult<usize> {
    let required = SUPPORTED_MESSAGE_TYPES.len();
    let limit = buf.len();
    let dest = buf
        .get_mut(..required)
        .ok_or(ProtocolError::BufferTooSmall { required, limit })?;
    for (slot, kind) in dest.iter_mut().zip(SUPPORTED_MESSAGE_TYPES) {
        *slot = kind as u8;
    }
    Ok(required)
}

/// Owned form of [`SUPPORTED_MESSAGE_TYPES`].
pub fn supported_message_types() -> Vec<u8> {
    SUPPORTED_MESSAGE_TYPES.iter().map(|kind| *kind as u8).collect()
}
