//! QueryDeviceIdentifiers response encoding
//!
//! The BIC identifies itself with an IANA enterprise id record followed by a
//! PCI device id record. Records use a compact one-byte tag and one-byte
//! length; tags in `0x0_` name vendors and tags in `0x1_` name products,
//! mirroring the `0x00xx` / `0x01xx` split of the DSP0267 descriptor table.

use crate::{
    CompletionCode, IANA_ENTERPRISE_ID, PCI_DEVICE_ID_PLACEHOLDER, PLDM_MAX_DATA_SIZE,
    ProtocolError, ProtocolResult,
};
use bic_hal::{FrameBuilder, FrameParser};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Completion code, 32-bit identifiers length, descriptor count.
pub const DEVICE_IDENTIFIERS_HEADER_SIZE: usize = 6;
/// Type tag plus length byte.
pub const DESCRIPTOR_TLV_HEADER_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DescriptorType {
    PciVendorId = 0x00,
    IanaEnterpriseId = 0x01,
    Uuid = 0x02,
    PciDeviceId = 0x10,
    PciSubsystemVendorId = 0x11,
    PciSubsystemId = 0x12,
    PciRevisionId = 0x13,
    VendorDefined = 0xFF,
}

impl DescriptorType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::PciVendorId),
            0x01 => Some(Self::IanaEnterpriseId),
            0x02 => Some(Self::Uuid),
            0x10 => Some(Self::PciDeviceId),
            0x11 => Some(Self::PciSubsystemVendorId),
            0x12 => Some(Self::PciSubsystemId),
            0x13 => Some(Self::PciRevisionId),
            0xFF => Some(Self::VendorDefined),
            _ => None,
        }
    }

    /// Payload length fixed by the descriptor type, if any.
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            Self::PciVendorId => Some(2),
            Self::IanaEnterpriseId => Some(4),
            Self::Uuid => Some(16),
            Self::PciDeviceId => Some(2),
            Self::PciSubsystemVendorId => Some(2),
            Self::PciSubsystemId => Some(2),
            Self::PciRevisionId => Some(1),
            Self::VendorDefined => None,
        }
    }
}

/// One type/length/value identification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    kind: DescriptorType,
    data: Vec<u8>,
}

impl Descriptor {
    pub fn new(kind: DescriptorType, data: impl Into<Vec<u8>>) -> ProtocolResult<Self> {
        let data = data.into();
        if data.len() > usize::from(u8::MAX) {
            return Err(ProtocolError::PayloadTooLong(data.len()));
        }
        if let Some(expected) = kind.fixed_len()
            && expected != data.len()
        {
            return Err(ProtocolError::Malformed(format!(
                "{kind:?} descriptor must be {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { kind, data })
    }

    pub fn iana_enterprise_id(id: [u8; 4]) -> Self {
        Self {
            kind: DescriptorType::IanaEnterpriseId,
            data: id.to_vec(),
        }
    }

    pub fn pci_device_id(id: [u8; 2]) -> Self {
        Self {
            kind: DescriptorType::PciDeviceId,
            data: id.to_vec(),
        }
    }

    pub fn kind(&self) -> DescriptorType {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes this record occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        DESCRIPTOR_TLV_HEADER_SIZE + self.data.len()
    }

    fn write_to(&self, frame: &mut FrameBuilder) -> ProtocolResult<()> {
        let len = u8::try_from(self.data.len())
            .map_err(|_overflow| ProtocolError::PayloadTooLong(self.data.len()))?;
        frame
            .write_u8(self.kind as u8)?
            .write_u8(len)?
            .write_bytes(&self.data)?;
        Ok(())
    }
}

/// The identity this endpoint reports to `QueryDeviceIdentifiers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub iana_enterprise_id: [u8; 4],
    pub pci_device_id: [u8; 2],
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            iana_enterprise_id: IANA_ENTERPRISE_ID,
            pci_device_id: PCI_DEVICE_ID_PLACEHOLDER,
        }
    }
}

impl DeviceIdentity {
    /// The records reported, in wire order.
    pub fn descriptors(&self) -> [Descriptor; 2] {
        [
            Descriptor::iana_enterprise_id(self.iana_enterprise_id),
            Descriptor::pci_device_id(self.pci_device_id),
        ]
    }
}

/// Builds `QueryDeviceIdentifiers` responses under a payload size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorEncoder {
    max_payload_size: usize,
}

impl Default for DescriptorEncoder {
    fn default() -> Self {
        Self::new(PLDM_MAX_DATA_SIZE)
    }
}

impl DescriptorEncoder {
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Header plus every record, in bytes.
    pub fn required_size(descriptors: &[Descriptor]) -> usize {
        descriptors
            .iter()
            .map(Descriptor::encoded_len)
            .fold(DEVICE_IDENTIFIERS_HEADER_SIZE, usize::saturating_add)
    }

    /// Encode the identity's two records into `resp`.
    pub fn query_device_identifiers(
        &self,
        identity: &DeviceIdentity,
        resp: &mut Vec<u8>,
    ) -> ProtocolResult<usize> {
        self.encode(&identity.descriptors(), resp)
    }

    /// Encode an arbitrary descriptor list into `resp`.
    ///
    /// On success `resp` holds the full response and its length is returned.
    /// On failure `resp` holds a header-only response carrying
    /// `PLDM_ERROR` and no record bytes.
    pub fn encode(&self, descriptors: &[Descriptor], resp: &mut Vec<u8>) -> ProtocolResult<usize> {
        match self.build(descriptors) {
            Ok(frame) => {
                *resp = frame;
                debug!(
                    descriptors = descriptors.len(),
                    len = resp.len(),
                    "Encoded device identifiers"
                );
                Ok(resp.len())
            }
            Err(e) => {
                error!("QueryDeviceIdentifiers response not encoded: {}", e);
                *resp = self.error_response(CompletionCode::Error);
                Err(e)
            }
        }
    }

    fn build(&self, descriptors: &[Descriptor]) -> ProtocolResult<Vec<u8>> {
        let required = Self::required_size(descriptors);
        if required > self.max_payload_size {
            return Err(ProtocolError::BufferTooSmall {
                required,
                limit: self.max_payload_size,
            });
        }

        let identifiers_len = u32::try_from(required - DEVICE_IDENTIFIERS_HEADER_SIZE)
            .map_err(|_overflow| ProtocolError::PayloadTooLong(required))?;
        let count = u8::try_from(descriptors.len())
            .map_err(|_overflow| ProtocolError::PayloadTooLong(descriptors.len()))?;

        let mut frame = FrameBuilder::new(self.max_payload_size);
        frame.reserve(required)?;
        frame
            .write_u8(CompletionCode::Success as u8)?
            .write_u32_le(identifiers_len)?
            .write_u8(count)?;
        for descriptor in descriptors {
            descriptor.write_to(&mut frame)?;
        }
        Ok(frame.into_inner())
    }

    /// Header-only response; shortened to the completion code alone when the
    /// limit cannot hold a full header.
    fn error_response(&self, code: CompletionCode) -> Vec<u8> {
        if self.max_payload_size < DEVICE_IDENTIFIERS_HEADER_SIZE {
            return vec![code as u8];
        }
        let mut header = vec![0u8; DEVICE_IDENTIFIERS_HEADER_SIZE];
        if let Some(first) = header.first_mut() {
            *first = code as u8;
        }
        header
    }
}

/// Decoded `QueryDeviceIdentifiers` response, as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentifiersResponse {
    pub completion_code: u8,
    pub identifiers_len: u32,
    pub descriptors: Vec<Descriptor>,
}

impl DeviceIdentifiersResponse {
    pub fn parse(bytes: &[u8]) -> ProtocolResult<Self> {
        let mut parser = FrameParser::new(bytes);
        let completion_code = parser.read_u8()?;
        if completion_code != CompletionCode::Success as u8 {
            return Ok(Self {
                completion_code,
                identifiers_len: 0,
                descriptors: Vec::new(),
            });
        }

        let identifiers_len = parser.read_u32_le()?;
        let count = parser.read_u8()?;
        if usize::try_from(identifiers_len).ok() != Some(parser.remaining()) {
            return Err(ProtocolError::Malformed(format!(
                "identifiers length {identifiers_len} but {} bytes follow",
                parser.remaining()
            )));
        }

        let mut descriptors = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let tag = parser.read_u8()?;
            let kind = DescriptorType::from_u8(tag).ok_or_else(|| {
                ProtocolError::Malformed(format!("unknown descriptor type {tag:#04x}"))
            })?;
            let len = parser.read_u8()?;
            let data = parser.read_bytes(usize::from(len))?;
            descriptors.push(Descriptor::new(kind, data)?);
        }
        if !parser.is_exhausted() {
            return Err(ProtocolError::Malformed(format!(
                "{} trailing bytes after {count} descriptors",
                parser.remaining()
            )));
        }

        Ok(Self {
            completion_code,
            identifiers_len,
            descriptors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: usize = DEVICE_IDENTIFIERS_HEADER_SIZE + 2 * DESCRIPTOR_TLV_HEADER_SIZE + 4 + 2;

    #[test]
    fn test_default_identity_encodes() -> ProtocolResult<()> {
        let mut resp = Vec::new();
        let len = DescriptorEncoder::default()
            .query_device_identifiers(&DeviceIdentity::default(), &mut resp)?;

        assert_eq!(len, REQUIRED);
        assert_eq!(
            resp,
            vec![
                0x00, // success
                0x0A, 0x00, 0x00, 0x00, // identifiers length
                0x02, // descriptor count
                0x01, 0x04, 0x00, 0x00, 0xA0, 0x15, // IANA
                0x10, 0x02, 0x00, 0x00, // PCI device id
            ]
        );
        Ok(())
    }

    #[test]
    fn test_required_size() {
        let descriptors = DeviceIdentity::default().descriptors();
        assert_eq!(DescriptorEncoder::required_size(&descriptors), 16);
        assert_eq!(REQUIRED, 16);
    }

    #[test]
    fn test_limit_one_below_required_fails_header_only() {
        let encoder = DescriptorEncoder::new(REQUIRED - 1);
        let mut resp = vec![0xEE; 32];

        let result = encoder.query_device_identifiers(&DeviceIdentity::default(), &mut resp);

        assert_eq!(
            result,
            Err(ProtocolError::BufferTooSmall {
                required: REQUIRED,
                limit: REQUIRED - 1
            })
        );
        assert_eq!(resp, vec![0x01, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_limit_equal_to_required_succeeds() {
        let encoder = DescriptorEncoder::new(REQUIRED);
        let mut resp = Vec::new();
        let result = encoder.query_device_identifiers(&DeviceIdentity::default(), &mut resp);
        assert_eq!(result, Ok(REQUIRED));
        assert_eq!(resp.first(), Some(&0x00));
    }

    #[test]
    fn test_tiny_limit_emits_bare_completion_code() {
        let encoder = DescriptorEncoder::new(2);
        let mut resp = Vec::new();
        let result = encoder.query_device_identifiers(&DeviceIdentity::default(), &mut resp);
        assert!(matches!(result, Err(ProtocolError::BufferTooSmall { .. })));
        assert_eq!(resp, vec![0x01]);
    }

    #[test]
    fn test_descriptor_new_validates_length() {
        assert!(matches!(
            Descriptor::new(DescriptorType::IanaEnterpriseId, vec![0u8; 3]),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            Descriptor::new(DescriptorType::VendorDefined, vec![0u8; 300]),
            Err(ProtocolError::PayloadTooLong(300))
        ));
        assert!(matches!(
            Descriptor::new(DescriptorType::VendorDefined, vec![0u8; 255]),
            Ok(d) if d.encoded_len() == 257
        ));
    }

    #[test]
    fn test_parse_error_response() -> ProtocolResult<()> {
        let parsed = DeviceIdentifiersResponse::parse(&[0x01, 0, 0, 0, 0, 0])?;
        assert_eq!(parsed.completion_code, 0x01);
        assert!(parsed.descriptors.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        let bytes = [0x00, 0x05, 0, 0, 0, 0x01, 0x01, 0x04, 0, 0, 0xA0, 0x15];
        assert!(matches!(
            DeviceIdentifiersResponse::parse(&bytes),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
