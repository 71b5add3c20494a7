//! Yosemite-4 SD component table
//!
//! | Id | Component        | Transport | Address      | Activation    |
//! |----|------------------|-----------|--------------|---------------|
//! | 0  | BIC              | SPI       | -            | self-activate |
//! | 1  | VR PVDDCR_CPU1   | I2C       | bus 4, 0x63  | power cycle   |
//! | 2  | VR PVDD11_S3     | I2C       | bus 4, 0x72  | power cycle   |
//! | 3  | VR PVDDCR_CPU0   | I2C       | bus 4, 0x76  | power cycle   |
//! | 4  | x16 retimer      | I2C       | bus 6, 0x20  | by device     |
//! | 5  | x8 retimer       | I2C       | bus 6, 0x23  | by device     |

use bic_firmware_update::{
    ComponentDescriptor, ComponentId, ComponentKind, ComponentTable, FirmwareUpdateResult,
};
use bic_hal::{BusId, BusTarget};

pub const BIC: ComponentId = ComponentId(0);
pub const VR_PVDDCR_CPU1: ComponentId = ComponentId(1);
pub const VR_PVDD11_S3: ComponentId = ComponentId(2);
pub const VR_PVDDCR_CPU0: ComponentId = ComponentId(3);
pub const X16_RETIMER: ComponentId = ComponentId(4);
pub const X8_RETIMER: ComponentId = ComponentId(5);

const VR_BUS: BusId = BusId::I2C4;
const RETIMER_BUS: BusId = BusId::I2C6;

fn regulator(id: ComponentId, rail: &'static str, addr: u8) -> ComponentDescriptor {
    ComponentDescriptor::new(
        id.0,
        ComponentKind::VoltageRegulator {
            rail,
            target: BusTarget::new(VR_BUS, addr),
        },
    )
}

fn retimer(id: ComponentId, lanes: u8, addr: u8) -> ComponentDescriptor {
    ComponentDescriptor::new(
        id.0,
        ComponentKind::Retimer {
            lanes,
            target: BusTarget::new(RETIMER_BUS, addr),
        },
    )
}

/// Build the board's component table.
pub fn component_table() -> FirmwareUpdateResult<ComponentTable> {
    ComponentTable::builder()
        .component(ComponentDescriptor::new(BIC.0, ComponentKind::Controller))
        .component(regulator(VR_PVDDCR_CPU1, "PVDDCR_CPU1", 0x63))
        .component(regulator(VR_PVDD11_S3, "PVDD11_S3", 0x72))
        .component(regulator(VR_PVDDCR_CPU0, "PVDDCR_CPU0", 0x76))
        .component(retimer(X16_RETIMER, 16, 0x20))
        .component(retimer(X8_RETIMER, 8, 0x23))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bic_firmware_update::{Activation, FirmwareUpdateError};
    use bic_hal::Transport;

    #[test]
    fn test_board_table() -> FirmwareUpdateResult<()> {
        let table = component_table()?;
        assert_eq!(table.len(), 6);

        let bic = table.lookup(BIC)?;
        assert_eq!(bic.transport, Transport::Spi);
        assert_eq!(bic.activation, Activation::SelfActivating);
        assert!(bic.hooks.self_activate);

        let vr = table.lookup(VR_PVDD11_S3)?;
        assert_eq!(vr.kind.target(), Some(BusTarget::new(BusId::I2C4, 0x72)));
        assert_eq!(vr.activation, Activation::PowerCycle);

        let x8 = table.lookup(X8_RETIMER)?;
        assert_eq!(x8.kind.target(), Some(BusTarget::new(BusId::I2C6, 0x23)));
        assert!(!x8.hooks.self_activate);

        assert!(matches!(
            table.lookup(ComponentId(6)),
            Err(FirmwareUpdateError::UnknownComponent(ComponentId(6)))
        ));
        Ok(())
    }
}
