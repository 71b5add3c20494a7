//! Lifecycle hooks, one implementation per component kind

use crate::component::ComponentId;
use crate::error::{FirmwareUpdateError, FirmwareUpdateResult};
use crate::session::{UpdateParams, UpdatePhase};
use crate::version::VersionReading;
use async_trait::async_trait;
use bic_hal::{
    BusTarget, FirmwareWriter, HalError, ImageWrite, RegulatorChip, RetimerChip, StrapPin,
    StrapReader, VrVendor,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Outbound hardware capabilities the hooks drive.
#[derive(Clone)]
pub struct Hardware {
    pub straps: Arc<dyn StrapReader>,
    pub regulators: Arc<dyn RegulatorChip>,
    pub retimers: Arc<dyn RetimerChip>,
    pub writer: Arc<dyn FirmwareWriter>,
}

impl fmt::Debug for Hardware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hardware").finish_non_exhaustive()
    }
}

/// Behavior behind each entry of a [`HookSet`](crate::HookSet).
///
/// The orchestrator only calls a hook whose flag is set, and takes care of
/// monitoring suspension around the whole sequence; hooks deal with the
/// device alone.
#[async_trait]
pub trait ComponentHooks: Send + Sync {
    /// Resolve addressing and variant selection into `params`.
    async fn pre_update(&self, hw: &Hardware, params: &mut UpdateParams)
    -> FirmwareUpdateResult<()>;

    /// Write the payload.
    async fn transfer(
        &self,
        hw: &Hardware,
        params: &UpdateParams,
        image: &[u8],
    ) -> FirmwareUpdateResult<()>;

    async fn post_update(&self, hw: &Hardware, params: &UpdateParams) -> FirmwareUpdateResult<()>;

    async fn self_activate(&self, hw: &Hardware, params: &UpdateParams)
    -> FirmwareUpdateResult<()>;

    /// Read whatever the component reports as its firmware version.
    async fn get_version(
        &self,
        hw: &Hardware,
        component: ComponentId,
    ) -> FirmwareUpdateResult<VersionReading>;
}

async fn write_image(
    hw: &Hardware,
    params: &UpdateParams,
    image: &[u8],
) -> FirmwareUpdateResult<()> {
    let request = ImageWrite {
        transport: params.transport,
        target: params.target,
        vendor: params.vendor,
        image,
    };
    hw.writer
        .write_image(request)
        .await
        .map_err(|e| FirmwareUpdateError::hook_failed(params.component_id, UpdatePhase::Transfer, e))
}

/// The controller itself: SPI transfer plus a self-activate step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerHooks;

#[async_trait]
impl ComponentHooks for ControllerHooks {
    async fn pre_update(
        &self,
        _hw: &Hardware,
        _params: &mut UpdateParams,
    ) -> FirmwareUpdateResult<()> {
        Ok(())
    }

    async fn transfer(
        &self,
        hw: &Hardware,
        params: &UpdateParams,
        image: &[u8],
    ) -> FirmwareUpdateResult<()> {
        write_image(hw, params, image).await
    }

    async fn post_update(&self, _hw: &Hardware, _params: &UpdateParams) -> FirmwareUpdateResult<()> {
        Ok(())
    }

    async fn self_activate(&self, hw: &Hardware, params: &UpdateParams) -> FirmwareUpdateResult<()> {
        info!(component_id = %params.component_id, "Activating new controller image");
        hw.writer.self_activate().await.map_err(|e| {
            FirmwareUpdateError::hook_failed(params.component_id, UpdatePhase::Activate, e)
        })
    }

    async fn get_version(
        &self,
        _hw: &Hardware,
        component: ComponentId,
    ) -> FirmwareUpdateResult<VersionReading> {
        Err(FirmwareUpdateError::Unsupported {
            component,
            operation: "get_version",
        })
    }
}

/// Voltage regulators whose vendor is picked by the `VR_TYPE` strap.
#[derive(Debug, Clone, Copy)]
pub struct RegulatorHooks {
    target: BusTarget,
}

impl RegulatorHooks {
    pub fn new(target: BusTarget) -> Self {
        Self { target }
    }

    async fn detect_vendor(
        &self,
        hw: &Hardware,
        component: ComponentId,
        on_read_error: impl FnOnce(HalError) -> FirmwareUpdateError,
    ) -> FirmwareUpdateResult<VrVendor> {
        let level = hw.straps.read_strap(StrapPin::VrType).map_err(on_read_error)?;
        let vendor = VrVendor::from_strap(level)
            .ok_or(FirmwareUpdateError::UnsupportedVariant { component, level })?;
        debug!(component_id = %component, %vendor, "Regulator vendor detected");
        Ok(vendor)
    }
}

#[async_trait]
impl ComponentHooks for RegulatorHooks {
    async fn pre_update(&self, hw: &Hardware, params: &mut UpdateParams) -> FirmwareUpdateResult<()> {
        let component = params.component_id;
        let vendor = self
            .detect_vendor(hw, component, |e| {
                FirmwareUpdateError::hook_failed(component, UpdatePhase::PreUpdate, e)
            })
            .await?;
        params.target = Some(self.target);
        params.vendor = Some(vendor);
        Ok(())
    }

    async fn transfer(
        &self,
        hw: &Hardware,
        params: &UpdateParams,
        image: &[u8],
    ) -> FirmwareUpdateResult<()> {
        if params.target.is_none() {
            return Err(FirmwareUpdateError::MissingArgument("regulator bus target"));
        }
        write_image(hw, params, image).await
    }

    async fn post_update(&self, _hw: &Hardware, params: &UpdateParams) -> FirmwareUpdateResult<()> {
        debug!(component_id = %params.component_id, "Regulator update finished, activation needs a power cycle");
        Ok(())
    }

    async fn self_activate(
        &self,
        _hw: &Hardware,
        _params: &UpdateParams,
    ) -> FirmwareUpdateResult<()> {
        Ok(())
    }

    async fn get_version(
        &self,
        hw: &Hardware,
        component: ComponentId,
    ) -> FirmwareUpdateResult<VersionReading> {
        let read_failed = |e: HalError| FirmwareUpdateError::read_failed(component, e);
        let vendor = self.detect_vendor(hw, component, read_failed).await?;
        let checksum = hw
            .regulators
            .read_checksum(vendor, self.target)
            .await
            .map_err(read_failed)?;
        let remaining_writes = if vendor.has_remaining_writes() {
            Some(
                hw.regulators
                    .read_remaining_writes(vendor, self.target)
                    .await
                    .map_err(read_failed)?,
            )
        } else {
            None
        };
        Ok(VersionReading::Regulator {
            vendor,
            checksum,
            remaining_writes,
        })
    }
}

/// PCIe retimers. They pick up new firmware on their own.
#[derive(Debug, Clone, Copy)]
pub struct RetimerHooks {
    target: BusTarget,
}

impl RetimerHooks {
    pub fn new(target: BusTarget) -> Self {
        Self { target }
    }
}

#[async_trait]
impl ComponentHooks for RetimerHooks {
    async fn pre_update(&self, _hw: &Hardware, params: &mut UpdateParams) -> FirmwareUpdateResult<()> {
        params.target = Some(self.target);
        Ok(())
    }

    async fn transfer(
        &self,
        hw: &Hardware,
        params: &UpdateParams,
        image: &[u8],
    ) -> FirmwareUpdateResult<()> {
        if params.target.is_none() {
            return Err(FirmwareUpdateError::MissingArgument("retimer bus target"));
        }
        write_image(hw, params, image).await
    }

    async fn post_update(&self, _hw: &Hardware, _params: &UpdateParams) -> FirmwareUpdateResult<()> {
        Ok(())
    }

    async fn self_activate(
        &self,
        _hw: &Hardware,
        _params: &UpdateParams,
    ) -> FirmwareUpdateResult<()> {
        Ok(())
    }

    async fn get_version(
        &self,
        hw: &Hardware,
        component: ComponentId,
    ) -> FirmwareUpdateResult<VersionReading> {
        let raw = hw
            .retimers
            .read_version(self.target)
            .await
            .map_err(|e| FirmwareUpdateError::read_failed(component, e))?;
        Ok(VersionReading::Retimer { raw })
    }
}
