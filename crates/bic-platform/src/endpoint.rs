//! PLDM endpoint facade
//!
//! The four operations the enclosing command dispatcher calls. Everything
//! else (MCTP framing, request decoding, the PLDM update-agent state machine)
//! stays in the dispatcher.

use crate::board;
use crate::config::{EndpointConfig, PresenceConfig};
use crate::presence::{PresenceChecker, PresenceSource, PresenceTask};
use anyhow::{Context, Result, bail};
use bic_firmware_update::{
    ComponentId, ComponentLocks, ComponentRegistry, ComponentTable, FirmwareUpdateResult,
    Hardware, MonitorGate, UpdateOrchestrator, UpdateOutcome, UpdateProgress, VersionProbe,
    VersionReport,
};
use bic_hal::MonitorControl;
use bic_pldm_protocol::{
    DescriptorEncoder, DeviceIdentity, EventSink, ProtocolResult, supported_message_types,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub struct Endpoint {
    identity: DeviceIdentity,
    encoder: DescriptorEncoder,
    table: Arc<ComponentTable>,
    orchestrator: UpdateOrchestrator,
    probe: VersionProbe,
    presence: PresenceConfig,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("identity", &self.identity)
            .field("encoder", &self.encoder)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    /// Build the endpoint for the Yosemite-4 SD board.
    ///
    /// The board table is installed into `registry` on first use; later
    /// endpoints share the installed table. The availability of every
    /// component is reset from `config`: ids in `disabled_components` are
    /// switched off and all others go back to their table default. Since the
    /// table is shared, the most recently built endpoint's config wins.
    pub fn new(
        config: &EndpointConfig,
        registry: &ComponentRegistry,
        hardware: Hardware,
        monitor: Arc<dyn MonitorControl>,
    ) -> Result<Self> {
        config.validate()?;
        let table = match registry.get() {
            Some(table) => table,
            None => registry.load(board::component_table().context("Invalid board component table")?),
        };

        let disabled: BTreeSet<ComponentId> = config
            .disabled_components
            .iter()
            .copied()
            .map(ComponentId)
            .collect();
        if let Some(unknown) = disabled.iter().find(|id| table.get(**id).is_none()) {
            bail!("Cannot disable component {}: not in the component table", unknown);
        }
        for descriptor in table.iter() {
            let id = descriptor.component_id;
            table
                .set_enabled(id, descriptor.enabled && !disabled.contains(&id))
                .with_context(|| format!("Cannot set availability of component {}", id))?;
        }

        let gate = Arc::new(MonitorGate::new(monitor));
        let locks = Arc::new(ComponentLocks::new());
        let orchestrator =
            UpdateOrchestrator::new(table.clone(), hardware.clone(), gate.clone(), locks.clone());
        let probe = VersionProbe::new(table.clone(), hardware, gate, locks)
            .with_max_payload_size(config.max_payload_size);

        info!(
            components = table.len(),
            disabled = config.disabled_components.len(),
            max_payload_size = config.max_payload_size,
            "PLDM endpoint ready"
        );
        Ok(Self {
            identity: config.identity,
            encoder: DescriptorEncoder::new(config.max_payload_size),
            table,
            orchestrator,
            probe,
            presence: config.presence.clone(),
        })
    }

    /// Answer `QueryDeviceIdentifiers`.
    ///
    /// The command carries no request data. `resp` always holds a complete
    /// response afterwards, header-only with an error completion code when
    /// the identifiers do not fit.
    pub fn query_device_identifiers(&self, request: &[u8], resp: &mut Vec<u8>) -> ProtocolResult<usize> {
        if !request.is_empty() {
            debug!(len = request.len(), "Ignoring QueryDeviceIdentifiers request data");
        }
        self.encoder.query_device_identifiers(&self.identity, resp)
    }

    pub async fn update_component(
        &self,
        component_id: ComponentId,
        image: &[u8],
    ) -> FirmwareUpdateResult<UpdateOutcome> {
        self.orchestrator.update_component(component_id, image).await
    }

    pub async fn get_component_version(
        &self,
        component_id: ComponentId,
    ) -> FirmwareUpdateResult<VersionReport> {
        self.probe.get_component_version(component_id).await
    }

    /// MCTP message types this endpoint handles, in report order.
    pub fn get_supported_message_types(&self) -> Vec<u8> {
        supported_message_types()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<UpdateProgress> {
        self.orchestrator.subscribe_progress()
    }

    pub fn table(&self) -> &Arc<ComponentTable> {
        &self.table
    }

    /// Start slot presence polling as configured. Returns `None` when the
    /// config leaves it off. Must be called from within a tokio runtime.
    pub fn start_presence(
        &self,
        source: Arc<dyn PresenceSource>,
        sink: Arc<dyn EventSink>,
    ) -> Option<PresenceTask> {
        PresenceChecker::start(&self.presence, source, sink)
    }
}
