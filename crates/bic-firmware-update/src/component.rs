//! Component capability table
//!
//! Maps host-visible component ids to what the endpoint knows about each
//! updatable unit: its kind (which fixes its bus addressing and hook
//! behavior), transport, activation method and which lifecycle hooks it
//! exposes.

use crate::error::{FirmwareUpdateError, FirmwareUpdateResult};
use crate::hooks::{ComponentHooks, ControllerHooks, RegulatorHooks, RetimerHooks};
use bic_hal::{BusTarget, MonitorDomain, Transport};
use bic_pldm_protocol::COMP_CLASS_TYPE_DOWNSTREAM;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Host-visible component identifier, stable across firmware revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u16);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ComponentId {
    fn from(value: u16) -> Self {
        ComponentId(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// The new image takes effect without outside help
    SelfActivating,
    /// The new image takes effect after an AC power cycle
    PowerCycle,
}

/// The closed set of component kinds this endpoint knows how to update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// The BIC itself, updated in-band through its own SPI flash
    Controller,
    VoltageRegulator { rail: &'static str, target: BusTarget },
    Retimer { lanes: u8, target: BusTarget },
}

impl ComponentKind {
    pub fn target(&self) -> Option<BusTarget> {
        match self {
            ComponentKind::Controller => None,
            ComponentKind::VoltageRegulator { target, .. } | ComponentKind::Retimer { target, .. } => {
                Some(*target)
            }
        }
    }

    /// Monitor group that must be quiet while this component is touched.
    pub fn monitor_domain(&self) -> Option<MonitorDomain> {
        match self {
            ComponentKind::Controller => None,
            ComponentKind::VoltageRegulator { .. } => Some(MonitorDomain::VoltageRegulators),
            ComponentKind::Retimer { .. } => Some(MonitorDomain::Retimers),
        }
    }

    pub fn transport(&self) -> Transport {
        match self {
            ComponentKind::Controller => Transport::Spi,
            _ => Transport::I2c,
        }
    }

    pub fn default_activation(&self) -> Activation {
        match self {
            ComponentKind::VoltageRegulator { .. } => Activation::PowerCycle,
            _ => Activation::SelfActivating,
        }
    }

    pub fn default_hooks(&self) -> HookSet {
        match self {
            ComponentKind::Controller => HookSet {
                pre_update: false,
                transfer: true,
                post_update: false,
                self_activate: true,
                get_version: false,
            },
            ComponentKind::VoltageRegulator { .. } => HookSet {
                pre_update: true,
                transfer: true,
                post_update: true,
                self_activate: false,
                get_version: true,
            },
            ComponentKind::Retimer { .. } => HookSet {
                pre_update: true,
                transfer: true,
                post_update: false,
                self_activate: false,
                get_version: true,
            },
        }
    }

    /// Hook implementation for this kind.
    pub fn hooks(&self) -> Box<dyn ComponentHooks> {
        match *self {
            ComponentKind::Controller => Box::new(ControllerHooks),
            ComponentKind::VoltageRegulator { target, .. } => Box::new(RegulatorHooks::new(target)),
            ComponentKind::Retimer { target, .. } => Box::new(RetimerHooks::new(target)),
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Controller => write!(f, "BIC"),
            ComponentKind::VoltageRegulator { rail, target } => write!(f, "VR {rail} ({target})"),
            ComponentKind::Retimer { lanes, target } => write!(f, "x{lanes} retimer ({target})"),
        }
    }
}

/// Which lifecycle hooks a component exposes. An absent hook is a no-op,
/// except `transfer`, without which the component cannot be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HookSet {
    pub pre_update: bool,
    pub transfer: bool,
    pub post_update: bool,
    pub self_activate: bool,
    pub get_version: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub component_id: ComponentId,
    pub classification: u16,
    pub classification_index: u8,
    pub enabled: bool,
    pub transport: Transport,
    pub activation: Activation,
    pub kind: ComponentKind,
    pub hooks: HookSet,
}

impl ComponentDescriptor {
    /// Descriptor with the kind's default transport, activation and hooks.
    pub fn new(component_id: u16, kind: ComponentKind) -> Self {
        Self {
            component_id: ComponentId(component_id),
            classification: COMP_CLASS_TYPE_DOWNSTREAM,
            classification_index: 0,
            enabled: true,
            transport: kind.transport(),
            activation: kind.default_activation(),
            kind,
            hooks: kind.default_hooks(),
        }
    }

    pub fn with_classification(mut self, classification: u16, index: u8) -> Self {
        self.classification = classification;
        self.classification_index = index;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_hooks(mut self, hooks: HookSet) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Immutable component bindings plus the runtime enable switches.
#[derive(Debug)]
pub struct ComponentTable {
    components: BTreeMap<ComponentId, ComponentDescriptor>,
    disabled: RwLock<BTreeSet<ComponentId>>,
}

impl ComponentTable {
    pub fn builder() -> ComponentTableBuilder {
        ComponentTableBuilder::default()
    }

    /// Resolve an id for an update or version request.
    ///
    /// Fails with [`FirmwareUpdateError::UnknownComponent`] for ids not in the
    /// table, disabled components, and components without a transfer hook.
    pub fn lookup(&self, id: ComponentId) -> FirmwareUpdateResult<&ComponentDescriptor> {
        let descriptor = self
            .components
            .get(&id)
            .ok_or(FirmwareUpdateError::UnknownComponent(id))?;
        if !descriptor.hooks.transfer || self.disabled.read().contains(&id) {
            return Err(FirmwareUpdateError::UnknownComponent(id));
        }
        Ok(descriptor)
    }

    /// Raw entry, regardless of enable state.
    pub fn get(&self, id: ComponentId) -> Option<&ComponentDescriptor> {
        self.components.get(&id)
    }

    pub fn is_enabled(&self, id: ComponentId) -> bool {
        self.components.contains_key(&id) && !self.disabled.read().contains(&id)
    }

    pub fn set_enabled(&self, id: ComponentId, enabled: bool) -> FirmwareUpdateResult<()> {
        if !self.components.contains_key(&id) {
            return Err(FirmwareUpdateError::UnknownComponent(id));
        }
        let mut disabled = self.disabled.write();
        let changed = if enabled {
            disabled.remove(&id)
        } else {
            disabled.insert(id)
        };
        if changed {
            info!(component_id = %id, enabled, "Component availability changed");
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.components.values()
    }

    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.components.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ComponentTableBuilder {
    components: Vec<ComponentDescriptor>,
}

impl ComponentTableBuilder {
    pub fn component(mut self, descriptor: ComponentDescriptor) -> Self {
        self.components.push(descriptor);
        self
    }

    pub fn build(self) -> FirmwareUpdateResult<ComponentTable> {
        let mut components = BTreeMap::new();
        let mut disabled = BTreeSet::new();
        for descriptor in self.components {
            let id = descriptor.component_id;
            if !descriptor.enabled {
                disabled.insert(id);
            }
            if components.insert(id, descriptor).is_some() {
                return Err(FirmwareUpdateError::DuplicateComponent(id));
            }
        }
        Ok(ComponentTable {
            components,
            disabled: RwLock::new(disabled),
        })
    }
}

/// One-time installation point for the component table.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    table: OnceLock<Arc<ComponentTable>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `table`. Later calls keep the first table and only warn.
    pub fn load(&self, table: ComponentTable) -> Arc<ComponentTable> {
        let mut installed = false;
        let loaded = self.table.get_or_init(|| {
            installed = true;
            Arc::new(table)
        });
        if installed {
            info!(components = loaded.len(), "Component table loaded");
        } else {
            warn!("Component table has already been loaded");
        }
        Arc::clone(loaded)
    }

    pub fn get(&self) -> Option<Arc<ComponentTable>> {
        self.table.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.table.get().is_some()
    }
}
