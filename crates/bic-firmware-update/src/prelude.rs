//! Convenience re-exports for common firmware update types

pub use crate::component::{
    Activation, ComponentDescriptor, ComponentId, ComponentKind, ComponentRegistry,
    ComponentTable, HookSet,
};
pub use crate::error::{FirmwareUpdateError, FirmwareUpdateResult};
pub use crate::hooks::Hardware;
pub use crate::locks::ComponentLocks;
pub use crate::monitor::MonitorGate;
pub use crate::orchestrator::{
    ActivationOutcome, UpdateOrchestrator, UpdateOutcome, UpdateProgress, UpdateReport,
};
pub use crate::session::{PhaseOutcome, UpdateParams, UpdatePhase};
pub use crate::version::{VersionProbe, VersionReport};
