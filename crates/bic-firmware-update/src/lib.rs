//! Component firmware update for BIC endpoints
//!
//! This crate updates and reports the firmware of the units behind a BIC:
//! the controller itself, its voltage regulators and its PCIe retimers.
//!
//! - [`component`]: the capability table mapping component ids to kinds,
//!   transports, activation methods and hooks
//! - [`hooks`]: one [`ComponentHooks`] implementation per component kind
//! - [`orchestrator`]: the phased update sequence
//! - [`version`]: fresh version reads rendered as short ASCII strings
//! - [`monitor`]: suspension of background monitoring around hardware access
//! - [`locks`]: one operation in flight per component
//! - [`error`]: error types and their completion codes
//!
//! # Safety
//!
//! The background sensor poller must not touch a device while it is being
//! written or probed. Every update and version read holds a
//! [`MonitorSuspension`] for the component's domain and restores the prior
//! monitoring setting on every exit path.
//!
//! # Example
//!
//! ```ignore
//! use bic_firmware_update::prelude::*;
//!
//! let table = ComponentTable::builder()
//!     .component(ComponentDescriptor::new(0, ComponentKind::Controller))
//!     .build()?;
//! let orchestrator = UpdateOrchestrator::new(Arc::new(table), hardware, gate, locks);
//! let outcome = orchestrator.update_component(ComponentId(0), &image).await?;
//! assert_eq!(outcome.activation, ActivationOutcome::Activated);
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(rust_2018_idioms)]

pub mod component;
pub mod error;
pub mod hooks;
pub mod locks;
pub mod monitor;
pub mod orchestrator;
pub mod prelude;
pub mod session;
pub mod version;

pub use component::{
    Activation, ComponentDescriptor, ComponentId, ComponentKind, ComponentRegistry,
    ComponentTable, ComponentTableBuilder, HookSet,
};
pub use error::{FirmwareUpdateError, FirmwareUpdateResult};
pub use hooks::{ComponentHooks, ControllerHooks, Hardware, RegulatorHooks, RetimerHooks};
pub use locks::{ComponentLease, ComponentLocks};
pub use monitor::{MonitorGate, MonitorSuspension};
pub use orchestrator::{
    ActivationOutcome, UpdateOrchestrator, UpdateOutcome, UpdateProgress, UpdateReport,
};
pub use session::{PhaseOutcome, PhaseRecord, UpdateParams, UpdatePhase, UpdateSession};
pub use version::{
    REMAINING_WRITE_SEPARATOR, VersionProbe, VersionReading, VersionReport, packed_bcd,
};
