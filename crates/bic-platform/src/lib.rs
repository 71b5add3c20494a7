//! Yosemite-4 SD BIC platform layer
//!
//! Wires the firmware-update core to a concrete board:
//!
//! - [`board`]: the six updatable components and their bus addressing
//! - [`config`]: JSON endpoint configuration
//! - [`logging`]: `tracing` subscriber setup
//! - [`presence`]: slot presence polling and state-sensor events
//! - [`endpoint`]: the operations the PLDM command dispatcher calls

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(rust_2018_idioms)]

pub mod board;
pub mod config;
pub mod endpoint;
pub mod logging;
pub mod presence;

pub use config::{EndpointConfig, PresenceConfig, PresenceSlotConfig};
pub use endpoint::Endpoint;
pub use logging::{LoggingConfig, init_logging};
pub use presence::{PresenceChecker, PresenceSlot, PresenceSource, PresenceTask};
