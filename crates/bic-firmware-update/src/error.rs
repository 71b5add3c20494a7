//! Error types for component update and version operations

use crate::component::ComponentId;
use crate::session::UpdatePhase;
use bic_pldm_protocol::CompletionCode;
use thiserror::Error;

/// Errors returned by the update orchestrator, version probe and table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FirmwareUpdateError {
    /// A required input was absent or empty
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    /// Id not in the table, disabled, or without a transfer hook
    #[error("Unknown or unavailable component: {0}")]
    UnknownComponent(ComponentId),

    #[error("Hardware read failed on component {component}: {reason}")]
    HardwareReadFailure {
        component: ComponentId,
        reason: String,
    },

    /// Rendered content would exceed the maximum payload size
    #[error("Output of {required} bytes exceeds maximum payload size {limit}")]
    BufferTooSmall { required: usize, limit: usize },

    #[error("Could not allocate {0} bytes")]
    AllocationFailure(usize),

    /// The variant strap resolved to neither known vendor family
    #[error("Component {component} reports unsupported variant strap level {level}")]
    UnsupportedVariant { component: ComponentId, level: u8 },

    #[error("Component {0} already has an operation in flight")]
    Busy(ComponentId),

    #[error("{phase} failed on component {component}: {reason}")]
    HookFailed {
        component: ComponentId,
        phase: UpdatePhase,
        reason: String,
    },

    #[error("Component {component} does not support {operation}")]
    Unsupported {
        component: ComponentId,
        operation: &'static str,
    },

    #[error("Component id {0} appears more than once in the table")]
    DuplicateComponent(ComponentId),
}

/// Result alias for firmware update operations
pub type FirmwareUpdateResult<T> = Result<T, FirmwareUpdateError>;

impl FirmwareUpdateError {
    /// Completion code reported to the host for this failure. Never `Success`.
    pub fn completion_code(&self) -> CompletionCode {
        match self {
            Self::MissingArgument(_) => CompletionCode::ErrorInvalidData,
            Self::UnknownComponent(_) => CompletionCode::ErrorInvalidData,
            Self::BufferTooSmall { .. } => CompletionCode::ErrorInvalidLength,
            Self::Busy(_) => CompletionCode::BusyInBackground,
            Self::Unsupported { .. } => CompletionCode::ErrorUnsupportedPldmCmd,
            Self::HookFailed {
                phase: UpdatePhase::PreUpdate,
                ..
            } => CompletionCode::UnableToInitiateUpdate,
            Self::HardwareReadFailure { .. }
            | Self::AllocationFailure(_)
            | Self::UnsupportedVariant { .. }
            | Self::HookFailed { .. }
            | Self::DuplicateComponent(_) => CompletionCode::Error,
        }
    }

    pub(crate) fn hook_failed(
        component: ComponentId,
        phase: UpdatePhase,
        reason: impl ToString,
    ) -> Self {
        Self::HookFailed {
            component,
            phase,
            reason: reason.to_string(),
        }
    }

    /// Tag a failure with the update phase it happened in. A `HookFailed`
    /// error keeps the phase it already carries.
    pub(crate) fn in_phase(self, component: ComponentId, phase: UpdatePhase) -> Self {
        match self {
            Self::HookFailed { .. } => self,
            other => Self::hook_failed(component, phase, other),
        }
    }

    pub(crate) fn read_failed(component: ComponentId, reason: impl ToString) -> Self {
        Self::HardwareReadFailure {
            component,
            reason: reason.to_string(),
        }
    }
}
