//! Per-request update session state

use crate::component::ComponentId;
use bic_hal::{BusTarget, Transport, VrVendor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Lifecycle of one component update.
///
/// `Idle → PreUpdate → Transfer → PostUpdate → Activate → Done`, with
/// `Failed` reachable from the three hook phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UpdatePhase {
    #[default]
    Idle,
    PreUpdate,
    Transfer,
    PostUpdate,
    Activate,
    Done,
    Failed,
}

impl UpdatePhase {
    pub fn can_transition_to(self, next: UpdatePhase) -> bool {
        use UpdatePhase::*;
        matches!(
            (self, next),
            (Idle, PreUpdate)
                | (PreUpdate, Transfer)
                | (Transfer, PostUpdate)
                | (PostUpdate, Activate)
                | (Activate, Done)
                | (PreUpdate | Transfer | PostUpdate, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UpdatePhase::Done | UpdatePhase::Failed)
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdatePhase::Idle => "IDLE",
            UpdatePhase::PreUpdate => "PRE_UPDATE",
            UpdatePhase::Transfer => "TRANSFER",
            UpdatePhase::PostUpdate => "POST_UPDATE",
            UpdatePhase::Activate => "ACTIVATE",
            UpdatePhase::Done => "DONE",
            UpdatePhase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Parameter block handed to the hooks. `pre_update` fills in the addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateParams {
    pub component_id: ComponentId,
    pub transport: Transport,
    pub target: Option<BusTarget>,
    pub vendor: Option<VrVendor>,
}

impl UpdateParams {
    pub fn new(component_id: ComponentId, transport: Transport) -> Self {
        Self {
            component_id,
            transport,
            target: None,
            vendor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseOutcome {
    Completed,
    /// The component has no hook for this phase
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: UpdatePhase,
    pub outcome: PhaseOutcome,
    pub elapsed: Duration,
}

/// State of one in-flight update. Created per request and dropped when the
/// orchestrator returns.
#[derive(Debug)]
pub struct UpdateSession {
    params: UpdateParams,
    phase: UpdatePhase,
    records: Vec<PhaseRecord>,
    phase_started: Instant,
    started: Instant,
}

impl UpdateSession {
    pub fn new(params: UpdateParams) -> Self {
        let now = Instant::now();
        Self {
            params,
            phase: UpdatePhase::Idle,
            records: Vec::new(),
            phase_started: now,
            started: now,
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn params(&self) -> &UpdateParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut UpdateParams {
        &mut self.params
    }

    pub fn records(&self) -> &[PhaseRecord] {
        &self.records
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn advance(&mut self, next: UpdatePhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {} -> {}",
            self.phase,
            next
        );
        debug!(
            component_id = %self.params.component_id,
            from = %self.phase,
            to = %next,
            "Update phase change"
        );
        self.phase = next;
        self.phase_started = Instant::now();
    }

    /// Close out the current phase with `outcome`.
    pub fn record(&mut self, outcome: PhaseOutcome) {
        self.records.push(PhaseRecord {
            phase: self.phase,
            outcome,
            elapsed: self.phase_started.elapsed(),
        });
    }

    pub fn into_parts(self) -> (UpdateParams, Vec<PhaseRecord>) {
        (self.params, self.records)
    }
}
