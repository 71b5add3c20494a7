//! Component update orchestrator
//!
//! Drives one update through `PRE_UPDATE → TRANSFER → POST_UPDATE → ACTIVATE`
//! using the hooks selected by the component's kind. Monitoring of the
//! component's domain is suspended before `pre_update` runs and restored once
//! `post_update` has run, whatever the transfer outcome.

use crate::component::{Activation, ComponentDescriptor, ComponentId, ComponentTable};
use crate::error::{FirmwareUpdateError, FirmwareUpdateResult};
use crate::hooks::{ComponentHooks, Hardware};
use crate::locks::ComponentLocks;
use crate::monitor::MonitorGate;
use crate::session::{PhaseOutcome, PhaseRecord, UpdateParams, UpdatePhase, UpdateSession};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Progress notification published on every phase change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProgress {
    pub component_id: ComponentId,
    pub phase: UpdatePhase,
    pub status_message: String,
}

/// How the freshly written image takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationOutcome {
    /// The controller switched to the new image
    Activated,
    /// The device picks up the new image on its own
    AppliedByDevice,
    /// An AC power cycle is needed before the new image runs
    PowerCycleRequired,
}

/// Result of a completed update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub component_id: ComponentId,
    pub params: UpdateParams,
    pub activation: ActivationOutcome,
    pub phases: Vec<PhaseRecord>,
    pub duration: Duration,
}

/// Record of the most recent update attempt on one component, kept whether
/// the attempt succeeded or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub component_id: ComponentId,
    pub success: bool,
    pub error: Option<String>,
    pub phases: Vec<PhaseRecord>,
    pub duration: Duration,
}

pub struct UpdateOrchestrator {
    table: Arc<ComponentTable>,
    hardware: Hardware,
    gate: Arc<MonitorGate>,
    locks: Arc<ComponentLocks>,
    progress_tx: broadcast::Sender<UpdateProgress>,
    reports: Mutex<BTreeMap<ComponentId, UpdateReport>>,
}

impl std::fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("components", &self.table.len())
            .field("in_flight", &self.locks.in_flight())
            .finish_non_exhaustive()
    }
}

impl UpdateOrchestrator {
    pub fn new(
        table: Arc<ComponentTable>,
        hardware: Hardware,
        gate: Arc<MonitorGate>,
        locks: Arc<ComponentLocks>,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            table,
            hardware,
            gate,
            locks,
            progress_tx,
            reports: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<UpdateProgress> {
        self.progress_tx.subscribe()
    }

    pub fn active_updates(&self) -> Vec<ComponentId> {
        self.locks.in_flight()
    }

    pub fn table(&self) -> &Arc<ComponentTable> {
        &self.table
    }

    /// Phase log of the last update attempt on `component_id`, if any.
    pub fn last_report(&self, component_id: ComponentId) -> Option<UpdateReport> {
        self.reports.lock().get(&component_id).cloned()
    }

    /// Run a full update of `component_id` with `image`.
    ///
    /// # Errors
    ///
    /// `MissingArgument` for an empty image, `UnknownComponent` when the id
    /// does not resolve, `Busy` when the component already has an operation
    /// in flight. A hook failure comes back as `HookFailed` carrying the phase
    /// it failed in. When both transfer and post-update fail, the transfer
    /// error is returned.
    pub async fn update_component(
        &self,
        component_id: ComponentId,
        image: &[u8],
    ) -> FirmwareUpdateResult<UpdateOutcome> {
        if image.is_empty() {
            return Err(FirmwareUpdateError::MissingArgument("firmware image"));
        }
        let descriptor = self.table.lookup(component_id)?;
        let _lease = self.locks.try_acquire(component_id)?;

        info!(
            component_id = %component_id,
            kind = %descriptor.kind,
            image_len = image.len(),
            "Starting component update"
        );

        let hooks = descriptor.kind.hooks();
        let mut session =
            UpdateSession::new(UpdateParams::new(component_id, descriptor.transport));

        // PRE_UPDATE
        self.enter(&mut session, UpdatePhase::PreUpdate);
        let suspension = descriptor
            .kind
            .monitor_domain()
            .map(|domain| self.gate.suspend(domain));
        if descriptor.hooks.pre_update {
            if let Err(e) = hooks.pre_update(&self.hardware, session.params_mut()).await {
                session.record(PhaseOutcome::Failed(e.to_string()));
                drop(suspension);
                return Err(self.fail(&mut session, UpdatePhase::PreUpdate, e));
            }
            session.record(PhaseOutcome::Completed);
        } else {
            session.record(PhaseOutcome::Skipped);
        }

        // TRANSFER
        self.enter(&mut session, UpdatePhase::Transfer);
        let transfer = hooks.transfer(&self.hardware, session.params(), image).await;
        match &transfer {
            Ok(()) => session.record(PhaseOutcome::Completed),
            Err(e) => session.record(PhaseOutcome::Failed(e.to_string())),
        }

        // POST_UPDATE runs on both paths
        self.enter(&mut session, UpdatePhase::PostUpdate);
        let post = self.post_update(descriptor, hooks.as_ref(), &mut session).await;
        drop(suspension);

        match (transfer, post) {
            (Err(transfer_err), Err(post_err)) => {
                error!(
                    component_id = %component_id,
                    "Post-update cleanup also failed: {}",
                    post_err
                );
                return Err(self.fail(&mut session, UpdatePhase::Transfer, transfer_err));
            }
            (Err(e), Ok(())) => return Err(self.fail(&mut session, UpdatePhase::Transfer, e)),
            (Ok(()), Err(e)) => return Err(self.fail(&mut session, UpdatePhase::PostUpdate, e)),
            (Ok(()), Ok(())) => {}
        }

        // ACTIVATE
        self.enter(&mut session, UpdatePhase::Activate);
        let activation = match self.activate(descriptor, hooks.as_ref(), &mut session).await {
            Ok(activation) => activation,
            Err(e) => {
                let e = e.in_phase(component_id, UpdatePhase::Activate);
                error!(component_id = %component_id, "Activation failed: {}", e);
                session.record(PhaseOutcome::Failed(e.to_string()));
                self.publish(component_id, UpdatePhase::Activate, e.to_string());
                self.store_report(&session, Some(&e));
                return Err(e);
            }
        };

        self.enter(&mut session, UpdatePhase::Done);
        self.store_report(&session, None);
        let duration = session.elapsed();
        let (params, phases) = session.into_parts();
        info!(
            component_id = %component_id,
            ?activation,
            elapsed_ms = duration.as_millis(),
            "Component update complete"
        );
        Ok(UpdateOutcome {
            component_id,
            params,
            activation,
            phases,
            duration,
        })
    }

    async fn post_update(
        &self,
        descriptor: &ComponentDescriptor,
        hooks: &dyn ComponentHooks,
        session: &mut UpdateSession,
    ) -> FirmwareUpdateResult<()> {
        if !descriptor.hooks.post_update {
            session.record(PhaseOutcome::Skipped);
            return Ok(());
        }
        let result = hooks.post_update(&self.hardware, session.params()).await;
        match &result {
            Ok(()) => session.record(PhaseOutcome::Completed),
            Err(e) => session.record(PhaseOutcome::Failed(e.to_string())),
        }
        result
    }

    async fn activate(
        &self,
        descriptor: &ComponentDescriptor,
        hooks: &dyn ComponentHooks,
        session: &mut UpdateSession,
    ) -> FirmwareUpdateResult<ActivationOutcome> {
        let outcome = match descriptor.activation {
            Activation::PowerCycle => {
                session.record(PhaseOutcome::Skipped);
                ActivationOutcome::PowerCycleRequired
            }
            Activation::SelfActivating if descriptor.hooks.self_activate => {
                hooks.self_activate(&self.hardware, session.params()).await?;
                session.record(PhaseOutcome::Completed);
                ActivationOutcome::Activated
            }
            Activation::SelfActivating => {
                session.record(PhaseOutcome::Skipped);
                ActivationOutcome::AppliedByDevice
            }
        };
        Ok(outcome)
    }

    fn enter(&self, session: &mut UpdateSession, phase: UpdatePhase) {
        session.advance(phase);
        self.publish(session.params().component_id, phase, phase.to_string());
    }

    fn fail(
        &self,
        session: &mut UpdateSession,
        failed_in: UpdatePhase,
        e: FirmwareUpdateError,
    ) -> FirmwareUpdateError {
        let component_id = session.params().component_id;
        let e = e.in_phase(component_id, failed_in);
        session.advance(UpdatePhase::Failed);
        warn!(component_id = %component_id, phase = %failed_in, "Component update failed: {}", e);
        self.publish(component_id, UpdatePhase::Failed, e.to_string());
        self.store_report(session, Some(&e));
        e
    }

    fn store_report(&self, session: &UpdateSession, error: Option<&FirmwareUpdateError>) {
        let component_id = session.params().component_id;
        let report = UpdateReport {
            component_id,
            success: error.is_none(),
            error: error.map(ToString::to_string),
            phases: session.records().to_vec(),
            duration: session.elapsed(),
        };
        self.reports.lock().insert(component_id, report);
    }

    fn publish(&self, component_id: ComponentId, phase: UpdatePhase, status_message: String) {
        let progress = UpdateProgress {
            component_id,
            phase,
            status_message,
        };
        if self.progress_tx.send(progress).is_err() {
            debug!(component_id = %component_id, %phase, "No progress subscribers");
        }
    }
}
