// ABOUTME: Best-effort compensation for a failed provisioning run.
// ABOUTME: Detaches and deletes only what this run may have created; snapshots are preserved.

use serde::Serialize;

use super::stage::Resource;
use super::state::RunState;
use crate::cloud::ControlPlane;
use crate::config::Config;
use crate::diagnostics::{Diagnostics, Warning};
use crate::poll::{Observation, PollError, poll_until};
use crate::types::{InstanceId, SnapshotId, VolumeId};

/// What rollback did, and what an operator still has to look at.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Nothing could have been created, so no compensation was attempted.
    pub skipped: bool,
    /// Snapshot kept for recovery. Never deleted.
    pub preserved_snapshot: Option<SnapshotId>,
    /// Secondary instance rollback acted on, if any.
    pub instance: Option<InstanceId>,
    /// True when the instance id came from a lookup by name.
    pub resolved_by_name: bool,
    /// Volumes listed as attached when detach was requested.
    pub detached: Vec<VolumeId>,
    /// Volumes the control plane accepted for deletion.
    pub deleted_volumes: Vec<VolumeId>,
    /// Deleted volumes confirmed gone.
    pub confirmed_deleted: Vec<VolumeId>,
    pub instance_deleted: bool,
    /// Resources that may still exist and need a human.
    pub manual_review: Vec<String>,
    pub warnings: Diagnostics,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.manual_review.is_empty() && !self.warnings.has_warnings()
    }
}

/// Reads a `RunState` and issues compensating calls in dependency order.
///
/// Every step swallows its own errors into warnings. `run` never fails.
pub struct RollbackCoordinator<'a, C: ControlPlane + ?Sized> {
    cloud: &'a C,
    config: &'a Config,
}

impl<'a, C: ControlPlane + ?Sized> RollbackCoordinator<'a, C> {
    pub fn new(cloud: &'a C, config: &'a Config) -> Self {
        Self { cloud, config }
    }

    pub async fn run(&self, state: &RunState) -> CleanupReport {
        let mut report = CleanupReport::default();

        tracing::warn!(stage = %state.current_stage(), "rolling back run {}", state.run_id());

        if let Some(snapshot) = state.snapshot_id() {
            tracing::info!(snapshot = %snapshot, "preserving snapshot for recovery");
            report.preserved_snapshot = Some(snapshot.clone());
        }

        if !state.may_exist(Resource::Instance) && state.deletable_clones().is_empty() {
            tracing::info!("no resources were created, nothing to roll back");
            report.skipped = true;
            return report;
        }

        let instance = self.resolve_instance(state, &mut report).await;

        if let Some(instance) = &instance {
            self.detach_volumes(instance, &mut report).await;
        }

        self.delete_clones(state, &mut report).await;

        if let Some(instance) = &instance {
            self.delete_instance(instance, &mut report).await;
        }

        if report.is_clean() {
            tracing::info!("rollback complete");
        } else {
            tracing::warn!(
                manual_review = report.manual_review.len(),
                "rollback finished with warnings"
            );
        }

        report
    }

    /// Recorded id first, then a lookup by name if creation may have happened.
    async fn resolve_instance(
        &self,
        state: &RunState,
        report: &mut CleanupReport,
    ) -> Option<InstanceId> {
        if let Some(id) = state.instance_id() {
            report.instance = Some(id.clone());
            return Some(id.clone());
        }

        if !state.may_exist(Resource::Instance) {
            return None;
        }

        let name = &self.config.instance.name;
        tracing::info!(%name, "instance id not recorded, resolving by name");

        match self.cloud.find_instance_by_name(name).await {
            Ok(Some(id)) => {
                tracing::info!(instance = %id, %name, "resolved instance by name");
                report.instance = Some(id.clone());
                report.resolved_by_name = true;
                Some(id)
            }
            Ok(None) => {
                tracing::info!(%name, "no instance with this name, skipping instance cleanup");
                None
            }
            Err(e) => {
                report.warnings.warn(Warning::lookup(format!(
                    "could not look up instance '{name}': {e}"
                )));
                report
                    .manual_review
                    .push(format!("instance named '{name}' (lookup failed)"));
                None
            }
        }
    }

    async fn detach_volumes(&self, instance: &InstanceId, report: &mut CleanupReport) {
        // The listing only feeds the report: an accepted attach can still be
        // missing from it, so the bulk detach is always issued.
        let attached = match self.cloud.list_instance_volumes(instance).await {
            Ok(volumes) => volumes,
            Err(e) if e.is_not_found() => {
                tracing::info!(instance = %instance, "instance is gone, nothing to detach");
                return;
            }
            Err(e) => {
                report.warnings.warn(Warning::lookup(format!(
                    "could not list volumes of instance {instance}: {e}"
                )));
                Vec::new()
            }
        };

        tracing::info!(instance = %instance, listed = attached.len(), "detaching all volumes");
        if let Err(e) = self.cloud.detach_all_volumes(instance).await {
            report.warnings.warn(Warning::detach(format!(
                "detach request for instance {instance} failed: {e}"
            )));
            return;
        }
        report.detached = attached;

        let result = poll_until(
            self.config.polling.detach(),
            &format!("volume detachment from {instance}"),
            || self.cloud.list_instance_volumes(instance),
            |volumes| {
                if volumes.is_empty() {
                    Observation::Done
                } else {
                    Observation::Pending(format!("{} still attached", volumes.len()))
                }
            },
        )
        .await;

        match result {
            Ok(_) => tracing::info!(instance = %instance, "all volumes detached"),
            Err(PollError::TimeoutExceeded { elapsed, .. }) => {
                report.warnings.warn(Warning::detach_timeout(format!(
                    "volumes still attached to {instance} after {}s, proceeding",
                    elapsed.as_secs()
                )));
            }
            Err(e) => report.warnings.warn(Warning::detach(e.to_string())),
        }
    }

    async fn delete_clones(&self, state: &RunState, report: &mut CleanupReport) {
        let ids = state.deletable_clones();
        if ids.is_empty() {
            tracing::info!("no cloned volumes recorded, skipping volume deletion");
            return;
        }

        tracing::info!(count = ids.len(), "deleting cloned volumes");
        match self.cloud.delete_volumes(&ids).await {
            Ok(()) => report.deleted_volumes = ids.clone(),
            Err(e) => report
                .warnings
                .warn(Warning::delete(format!("bulk volume delete failed: {e}"))),
        }

        for id in &ids {
            match self.cloud.get_volume(id).await {
                Err(e) if e.is_not_found() => report.confirmed_deleted.push(id.clone()),
                Ok(volume) => {
                    report.warnings.warn(Warning::delete_verification(format!(
                        "volume {id} still exists (state '{}')",
                        volume.state
                    )));
                    report.manual_review.push(format!("volume {id}"));
                }
                Err(e) => {
                    report.warnings.warn(Warning::delete_verification(format!(
                        "could not confirm deletion of volume {id}: {e}"
                    )));
                    report.manual_review.push(format!("volume {id}"));
                }
            }
        }
    }

    async fn delete_instance(&self, instance: &InstanceId, report: &mut CleanupReport) {
        if !self.config.rollback.delete_instance {
            tracing::info!(instance = %instance, "keeping secondary instance");
            return;
        }

        match self.cloud.delete_instance(instance).await {
            Ok(()) => {
                tracing::info!(instance = %instance, "secondary instance deleted");
                report.instance_deleted = true;
            }
            Err(e) if e.is_not_found() => report.instance_deleted = true,
            Err(e) => {
                report.warnings.warn(Warning::instance_delete(format!(
                    "could not delete instance {instance}: {e}"
                )));
                report.manual_review.push(format!("instance {instance}"));
            }
        }
    }
}
