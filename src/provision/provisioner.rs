// ABOUTME: Stage sequencer: runs every stage in order and owns the RunState.
// ABOUTME: Any stage error or panic hands the recorded state to the rollback coordinator.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use snafu::{OptionExt, ResultExt};

use super::error::{DataShapeSnafu, FaultSnafu, ProvisionError, SubmissionSnafu};
use super::retry::{Exhausted, submit_with_retry};
use super::rollback::{CleanupReport, RollbackCoordinator};
use super::stage::Stage;
use super::state::RunState;
use super::summary::ProvisionSummary;
use super::volumes::{partition_clones, partition_snapshot_volumes};
use crate::cloud::{CloneRequest, ControlPlane, CreateInstanceRequest};
use crate::config::Config;
use crate::poll::{Observation, poll_until};

const INSTANCE_STOPPED: &[&str] = &["SHUTOFF", "STOPPED"];
const INSTANCE_ACTIVE: &[&str] = &["ACTIVE"];
const INSTANCE_FAILED: &[&str] = &["ERROR"];
const AVAILABLE: &[&str] = &["available"];
const ERRORED: &[&str] = &["error"];
const TASK_COMPLETED: &[&str] = &["completed"];
const TASK_FAILED: &[&str] = &["failed"];

/// A failed run: what went wrong, and what rollback did about it.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    pub error: ProvisionError,
    pub report: CleanupReport,
    pub state: RunState,
}

/// Runs the provisioning stages for one instance pair.
pub struct Provisioner<'a, C: ControlPlane + ?Sized> {
    cloud: &'a C,
    config: &'a Config,
    run_id: String,
    on_stage: Option<Box<dyn Fn(Stage) + Send + Sync + 'a>>,
}

impl<'a, C: ControlPlane + ?Sized> Provisioner<'a, C> {
    pub fn new(cloud: &'a C, config: &'a Config) -> Self {
        Self {
            cloud,
            config,
            run_id: chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string(),
            on_stage: None,
        }
    }

    /// Override the timestamp-derived run id used in snapshot and clone names.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Called as each stage is entered, for progress output.
    pub fn on_stage(mut self, callback: impl Fn(Stage) + Send + Sync + 'a) -> Self {
        self.on_stage = Some(Box::new(callback));
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn snapshot_name(&self) -> String {
        format!("{}-snap-{}", self.config.storage.name_prefix, self.run_id)
    }

    pub fn clone_name(&self) -> String {
        format!("{}-clone-{}", self.config.storage.name_prefix, self.run_id)
    }

    /// Run all stages with rollback armed.
    ///
    /// Compensation is registered before the first stage and cancelled only
    /// when the final stage marks the run successful. Errors and panics alike
    /// leave it armed, so rollback runs exactly once on every failed run.
    pub async fn run(&self) -> Result<ProvisionSummary, RunFailure> {
        let mut state = RunState::new(self.run_id.clone());

        let outcome = AssertUnwindSafe(self.run_stages(&mut state))
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok(())) if state.is_success() => {
                tracing::info!(run_id = %self.run_id, "provisioning complete");
                return Ok(ProvisionSummary::from_state(self.config, &state));
            }
            Ok(Ok(())) => ProvisionError::Fault {
                stage: state.current_stage(),
                message: "stage sequence ended without confirming boot".to_string(),
            },
            Ok(Err(e)) => e,
            Err(panic) => ProvisionError::Fault {
                stage: state.current_stage(),
                message: panic_message(panic.as_ref()),
            },
        };

        tracing::error!(
            stage = %error.stage(),
            kind = %error.kind(),
            "provisioning failed: {}",
            error
        );

        let report = RollbackCoordinator::new(self.cloud, self.config)
            .run(&state)
            .await;

        Err(RunFailure {
            error,
            report,
            state,
        })
    }

    /// Execute every stage in order without rollback.
    pub async fn run_stages(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        for stage in Stage::ORDER {
            self.execute(stage, state).await?;
        }
        Ok(())
    }

    /// Enter and execute a single stage.
    pub async fn execute(&self, stage: Stage, state: &mut RunState) -> Result<(), ProvisionError> {
        state.enter(stage);
        tracing::info!(stage = %stage, number = stage.number(), "entering stage");
        if let Some(callback) = &self.on_stage {
            callback(stage);
        }

        match stage {
            Stage::Authenticate => self.authenticate().await,
            Stage::CreateInstance => self.create_instance(state).await,
            Stage::WaitInstanceStopped => self.wait_instance_stopped(state).await,
            Stage::CreateSnapshot => self.create_snapshot(state).await,
            Stage::WaitSnapshotAvailable => self.wait_snapshot_available(state).await,
            Stage::ExtractVolumes => self.extract_volumes(state).await,
            Stage::CloneVolumes => self.clone_volumes(state).await,
            Stage::VerifyVolumesAvailable => self.verify_volumes_available(state).await,
            Stage::AttachVolumes => self.attach_volumes(state).await,
            Stage::BootInstance => self.boot_instance(state).await,
        }
    }

    // =========================================================================
    // Stages
    // =========================================================================

    async fn authenticate(&self) -> Result<(), ProvisionError> {
        let stage = Stage::Authenticate;
        self.cloud
            .authenticate()
            .await
            .context(SubmissionSnafu { stage, attempts: 1u32 })?;
        tracing::debug!(region = %self.config.region, "authenticated");
        Ok(())
    }

    async fn create_instance(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let stage = Stage::CreateInstance;
        let polling = &self.config.polling;
        let request = CreateInstanceRequest::from_config(self.config);

        let response = submit_with_retry(
            "instance creation",
            polling.submit_attempts,
            polling.submit_retry_delay,
            || self.cloud.create_instance(&request),
        )
        .await
        .map_err(|e| submission(stage, e))?;

        let id = response.instance_id().cloned().context(DataShapeSnafu {
            stage,
            message: format!("instance creation response carried no instance id: {response:?}"),
        })?;

        tracing::info!(instance = %id, name = %self.config.instance.name, "instance created");
        state.record_instance(id);
        Ok(())
    }

    async fn wait_instance_stopped(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let stage = Stage::WaitInstanceStopped;
        let polling = &self.config.polling;
        let id = state.instance_id().cloned().context(FaultSnafu {
            stage,
            message: "instance id not recorded",
        })?;
        let id = &id;

        if !polling.instance_grace.is_zero() {
            tracing::debug!(delay = ?polling.instance_grace, "waiting before first status check");
            tokio::time::sleep(polling.instance_grace).await;
        }

        poll_until(
            polling.instance_stop(),
            &format!("instance {id}"),
            || self.cloud.get_instance(id),
            |detail| Observation::from_status(&detail.status, INSTANCE_STOPPED, INSTANCE_FAILED),
        )
        .await
        .map_err(|e| ProvisionError::from_poll(stage, e))?;

        Ok(())
    }

    async fn create_snapshot(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let stage = Stage::CreateSnapshot;
        let name = self.snapshot_name();

        let response = self
            .cloud
            .create_snapshot(&self.config.primary_instance, &name)
            .await
            .context(SubmissionSnafu { stage, attempts: 1u32 })?;

        let id = response.id.context(DataShapeSnafu {
            stage,
            message: "snapshot creation response carried no snapshotID",
        })?;

        tracing::info!(
            snapshot = %id,
            source = %self.config.primary_instance,
            %name,
            "snapshot requested"
        );
        state.record_snapshot(id);
        Ok(())
    }

    async fn wait_snapshot_available(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let stage = Stage::WaitSnapshotAvailable;
        let id = state.snapshot_id().cloned().context(FaultSnafu {
            stage,
            message: "snapshot id not recorded",
        })?;
        let id = &id;

        poll_until(
            self.config.polling.snapshot(),
            &format!("snapshot {id}"),
            || self.cloud.get_snapshot(id),
            |detail| Observation::from_status(&detail.status, AVAILABLE, ERRORED),
        )
        .await
        .map_err(|e| ProvisionError::from_poll(stage, e))?;

        Ok(())
    }

    async fn extract_volumes(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let stage = Stage::ExtractVolumes;
        let polling = &self.config.polling;
        let id = state.snapshot_id().cloned().context(FaultSnafu {
            stage,
            message: "snapshot id not recorded",
        })?;
        let id = &id;

        let detail = submit_with_retry(
            "snapshot detail",
            polling.submit_attempts,
            polling.submit_retry_delay,
            || self.cloud.get_snapshot(id),
        )
        .await
        .map_err(|e| submission(stage, e))?;

        let volumes = partition_snapshot_volumes(&detail.volumes)
            .map_err(|e| ProvisionError::from_shape(stage, e))?;

        tracing::info!(
            boot = %volumes.boot,
            data = volumes.data.len(),
            "snapshot volumes identified"
        );
        state.record_source_volumes(volumes);
        Ok(())
    }

    async fn clone_volumes(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let stage = Stage::CloneVolumes;
        let polling = &self.config.polling;
        let source = state.source_volumes().cloned().context(FaultSnafu {
            stage,
            message: "source volumes not recorded",
        })?;

        let request = CloneRequest {
            name: self.clone_name(),
            volume_ids: source.all().into_iter().collect(),
            target_storage_tier: self.config.storage.target_tier.clone(),
        };

        let task = self
            .cloud
            .clone_volumes(&request)
            .await
            .context(SubmissionSnafu { stage, attempts: 1u32 })?;
        let task_id = task.id.context(DataShapeSnafu {
            stage,
            message: "clone response carried no cloneTaskID",
        })?;
        tracing::info!(task = %task_id, volumes = source.len(), "clone submitted");
        state.record_clone_task(task_id.clone());
        let task_id = &task_id;

        poll_until(
            polling.clone_task(),
            &format!("clone task {task_id}"),
            || self.cloud.get_clone_task(task_id),
            |task| Observation::from_status(&task.status, TASK_COMPLETED, TASK_FAILED),
        )
        .await
        .map_err(|e| ProvisionError::from_poll(stage, e))?;

        let result = submit_with_retry(
            "clone task result",
            polling.submit_attempts,
            polling.submit_retry_delay,
            || self.cloud.get_clone_task(task_id),
        )
        .await
        .map_err(|e| submission(stage, e))?;

        match partition_clones(&source, &result.cloned_volumes) {
            Ok(clones) => {
                tracing::info!(boot = %clones.boot, data = clones.data.len(), "volumes cloned");
                state.record_cloned_volumes(clones);
                Ok(())
            }
            Err(e) => {
                // The clones exist even if they don't match; keep them deletable.
                state.record_unpartitioned_clones(
                    result.cloned_volumes.into_iter().map(|c| c.clone),
                );
                Err(ProvisionError::from_shape(stage, e))
            }
        }
    }

    async fn verify_volumes_available(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let stage = Stage::VerifyVolumesAvailable;
        let clones = state.cloned_volumes().cloned().context(FaultSnafu {
            stage,
            message: "cloned volumes not recorded",
        })?;

        for id in clones.all().iter() {
            poll_until(
                self.config.polling.volume(),
                &format!("volume {id}"),
                || self.cloud.get_volume(id),
                |volume| Observation::from_status(&volume.state, AVAILABLE, ERRORED),
            )
            .await
            .map_err(|e| ProvisionError::from_poll(stage, e))?;
        }

        Ok(())
    }

    async fn attach_volumes(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let stage = Stage::AttachVolumes;
        let polling = &self.config.polling;
        let instance = state.instance_id().cloned().context(FaultSnafu {
            stage,
            message: "instance id not recorded",
        })?;
        let clones = state.cloned_volumes().cloned().context(FaultSnafu {
            stage,
            message: "cloned volumes not recorded",
        })?;
        let instance = &instance;

        self.cloud
            .attach_volumes(instance, &clones.boot, &clones.data)
            .await
            .context(SubmissionSnafu { stage, attempts: 1u32 })?;

        if !polling.attach_settle.is_zero() {
            tokio::time::sleep(polling.attach_settle).await;
        }

        let expected = clones.all();
        poll_until(
            polling.attach(),
            "volume attachment",
            || self.cloud.list_instance_volumes(instance),
            |attached| {
                let present = expected.iter().filter(|id| attached.contains(id)).count();
                if present == expected.len() {
                    Observation::Done
                } else {
                    Observation::Pending(format!("{present}/{} attached", expected.len()))
                }
            },
        )
        .await
        .map_err(|e| ProvisionError::from_poll(stage, e))?;

        tracing::info!(instance = %instance, volumes = expected.len(), "volumes attached");
        Ok(())
    }

    async fn boot_instance(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let stage = Stage::BootInstance;
        let instance = state.instance_id().cloned().context(FaultSnafu {
            stage,
            message: "instance id not recorded",
        })?;
        let instance = &instance;

        let polling = &self.config.polling;
        let current = submit_with_retry(
            "instance detail",
            polling.submit_attempts,
            polling.submit_retry_delay,
            || self.cloud.get_instance(instance),
        )
        .await
        .map_err(|e| submission(stage, e))?;

        if current.status.eq_ignore_ascii_case("ACTIVE") {
            tracing::info!(instance = %instance, "instance already active, skipping start");
        } else {
            self.cloud
                .configure_boot_mode(instance, &self.config.boot)
                .await
                .context(SubmissionSnafu { stage, attempts: 1u32 })?;
            self.cloud
                .start_instance(instance)
                .await
                .context(SubmissionSnafu { stage, attempts: 1u32 })?;

            poll_until(
                self.config.polling.boot(),
                &format!("instance {instance}"),
                || self.cloud.get_instance(instance),
                |detail| Observation::from_status(&detail.status, INSTANCE_ACTIVE, INSTANCE_FAILED),
            )
            .await
            .map_err(|e| ProvisionError::from_poll(stage, e))?;
        }

        state.mark_success();
        Ok(())
    }
}

fn submission(stage: Stage, e: Exhausted) -> ProvisionError {
    ProvisionError::Submission {
        stage,
        attempts: e.attempts,
        source: e.source,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}
