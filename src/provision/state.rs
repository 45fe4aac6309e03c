// ABOUTME: Mutable record of what this run has created or observed.
// ABOUTME: Written by the provisioner, read by the rollback coordinator; never persisted.

use serde::Serialize;

use super::stage::{Resource, Stage};
use super::volumes::VolumeSet;
use crate::types::{CloneTaskId, InstanceId, SnapshotId, VolumeId};

/// State of one provisioning run.
///
/// Identifiers are write-once: a second `record_*` call for the same slot is
/// ignored, so an id that rollback may target cannot be silently replaced.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    run_id: String,
    current_stage: Stage,
    secondary_instance_id: Option<InstanceId>,
    snapshot_id: Option<SnapshotId>,
    source_volumes: Option<VolumeSet>,
    clone_task_id: Option<CloneTaskId>,
    cloned_volumes: Option<VolumeSet>,
    /// Clones the task produced that could not be partitioned.
    unpartitioned_clones: Vec<VolumeId>,
    success: bool,
}

impl RunState {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            current_stage: Stage::first(),
            secondary_instance_id: None,
            snapshot_id: None,
            source_volumes: None,
            clone_task_id: None,
            cloned_volumes: None,
            unpartitioned_clones: Vec::new(),
            success: false,
        }
    }

    /// Unique suffix for names created by this run, derived from the start time.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    /// Move to `stage`. Earlier stages are ignored; the stage never rewinds.
    pub fn enter(&mut self, stage: Stage) {
        if stage < self.current_stage {
            tracing::warn!(
                "ignoring attempt to rewind from {} to {}",
                self.current_stage,
                stage
            );
            return;
        }
        self.current_stage = stage;
    }

    /// Whether `resource` could have been created by the stages entered so far.
    pub fn may_exist(&self, resource: Resource) -> bool {
        resource.may_exist_at(self.current_stage)
    }

    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.secondary_instance_id.as_ref()
    }

    pub fn snapshot_id(&self) -> Option<&SnapshotId> {
        self.snapshot_id.as_ref()
    }

    pub fn source_volumes(&self) -> Option<&VolumeSet> {
        self.source_volumes.as_ref()
    }

    pub fn clone_task_id(&self) -> Option<&CloneTaskId> {
        self.clone_task_id.as_ref()
    }

    pub fn cloned_volumes(&self) -> Option<&VolumeSet> {
        self.cloned_volumes.as_ref()
    }

    pub fn unpartitioned_clones(&self) -> &[VolumeId] {
        &self.unpartitioned_clones
    }

    /// Every cloned volume id rollback may delete: boot, data, then unpartitioned.
    pub fn deletable_clones(&self) -> Vec<VolumeId> {
        let mut ids: Vec<VolumeId> = self
            .cloned_volumes
            .iter()
            .flat_map(|set| set.all())
            .collect();
        for id in &self.unpartitioned_clones {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn record_instance(&mut self, id: InstanceId) {
        record_once(&mut self.secondary_instance_id, id, "instance");
    }

    pub fn record_snapshot(&mut self, id: SnapshotId) {
        record_once(&mut self.snapshot_id, id, "snapshot");
    }

    pub fn record_source_volumes(&mut self, volumes: VolumeSet) {
        record_once(&mut self.source_volumes, volumes, "source volumes");
    }

    pub fn record_clone_task(&mut self, id: CloneTaskId) {
        record_once(&mut self.clone_task_id, id, "clone task");
    }

    pub fn record_cloned_volumes(&mut self, volumes: VolumeSet) {
        record_once(&mut self.cloned_volumes, volumes, "cloned volumes");
    }

    pub fn record_unpartitioned_clones(&mut self, ids: impl IntoIterator<Item = VolumeId>) {
        self.unpartitioned_clones.extend(ids);
    }

    /// Only the final stage calls this, once the instance is active.
    pub fn mark_success(&mut self) {
        self.success = true;
    }
}

fn record_once<T: std::fmt::Debug>(slot: &mut Option<T>, value: T, what: &str) {
    match slot {
        Some(existing) => {
            tracing::warn!(
                "{} already recorded as {:?}; ignoring {:?}",
                what,
                existing,
                value
            );
        }
        None => *slot = Some(value),
    }
}
