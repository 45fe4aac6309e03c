// ABOUTME: Structured summary of a successful provisioning run.
// ABOUTME: Lists every resource id the run created or attached.

use serde::Serialize;

use super::state::RunState;
use crate::config::Config;
use crate::types::{CloneTaskId, InstanceId, InstanceName, SnapshotId, VolumeId};

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionSummary {
    pub run_id: String,
    pub instance_name: InstanceName,
    pub instance_id: Option<InstanceId>,
    pub source_instance: String,
    pub snapshot_id: Option<SnapshotId>,
    pub clone_task_id: Option<CloneTaskId>,
    pub source_boot_volume: Option<VolumeId>,
    pub source_data_volumes: Vec<VolumeId>,
    pub cloned_boot_volume: Option<VolumeId>,
    pub cloned_data_volumes: Vec<VolumeId>,
}

impl ProvisionSummary {
    pub fn from_state(config: &Config, state: &RunState) -> Self {
        let source = state.source_volumes();
        let clones = state.cloned_volumes();
        Self {
            run_id: state.run_id().to_string(),
            instance_name: config.instance.name.clone(),
            instance_id: state.instance_id().cloned(),
            source_instance: config.primary_instance.clone(),
            snapshot_id: state.snapshot_id().cloned(),
            clone_task_id: state.clone_task_id().cloned(),
            source_boot_volume: source.map(|s| s.boot.clone()),
            source_data_volumes: source.map(|s| s.data.clone()).unwrap_or_default(),
            cloned_boot_volume: clones.map(|c| c.boot.clone()),
            cloned_data_volumes: clones.map(|c| c.data.clone()).unwrap_or_default(),
        }
    }

    /// Human-readable `key: value` lines, in a stable order.
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
        }
        fn list(v: &[VolumeId]) -> String {
            if v.is_empty() {
                "-".to_string()
            } else {
                v.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
            }
        }

        vec![
            ("instance", format!("{} ({})", self.instance_name, opt(&self.instance_id))),
            ("source instance", self.source_instance.clone()),
            ("snapshot", opt(&self.snapshot_id)),
            ("clone task", opt(&self.clone_task_id)),
            ("boot volume", opt(&self.cloned_boot_volume)),
            ("data volumes", list(&self.cloned_data_volumes)),
        ]
    }
}
