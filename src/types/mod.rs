// ABOUTME: Type-safe identifiers and validated names for cloud resources.
// ABOUTME: Keeps instance, snapshot, volume, and clone-task ids from being mixed up.

mod id;
mod instance_name;

pub use id::{CloneTaskId, Id, InstanceId, SnapshotId, VolumeId};
pub use instance_name::{InstanceName, InstanceNameError};
