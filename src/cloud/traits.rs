// ABOUTME: The ControlPlane trait consumed by the provisioner and rollback coordinator.
// ABOUTME: One method per remote operation; implementations own transport and auth.

use async_trait::async_trait;

use super::error::CloudError;
use super::models::{
    CloneRequest, CloneTask, CloneTaskRef, CreateInstanceRequest, CreateInstanceResponse,
    InstanceDetail, SnapshotDetail, SnapshotRef, VolumeDetail,
};
use crate::config::BootConfig;
use crate::types::{CloneTaskId, InstanceId, InstanceName, SnapshotId, VolumeId};

/// Operations against the remote platform.
///
/// Read operations must be safe to repeat. Mutating operations report success
/// or failure of the submission only; completion is observed by polling.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Exchange the configured credential for a bearer token.
    async fn authenticate(&self) -> Result<(), CloudError>;

    async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<CreateInstanceResponse, CloudError>;

    async fn get_instance(&self, id: &InstanceId) -> Result<InstanceDetail, CloudError>;

    /// Look up an instance by exact server name.
    async fn find_instance_by_name(
        &self,
        name: &InstanceName,
    ) -> Result<Option<InstanceId>, CloudError>;

    async fn delete_instance(&self, id: &InstanceId) -> Result<(), CloudError>;

    /// Snapshot the instance identified by `instance` (name or id).
    async fn create_snapshot(&self, instance: &str, name: &str)
    -> Result<SnapshotRef, CloudError>;

    async fn get_snapshot(&self, id: &SnapshotId) -> Result<SnapshotDetail, CloudError>;

    async fn clone_volumes(&self, request: &CloneRequest) -> Result<CloneTaskRef, CloudError>;

    async fn get_clone_task(&self, id: &CloneTaskId) -> Result<CloneTask, CloudError>;

    /// Fails with `CloudError::NotFound` once the volume is gone.
    async fn get_volume(&self, id: &VolumeId) -> Result<VolumeDetail, CloudError>;

    async fn attach_volumes(
        &self,
        instance: &InstanceId,
        boot: &VolumeId,
        data: &[VolumeId],
    ) -> Result<(), CloudError>;

    async fn list_instance_volumes(
        &self,
        instance: &InstanceId,
    ) -> Result<Vec<VolumeId>, CloudError>;

    /// Detach every volume, boot volume included.
    async fn detach_all_volumes(&self, instance: &InstanceId) -> Result<(), CloudError>;

    async fn delete_volumes(&self, ids: &[VolumeId]) -> Result<(), CloudError>;

    async fn configure_boot_mode(
        &self,
        instance: &InstanceId,
        boot: &BootConfig,
    ) -> Result<(), CloudError>;

    async fn start_instance(&self, instance: &InstanceId) -> Result<(), CloudError>;
}
