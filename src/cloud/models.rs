// ABOUTME: Request and response types for control-plane operations.
// ABOUTME: Responses keep identifier fields optional; stages decide when absence is fatal.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::types::{CloneTaskId, InstanceId, SnapshotId, VolumeId};

// =============================================================================
// Instances
// =============================================================================

/// Body of the instance-creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    pub server_name: String,
    pub memory: f64,
    pub processors: f64,
    pub proc_type: String,
    pub sys_type: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub networks: Vec<NetworkAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pair_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAttachment {
    #[serde(rename = "networkID")]
    pub network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl CreateInstanceRequest {
    pub fn from_config(config: &Config) -> Self {
        let spec = &config.instance;
        CreateInstanceRequest {
            server_name: spec.name.to_string(),
            memory: spec.memory,
            processors: spec.processors,
            proc_type: spec.proc_type.to_string(),
            sys_type: spec.sys_type.clone(),
            image_id: spec.image.clone(),
            networks: vec![NetworkAttachment {
                network_id: config.network.subnet.clone(),
                ip_address: config.network.ip_address.clone(),
            }],
            key_pair_name: config.network.key_pair.clone(),
            storage_type: spec.storage_type.clone(),
        }
    }
}

/// A reference to an instance as returned by create and list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InstanceRef {
    #[serde(rename = "pvmInstanceID", default)]
    pub id: Option<InstanceId>,
    #[serde(rename = "serverName", default)]
    pub server_name: Option<String>,
}

/// The shapes the instance-creation call is known to answer with.
///
/// Variant order matters for untagged matching: the wrapper must be tried
/// before the bare object, whose fields are all optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CreateInstanceResponse {
    /// `[{"pvmInstanceID": ...}]`: the first entry carrying an id wins.
    List(Vec<InstanceRef>),
    /// `{"pvmInstance": {"pvmInstanceID": ...}}`
    Wrapped {
        #[serde(rename = "pvmInstance")]
        pvm_instance: InstanceRef,
    },
    /// `{"pvmInstanceID": ...}`
    Single(InstanceRef),
}

impl CreateInstanceResponse {
    pub fn instance_id(&self) -> Option<&InstanceId> {
        match self {
            CreateInstanceResponse::List(items) => items.iter().find_map(|i| i.id.as_ref()),
            CreateInstanceResponse::Wrapped { pvm_instance } => pvm_instance.id.as_ref(),
            CreateInstanceResponse::Single(instance) => instance.id.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceDetail {
    #[serde(rename = "pvmInstanceID", default)]
    pub id: Option<InstanceId>,
    #[serde(rename = "serverName", default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct InstanceList {
    #[serde(rename = "pvmInstances", default)]
    pub instances: Vec<InstanceRef>,
}

// =============================================================================
// Snapshots
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SnapshotRef {
    #[serde(rename = "snapshotID", default)]
    pub id: Option<SnapshotId>,
}

/// Snapshot status together with the volumes it captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDetail {
    pub status: String,
    pub volumes: Vec<SnapshotVolume>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVolume {
    pub id: VolumeId,
    pub bootable: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SnapshotRecord {
    #[serde(default)]
    pub status: String,
    /// Source volume id -> snapshot volume id.
    #[serde(rename = "volumeSnapshots", default)]
    pub volume_snapshots: std::collections::BTreeMap<String, String>,
}

// =============================================================================
// Volumes and clones
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneRequest {
    pub name: String,
    #[serde(rename = "volumeIDs")]
    pub volume_ids: Vec<VolumeId>,
    #[serde(rename = "targetStorageTier")]
    pub target_storage_tier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CloneTaskRef {
    #[serde(rename = "cloneTaskID", default)]
    pub id: Option<CloneTaskId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CloneTask {
    #[serde(default)]
    pub status: String,
    #[serde(rename = "clonedVolumes", default)]
    pub cloned_volumes: Vec<ClonedVolume>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClonedVolume {
    #[serde(rename = "sourceVolumeID")]
    pub source: VolumeId,
    #[serde(rename = "clonedVolumeID")]
    pub clone: VolumeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VolumeDetail {
    #[serde(rename = "volumeID")]
    pub id: VolumeId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub bootable: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VolumeRefList {
    #[serde(default)]
    pub volumes: Vec<VolumeRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VolumeRef {
    #[serde(rename = "volumeID")]
    pub id: VolumeId,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AttachRequest<'a> {
    #[serde(rename = "bootVolumeID")]
    pub boot_volume_id: &'a VolumeId,
    #[serde(rename = "volumeIDs")]
    pub volume_ids: Vec<&'a VolumeId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DetachRequest {
    pub detach_all_volumes: bool,
    pub detach_primary_boot_volume: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BulkDeleteRequest<'a> {
    #[serde(rename = "volumeIDs")]
    pub volume_ids: &'a [VolumeId],
}
