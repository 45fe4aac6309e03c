// ABOUTME: Test support utilities.
// ABOUTME: Provides a scripted in-memory control plane that records every call.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Once;

use async_trait::async_trait;
use lparclone::cloud::{
    CloneRequest, CloneTask, CloneTaskRef, ClonedVolume, CloudError, ControlPlane,
    CreateInstanceRequest, CreateInstanceResponse, InstanceDetail, InstanceRef, SnapshotDetail,
    SnapshotRef, SnapshotVolume, VolumeDetail,
};
use lparclone::config::{BootConfig, Config};
use lparclone::types::{CloneTaskId, InstanceId, InstanceName, SnapshotId, VolumeId};
use parking_lot::{Mutex, MutexGuard};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("lparclone=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Template config with rollback of the instance left at its default (off).
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config::template()
}

/// Values handed out one per call; the last one repeats forever.
#[derive(Debug, Clone)]
pub struct Sequence<T: Clone> {
    items: VecDeque<T>,
}

impl<T: Clone> Sequence<T> {
    pub fn of(items: impl IntoIterator<Item = T>) -> Self {
        let items: VecDeque<T> = items.into_iter().collect();
        assert!(!items.is_empty(), "sequence needs at least one item");
        Self { items }
    }

    pub fn next(&mut self) -> T {
        if self.items.len() > 1 {
            self.items.pop_front().unwrap()
        } else {
            self.items[0].clone()
        }
    }
}

fn statuses(items: &[&str]) -> Sequence<String> {
    Sequence::of(items.iter().map(|s| s.to_string()))
}

/// One recorded control-plane call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Call {
    Authenticate,
    CreateInstance(String),
    GetInstance(String),
    FindInstanceByName(String),
    DeleteInstance(String),
    CreateSnapshot { instance: String, name: String },
    GetSnapshot(String),
    CloneVolumes { name: String, volumes: Vec<String> },
    GetCloneTask(String),
    GetVolume(String),
    AttachVolumes { instance: String, boot: String, data: Vec<String> },
    ListInstanceVolumes(String),
    DetachAllVolumes(String),
    DeleteVolumes(Vec<String>),
    ConfigureBootMode(String),
    StartInstance(String),
}

impl Call {
    pub fn is_delete(&self) -> bool {
        matches!(self, Call::DeleteVolumes(_) | Call::DeleteInstance(_))
    }

    /// Every id this call names as an argument.
    pub fn ids(&self) -> Vec<String> {
        match self {
            Call::Authenticate | Call::CreateInstance(_) => vec![],
            Call::GetInstance(id)
            | Call::FindInstanceByName(id)
            | Call::DeleteInstance(id)
            | Call::GetSnapshot(id)
            | Call::GetCloneTask(id)
            | Call::GetVolume(id)
            | Call::ListInstanceVolumes(id)
            | Call::DetachAllVolumes(id)
            | Call::ConfigureBootMode(id)
            | Call::StartInstance(id) => vec![id.clone()],
            Call::CreateSnapshot { instance, .. } => vec![instance.clone()],
            Call::CloneVolumes { volumes, .. } => volumes.clone(),
            Call::AttachVolumes {
                instance,
                boot,
                data,
            } => {
                let mut ids = vec![instance.clone(), boot.clone()];
                ids.extend(data.iter().cloned());
                ids
            }
            Call::DeleteVolumes(ids) => ids.clone(),
        }
    }
}

/// What the fake answers. Tests mutate this through `FakeCloud::script`.
#[allow(dead_code)]
pub struct Script {
    pub authenticate: Result<(), CloudError>,
    /// Consumed front to back; once empty, answers with `i-1`.
    pub create_responses: VecDeque<Result<CreateInstanceResponse, CloudError>>,
    /// Instance status before `start_instance` is called.
    pub instance_statuses: Sequence<String>,
    /// Instance status after `start_instance` is called.
    pub boot_statuses: Sequence<String>,
    pub instance_by_name: Option<InstanceId>,
    pub find_by_name_error: Option<CloudError>,
    pub snapshot_response: Result<SnapshotRef, CloudError>,
    pub snapshot_statuses: Sequence<String>,
    pub snapshot_volumes: Vec<SnapshotVolume>,
    pub clone_response: Result<CloneTaskRef, CloudError>,
    pub clone_statuses: Sequence<String>,
    pub cloned_volumes: Vec<ClonedVolume>,
    /// Per-volume state sequences; unlisted volumes are `available`.
    pub volume_states: HashMap<String, Sequence<String>>,
    pub attach_error: Option<CloudError>,
    /// Consumed by `get_instance` calls made after a successful attach.
    pub instance_errors_after_attach: VecDeque<CloudError>,
    pub list_volumes_error: Option<CloudError>,
    /// Attached volumes that never show up in the instance volume list.
    pub hidden_after_attach: HashSet<String>,
    /// Volumes attached before the run (e.g. left by an earlier attempt).
    pub attached: Vec<VolumeId>,
    /// Detach requests succeed but the volumes stay attached.
    pub detach_sticks: bool,
    pub delete_error: Option<CloudError>,
    /// Volumes that still answer `get_volume` after a successful delete.
    pub survive_delete: HashSet<String>,
    pub panic_on_snapshot: bool,
    deleted: HashSet<String>,
    started: bool,
    attach_accepted: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            authenticate: Ok(()),
            create_responses: VecDeque::new(),
            instance_statuses: statuses(&["SHUTOFF"]),
            boot_statuses: statuses(&["ACTIVE"]),
            instance_by_name: None,
            find_by_name_error: None,
            snapshot_response: Ok(SnapshotRef {
                id: Some(SnapshotId::new("s-1")),
            }),
            snapshot_statuses: statuses(&["available"]),
            snapshot_volumes: vec![
                SnapshotVolume {
                    id: VolumeId::new("src-data"),
                    bootable: false,
                },
                SnapshotVolume {
                    id: VolumeId::new("src-boot"),
                    bootable: true,
                },
            ],
            clone_response: Ok(CloneTaskRef {
                id: Some(CloneTaskId::new("t-1")),
            }),
            clone_statuses: statuses(&["completed"]),
            cloned_volumes: vec![
                ClonedVolume {
                    source: VolumeId::new("src-boot"),
                    clone: VolumeId::new("c-boot"),
                },
                ClonedVolume {
                    source: VolumeId::new("src-data"),
                    clone: VolumeId::new("c-data"),
                },
            ],
            volume_states: HashMap::new(),
            attach_error: None,
            instance_errors_after_attach: VecDeque::new(),
            list_volumes_error: None,
            hidden_after_attach: HashSet::new(),
            attached: Vec::new(),
            detach_sticks: false,
            delete_error: None,
            survive_delete: HashSet::new(),
            panic_on_snapshot: false,
            deleted: HashSet::new(),
            started: false,
            attach_accepted: false,
        }
    }
}

/// In-memory control plane driven by a `Script`.
#[derive(Default)]
pub struct FakeCloud {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

#[allow(dead_code)]
impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Ids passed to any delete call, in order.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.is_delete())
            .flat_map(|c| c.ids())
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

fn not_found(what: &str) -> CloudError {
    CloudError::NotFound(what.to_string())
}

#[async_trait]
impl ControlPlane for FakeCloud {
    async fn authenticate(&self) -> Result<(), CloudError> {
        self.record(Call::Authenticate);
        self.script().authenticate.clone()
    }

    async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<CreateInstanceResponse, CloudError> {
        self.record(Call::CreateInstance(request.server_name.clone()));
        self.script().create_responses.pop_front().unwrap_or_else(|| {
            Ok(CreateInstanceResponse::List(vec![InstanceRef {
                id: Some(InstanceId::new("i-1")),
                server_name: Some(request.server_name.clone()),
            }]))
        })
    }

    async fn get_instance(&self, id: &InstanceId) -> Result<InstanceDetail, CloudError> {
        self.record(Call::GetInstance(id.to_string()));
        let mut script = self.script();
        if script.attach_accepted
            && let Some(e) = script.instance_errors_after_attach.pop_front()
        {
            return Err(e);
        }
        let status = if script.started {
            script.boot_statuses.next()
        } else {
            script.instance_statuses.next()
        };
        Ok(InstanceDetail {
            id: Some(id.clone()),
            server_name: None,
            status,
        })
    }

    async fn find_instance_by_name(
        &self,
        name: &InstanceName,
    ) -> Result<Option<InstanceId>, CloudError> {
        self.record(Call::FindInstanceByName(name.to_string()));
        let script = self.script();
        match &script.find_by_name_error {
            Some(e) => Err(e.clone()),
            None => Ok(script.instance_by_name.clone()),
        }
    }

    async fn delete_instance(&self, id: &InstanceId) -> Result<(), CloudError> {
        self.record(Call::DeleteInstance(id.to_string()));
        Ok(())
    }

    async fn create_snapshot(&self, instance: &str, name: &str) -> Result<SnapshotRef, CloudError> {
        self.record(Call::CreateSnapshot {
            instance: instance.to_string(),
            name: name.to_string(),
        });
        let script = self.script();
        if script.panic_on_snapshot {
            drop(script);
            panic!("snapshot handler exploded");
        }
        script.snapshot_response.clone()
    }

    async fn get_snapshot(&self, id: &SnapshotId) -> Result<SnapshotDetail, CloudError> {
        self.record(Call::GetSnapshot(id.to_string()));
        let mut script = self.script();
        let status = script.snapshot_statuses.next();
        let volumes = if status.eq_ignore_ascii_case("available") {
            script.snapshot_volumes.clone()
        } else {
            Vec::new()
        };
        Ok(SnapshotDetail { status, volumes })
    }

    async fn clone_volumes(&self, request: &CloneRequest) -> Result<CloneTaskRef, CloudError> {
        self.record(Call::CloneVolumes {
            name: request.name.clone(),
            volumes: request.volume_ids.iter().map(|v| v.to_string()).collect(),
        });
        self.script().clone_response.clone()
    }

    async fn get_clone_task(&self, id: &CloneTaskId) -> Result<CloneTask, CloudError> {
        self.record(Call::GetCloneTask(id.to_string()));
        let mut script = self.script();
        let status = script.clone_statuses.next();
        let cloned_volumes = if status.eq_ignore_ascii_case("completed") {
            script.cloned_volumes.clone()
        } else {
            Vec::new()
        };
        Ok(CloneTask {
            status,
            cloned_volumes,
        })
    }

    async fn get_volume(&self, id: &VolumeId) -> Result<VolumeDetail, CloudError> {
        self.record(Call::GetVolume(id.to_string()));
        let mut script = self.script();
        if script.deleted.contains(id.as_str()) && !script.survive_delete.contains(id.as_str()) {
            return Err(not_found(id.as_str()));
        }
        let state = script
            .volume_states
            .get_mut(id.as_str())
            .map(|s| s.next())
            .unwrap_or_else(|| "available".to_string());
        Ok(VolumeDetail {
            id: id.clone(),
            name: None,
            state,
            bootable: false,
        })
    }

    async fn attach_volumes(
        &self,
        instance: &InstanceId,
        boot: &VolumeId,
        data: &[VolumeId],
    ) -> Result<(), CloudError> {
        self.record(Call::AttachVolumes {
            instance: instance.to_string(),
            boot: boot.to_string(),
            data: data.iter().map(|v| v.to_string()).collect(),
        });
        let mut script = self.script();
        if let Some(e) = &script.attach_error {
            return Err(e.clone());
        }
        let mut attached = vec![boot.clone()];
        attached.extend(data.iter().cloned());
        script.attached.extend(attached);
        script.attach_accepted = true;
        Ok(())
    }

    async fn list_instance_volumes(
        &self,
        instance: &InstanceId,
    ) -> Result<Vec<VolumeId>, CloudError> {
        self.record(Call::ListInstanceVolumes(instance.to_string()));
        let script = self.script();
        if let Some(e) = &script.list_volumes_error {
            return Err(e.clone());
        }
        Ok(script
            .attached
            .iter()
            .filter(|v| !script.hidden_after_attach.contains(v.as_str()))
            .cloned()
            .collect())
    }

    async fn detach_all_volumes(&self, instance: &InstanceId) -> Result<(), CloudError> {
        self.record(Call::DetachAllVolumes(instance.to_string()));
        let mut script = self.script();
        if !script.detach_sticks {
            script.attached.clear();
        }
        Ok(())
    }

    async fn delete_volumes(&self, ids: &[VolumeId]) -> Result<(), CloudError> {
        self.record(Call::DeleteVolumes(
            ids.iter().map(|v| v.to_string()).collect(),
        ));
        let mut script = self.script();
        if let Some(e) = &script.delete_error {
            return Err(e.clone());
        }
        script
            .deleted
            .extend(ids.iter().map(|v| v.as_str().to_string()));
        Ok(())
    }

    async fn configure_boot_mode(
        &self,
        instance: &InstanceId,
        _boot: &BootConfig,
    ) -> Result<(), CloudError> {
        self.record(Call::ConfigureBootMode(instance.to_string()));
        Ok(())
    }

    async fn start_instance(&self, instance: &InstanceId) -> Result<(), CloudError> {
        self.record(Call::StartInstance(instance.to_string()));
        self.script().started = true;
        Ok(())
    }
}
