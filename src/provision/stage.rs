// ABOUTME: The closed, strictly ordered list of provisioning stages.
// ABOUTME: Which resources may exist at failure time is a pure function of the stage reached.

use serde::Serialize;
use std::fmt;

/// One ordered unit of the provisioning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Authenticate,
    CreateInstance,
    WaitInstanceStopped,
    CreateSnapshot,
    WaitSnapshotAvailable,
    ExtractVolumes,
    CloneVolumes,
    VerifyVolumesAvailable,
    AttachVolumes,
    BootInstance,
}

impl Stage {
    /// Execution order. Derived `Ord` agrees with this list.
    pub const ORDER: [Stage; 10] = [
        Stage::Authenticate,
        Stage::CreateInstance,
        Stage::WaitInstanceStopped,
        Stage::CreateSnapshot,
        Stage::WaitSnapshotAvailable,
        Stage::ExtractVolumes,
        Stage::CloneVolumes,
        Stage::VerifyVolumesAvailable,
        Stage::AttachVolumes,
        Stage::BootInstance,
    ];

    pub fn first() -> Stage {
        Stage::ORDER[0]
    }

    /// The stage after this one, or `None` for the last.
    pub fn next(self) -> Option<Stage> {
        Stage::ORDER.get(self.position() + 1).copied()
    }

    /// 1-based position in the sequence.
    pub fn number(self) -> usize {
        self.position() + 1
    }

    fn position(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Authenticate => "authenticate",
            Stage::CreateInstance => "create-instance",
            Stage::WaitInstanceStopped => "wait-instance-stopped",
            Stage::CreateSnapshot => "create-snapshot",
            Stage::WaitSnapshotAvailable => "wait-snapshot-available",
            Stage::ExtractVolumes => "extract-volumes",
            Stage::CloneVolumes => "clone-volumes",
            Stage::VerifyVolumesAvailable => "verify-volumes-available",
            Stage::AttachVolumes => "attach-volumes",
            Stage::BootInstance => "boot-instance",
        }
    }

    /// Human-friendly progress line for this stage.
    pub fn description(self) -> &'static str {
        match self {
            Stage::Authenticate => "Authenticating",
            Stage::CreateInstance => "Creating instance",
            Stage::WaitInstanceStopped => "Waiting for instance to stop",
            Stage::CreateSnapshot => "Snapshotting primary instance",
            Stage::WaitSnapshotAvailable => "Waiting for snapshot",
            Stage::ExtractVolumes => "Reading snapshot volumes",
            Stage::CloneVolumes => "Cloning volumes",
            Stage::VerifyVolumesAvailable => "Waiting for cloned volumes",
            Stage::AttachVolumes => "Attaching volumes",
            Stage::BootInstance => "Booting instance",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resources a run may create or observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Instance,
    Snapshot,
    ClonedVolumes,
    Attachments,
}

impl Resource {
    /// The stage whose submission can first bring this resource into existence.
    pub fn created_at(self) -> Stage {
        match self {
            Resource::Instance => Stage::CreateInstance,
            Resource::Snapshot => Stage::CreateSnapshot,
            Resource::ClonedVolumes => Stage::CloneVolumes,
            Resource::Attachments => Stage::AttachVolumes,
        }
    }

    /// Whether this resource can exist once `reached` has been entered.
    pub fn may_exist_at(self, reached: Stage) -> bool {
        reached >= self.created_at()
    }
}
