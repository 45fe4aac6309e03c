// ABOUTME: Boot/data partitioning of snapshot and clone volume sets.
// ABOUTME: Exactly one boot volume, and every source data volume maps to exactly one clone.

use nonempty::NonEmpty;
use serde::Serialize;
use std::collections::HashSet;

use crate::cloud::{ClonedVolume, SnapshotVolume};
use crate::types::VolumeId;

/// A volume set split into its single boot volume and any data volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeSet {
    pub boot: VolumeId,
    pub data: Vec<VolumeId>,
}

impl VolumeSet {
    pub fn new(boot: VolumeId, data: Vec<VolumeId>) -> Self {
        Self { boot, data }
    }

    /// Boot first, then data volumes in order.
    pub fn all(&self) -> NonEmpty<VolumeId> {
        NonEmpty {
            head: self.boot.clone(),
            tail: self.data.clone(),
        }
    }

    pub fn len(&self) -> usize {
        1 + self.data.len()
    }

    pub fn contains(&self, id: &VolumeId) -> bool {
        &self.boot == id || self.data.contains(id)
    }
}

/// Response content that breaks the expected volume contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("no volumes found")]
    NoVolumes,

    #[error("no bootable volume found")]
    NoBootVolume,

    #[error("expected exactly one bootable volume, found {0}")]
    MultipleBootVolumes(usize),

    #[error("clone record references unknown source volume {0}")]
    UnknownSource(VolumeId),

    #[error("source volume {0} was cloned more than once")]
    DuplicateSource(VolumeId),

    #[error("expected {expected} data volume clone(s), found {found}")]
    DataCountMismatch { expected: usize, found: usize },
}

/// Split snapshot volumes by their bootable flag.
pub fn partition_snapshot_volumes(volumes: &[SnapshotVolume]) -> Result<VolumeSet, ShapeError> {
    if volumes.is_empty() {
        return Err(ShapeError::NoVolumes);
    }

    let (boot, data): (Vec<_>, Vec<_>) = volumes.iter().partition(|v| v.bootable);

    match boot.as_slice() {
        [] => Err(ShapeError::NoBootVolume),
        [only] => Ok(VolumeSet::new(
            only.id.clone(),
            data.into_iter().map(|v| v.id.clone()).collect(),
        )),
        many => Err(ShapeError::MultipleBootVolumes(many.len())),
    }
}

/// Map clone records onto the source partition.
///
/// The clone whose source is the source boot volume becomes the boot clone.
/// Data clones come back in the order of the source data volumes.
pub fn partition_clones(
    source: &VolumeSet,
    clones: &[ClonedVolume],
) -> Result<VolumeSet, ShapeError> {
    if clones.is_empty() {
        return Err(ShapeError::NoVolumes);
    }

    let mut seen = HashSet::new();
    for record in clones {
        if !source.contains(&record.source) {
            return Err(ShapeError::UnknownSource(record.source.clone()));
        }
        if !seen.insert(&record.source) {
            return Err(ShapeError::DuplicateSource(record.source.clone()));
        }
    }

    let boot = clones
        .iter()
        .find(|c| c.source == source.boot)
        .map(|c| c.clone.clone())
        .ok_or(ShapeError::NoBootVolume)?;

    let data: Vec<VolumeId> = source
        .data
        .iter()
        .filter_map(|src| clones.iter().find(|c| &c.source == src))
        .map(|c| c.clone.clone())
        .collect();

    if data.len() != source.data.len() {
        return Err(ShapeError::DataCountMismatch {
            expected: source.data.len(),
            found: data.len(),
        });
    }

    Ok(VolumeSet::new(boot, data))
}
