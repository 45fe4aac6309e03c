// ABOUTME: Staged provisioning with rollback of partially-created resources.
// ABOUTME: Provisioner drives stages, RunState records ids, RollbackCoordinator compensates.

mod error;
mod provisioner;
mod retry;
mod rollback;
mod stage;
mod state;
mod summary;
mod volumes;

pub use error::{ErrorKind, ProvisionError};
pub use provisioner::{Provisioner, RunFailure};
pub use retry::{Exhausted, submit_with_retry};
pub use rollback::{CleanupReport, RollbackCoordinator};
pub use stage::{Resource, Stage};
pub use state::RunState;
pub use summary::ProvisionSummary;
pub use volumes::{ShapeError, VolumeSet, partition_clones, partition_snapshot_volumes};
