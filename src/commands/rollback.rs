// ABOUTME: Rollback command implementation.
// ABOUTME: Runs the rollback coordinator for resources left behind by an interrupted run.

use lparclone::cloud::{ControlPlane, PowerVsClient};
use lparclone::config::Config;
use lparclone::error::{Error, Result};
use lparclone::output::Output;
use lparclone::provision::{RollbackCoordinator, RunState, Stage, VolumeSet};
use lparclone::types::{InstanceId, VolumeId};

/// Resources named on the command line.
pub struct RollbackTarget {
    pub instance_id: Option<String>,
    pub boot_volume: Option<String>,
    pub data_volumes: Vec<String>,
}

impl RollbackTarget {
    /// A run state as if every stage had been reached, holding only the given ids.
    fn into_state(self) -> RunState {
        let run_id = format!("manual-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"));
        let mut state = RunState::new(run_id);
        state.enter(Stage::BootInstance);

        if let Some(id) = self.instance_id {
            state.record_instance(InstanceId::new(id));
        }

        let data: Vec<VolumeId> = self.data_volumes.into_iter().map(VolumeId::new).collect();
        match self.boot_volume {
            Some(boot) => state.record_cloned_volumes(VolumeSet::new(VolumeId::new(boot), data)),
            None => state.record_unpartitioned_clones(data),
        }

        state
    }
}

pub async fn rollback(config: Config, target: RollbackTarget, mut output: Output) -> Result<()> {
    output.start_timer();
    let client = PowerVsClient::from_config(&config)?;
    client.authenticate().await?;

    output.progress(&format!("Rolling back {}", config.instance.name));

    let state = target.into_state();
    let report = RollbackCoordinator::new(&client, &config).run(&state).await;
    output.cleanup_report(&report);

    if !report.manual_review.is_empty() {
        return Err(Error::CleanupIncomplete(report.manual_review.len()));
    }

    output.success("Rollback complete!");
    Ok(())
}
