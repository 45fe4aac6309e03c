// ABOUTME: Integration tests for the staged provisioner against a scripted control plane.
// ABOUTME: Covers end-to-end failure scenarios, stage ordering, and rollback triggering.

mod support;

use std::time::Duration;

use lparclone::cloud::{
    ClonedVolume, CloudError, CreateInstanceResponse, InstanceRef, SnapshotVolume,
};
use lparclone::provision::{ErrorKind, Provisioner, RunState, Stage, VolumeSet};
use lparclone::types::{InstanceId, VolumeId};
use parking_lot::Mutex;
use support::{Call, FakeCloud, Sequence, init_tracing, test_config};
use tokio::time::Instant;

const RUN_ID: &str = "20260101-000000";

fn stopped_at(calls: &[Call], pred: impl Fn(&Call) -> bool) -> usize {
    calls.iter().position(pred).unwrap_or(calls.len())
}

mod happy_path {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn full_run_records_every_id() {
        init_tracing();
        let cloud = FakeCloud::new();
        let config = test_config();

        let summary = Provisioner::new(&cloud, &config)
            .with_run_id(RUN_ID)
            .run()
            .await
            .expect("run succeeds");

        assert_eq!(summary.instance_id, Some(InstanceId::new("i-1")));
        assert_eq!(summary.snapshot_id.as_ref().map(|s| s.as_str()), Some("s-1"));
        assert_eq!(summary.source_boot_volume, Some(VolumeId::new("src-boot")));
        assert_eq!(summary.cloned_boot_volume, Some(VolumeId::new("c-boot")));
        assert_eq!(summary.cloned_data_volumes, vec![VolumeId::new("c-data")]);
        assert_eq!(cloud.deleted_ids(), Vec::<String>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn resources_are_named_after_the_run() {
        let cloud = FakeCloud::new();
        let config = test_config();

        Provisioner::new(&cloud, &config)
            .with_run_id(RUN_ID)
            .run()
            .await
            .unwrap();

        let calls = cloud.calls();
        assert!(calls.contains(&Call::CreateSnapshot {
            instance: "prod-lpar".to_string(),
            name: format!("lparclone-snap-{RUN_ID}"),
        }));
        assert!(calls.contains(&Call::CloneVolumes {
            name: format!("lparclone-clone-{RUN_ID}"),
            volumes: vec!["src-boot".to_string(), "src-data".to_string()],
        }));
        assert!(calls.contains(&Call::AttachVolumes {
            instance: "i-1".to_string(),
            boot: "c-boot".to_string(),
            data: vec!["c-data".to_string()],
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn stages_are_entered_in_order() {
        let cloud = FakeCloud::new();
        let config = test_config();
        let seen = Mutex::new(Vec::new());

        Provisioner::new(&cloud, &config)
            .on_stage(|stage| seen.lock().push(stage))
            .run()
            .await
            .unwrap();

        assert_eq!(seen.into_inner(), Stage::ORDER.to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_create_failure_is_resubmitted() {
        let cloud = FakeCloud::new();
        cloud
            .script()
            .create_responses
            .push_back(Err(CloudError::Transport("connection reset".to_string())));
        let config = test_config();

        Provisioner::new(&cloud, &config).run().await.unwrap();

        assert_eq!(cloud.count(|c| matches!(c, Call::CreateInstance(_))), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn create_response_shapes_all_yield_the_id() {
        for response in [
            CreateInstanceResponse::Single(InstanceRef {
                id: Some(InstanceId::new("i-7")),
                server_name: None,
            }),
            CreateInstanceResponse::Wrapped {
                pvm_instance: InstanceRef {
                    id: Some(InstanceId::new("i-7")),
                    server_name: None,
                },
            },
        ] {
            let cloud = FakeCloud::new();
            cloud.script().create_responses.push_back(Ok(response));
            let config = test_config();
            let mut state = RunState::new(RUN_ID);

            Provisioner::new(&cloud, &config)
                .execute(Stage::CreateInstance, &mut state)
                .await
                .unwrap();

            assert_eq!(state.instance_id(), Some(&InstanceId::new("i-7")));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_instance_read_before_boot_is_retried() {
        let cloud = FakeCloud::new();
        cloud
            .script()
            .instance_errors_after_attach
            .push_back(CloudError::Transport("connection reset".to_string()));
        let config = test_config();

        let summary = Provisioner::new(&cloud, &config)
            .run()
            .await
            .expect("run succeeds after one retry");

        assert_eq!(summary.instance_id, Some(InstanceId::new("i-1")));
        assert_eq!(cloud.count(|c| matches!(c, Call::StartInstance(_))), 1);
        assert_eq!(cloud.count(|c| c.is_delete()), 0);
    }
}

mod scenarios {
    use super::*;

    /// Create returns i-1 and the instance is already SHUTOFF on the first check.
    #[tokio::test(start_paused = true)]
    async fn a_instance_stopped_on_first_check() {
        let cloud = FakeCloud::new();
        let config = test_config();
        let provisioner = Provisioner::new(&cloud, &config);
        let mut state = RunState::new(RUN_ID);

        provisioner
            .execute(Stage::CreateInstance, &mut state)
            .await
            .unwrap();
        assert_eq!(state.instance_id(), Some(&InstanceId::new("i-1")));

        let start = Instant::now();
        provisioner
            .execute(Stage::WaitInstanceStopped, &mut state)
            .await
            .unwrap();

        assert_eq!(cloud.count(|c| matches!(c, Call::GetInstance(_))), 1);
        // Only the initial grace delay elapsed; no poll interval was slept.
        assert!(start.elapsed() < config.polling.instance_grace + config.polling.interval);
    }

    /// Snapshot goes to error: terminal failure at stage 5, snapshot preserved.
    #[tokio::test(start_paused = true)]
    async fn b_snapshot_error_preserves_snapshot() {
        init_tracing();
        let cloud = FakeCloud::new();
        cloud.script().snapshot_statuses = Sequence::of(["error".to_string()]);
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::TerminalFailure);
        assert_eq!(failure.error.stage(), Stage::WaitSnapshotAvailable);
        assert_eq!(failure.error.stage().number(), 5);
        assert_eq!(
            failure.report.preserved_snapshot.as_ref().map(|s| s.as_str()),
            Some("s-1")
        );
        assert!(!cloud.deleted_ids().contains(&"s-1".to_string()));
        assert_eq!(cloud.count(|c| matches!(c, Call::CloneVolumes { .. })), 0);
    }

    /// Clone task runs three times then fails: nothing cloned, nothing deleted.
    #[tokio::test(start_paused = true)]
    async fn c_clone_failure_deletes_nothing() {
        let cloud = FakeCloud::new();
        cloud.script().clone_statuses = Sequence::of(
            ["running", "running", "running", "failed"].map(String::from),
        );
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::TerminalFailure);
        assert_eq!(failure.error.stage(), Stage::CloneVolumes);
        assert!(failure.state.cloned_volumes().is_none());
        assert_eq!(cloud.count(|c| matches!(c, Call::GetCloneTask(_))), 4);
        assert_eq!(cloud.count(|c| matches!(c, Call::DeleteVolumes(_))), 0);
        assert!(failure.report.deleted_volumes.is_empty());
    }

    /// The data clone never shows up after attach: timeout, then detach and delete.
    #[tokio::test(start_paused = true)]
    async fn d_attach_timeout_detaches_and_deletes_clones() {
        init_tracing();
        let cloud = FakeCloud::new();
        cloud
            .script()
            .hidden_after_attach
            .insert("c-data".to_string());
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Timeout);
        assert_eq!(failure.error.stage(), Stage::AttachVolumes);

        let calls = cloud.calls();
        let detach_at = stopped_at(&calls, |c| matches!(c, Call::DetachAllVolumes(_)));
        let attach_checks = calls[..detach_at]
            .iter()
            .filter(|c| matches!(c, Call::ListInstanceVolumes(_)))
            .count();
        // One check is the rollback's own listing before it detaches.
        assert_eq!(attach_checks, 14 + 1);

        assert_eq!(cloud.count(|c| matches!(c, Call::DetachAllVolumes(_))), 1);
        assert_eq!(
            cloud.deleted_ids(),
            vec!["c-boot".to_string(), "c-data".to_string()]
        );
        assert_eq!(failure.report.confirmed_deleted.len(), 2);
        assert!(failure.report.manual_review.is_empty());
        assert!(!failure.state.is_success());
    }

    /// No attached volume ever shows in the listing: rollback still detaches first.
    #[tokio::test(start_paused = true)]
    async fn unlisted_attachments_are_detached_before_delete() {
        let cloud = FakeCloud::new();
        {
            let mut script = cloud.script();
            script.hidden_after_attach.insert("c-boot".to_string());
            script.hidden_after_attach.insert("c-data".to_string());
        }
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.stage(), Stage::AttachVolumes);
        assert_eq!(failure.error.kind(), ErrorKind::Timeout);

        let calls = cloud.calls();
        let detach_at = stopped_at(&calls, |c| matches!(c, Call::DetachAllVolumes(_)));
        let delete_at = stopped_at(&calls, |c| matches!(c, Call::DeleteVolumes(_)));
        assert!(detach_at < delete_at);
        assert_eq!(cloud.count(|c| matches!(c, Call::DetachAllVolumes(_))), 1);
        assert!(cloud.script().attached.is_empty());
        assert_eq!(failure.report.confirmed_deleted.len(), 2);
    }
}

mod failures {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn no_stage_runs_after_a_failure() {
        let cloud = FakeCloud::new();
        cloud.script().volume_states.insert(
            "c-data".to_string(),
            Sequence::of(["creating", "error"].map(String::from)),
        );
        let config = test_config();
        let seen = Mutex::new(Vec::new());

        let failure = Provisioner::new(&cloud, &config)
            .on_stage(|stage| seen.lock().push(stage))
            .run()
            .await
            .unwrap_err();

        assert_eq!(failure.error.stage(), Stage::VerifyVolumesAvailable);
        assert_eq!(seen.lock().last(), Some(&Stage::VerifyVolumesAvailable));
        assert_eq!(cloud.count(|c| matches!(c, Call::AttachVolumes { .. })), 0);
        assert_eq!(cloud.count(|c| matches!(c, Call::StartInstance(_))), 0);
        // Rollback ran exactly once.
        assert_eq!(cloud.count(|c| matches!(c, Call::DeleteVolumes(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn boot_timeout_rolls_back() {
        let cloud = FakeCloud::new();
        cloud.script().boot_statuses = Sequence::of(["BUILD".to_string()]);
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Timeout);
        assert_eq!(failure.error.stage(), Stage::BootInstance);
        assert!(!failure.state.is_success());
        assert_eq!(cloud.count(|c| matches!(c, Call::DetachAllVolumes(_))), 1);
        assert!(!cloud.deleted_ids().contains(&"s-1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_failure_skips_rollback_work() {
        let cloud = FakeCloud::new();
        cloud.script().authenticate = Err(CloudError::Auth("HTTP 400".to_string()));
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Submission);
        assert_eq!(failure.error.stage(), Stage::Authenticate);
        assert!(failure.report.skipped);
        assert_eq!(cloud.calls(), vec![Call::Authenticate]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_instance_id_resolves_by_name() {
        let cloud = FakeCloud::new();
        cloud
            .script()
            .create_responses
            .push_back(Ok(CreateInstanceResponse::Single(InstanceRef::default())));
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::DataShape);
        assert_eq!(failure.error.stage(), Stage::CreateInstance);
        assert_eq!(
            cloud.count(|c| *c == Call::FindInstanceByName("prod-lpar-clone".to_string())),
            1
        );
        // Nothing found by name: no detach, no delete, no crash.
        assert!(failure.report.instance.is_none());
        assert_eq!(cloud.count(|c| matches!(c, Call::ListInstanceVolumes(_))), 0);
        assert_eq!(cloud.count(|c| c.is_delete()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_create_error_is_not_resubmitted() {
        let cloud = FakeCloud::new();
        {
            let mut script = cloud.script();
            script.create_responses.push_back(Err(CloudError::Http {
                method: "POST".to_string(),
                path: "/pvm-instances".to_string(),
                status: 400,
                body: "invalid image".to_string(),
            }));
            script.instance_by_name = Some(InstanceId::new("i-9"));
        }
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Submission);
        assert_eq!(cloud.count(|c| matches!(c, Call::CreateInstance(_))), 1);
        assert!(failure.report.resolved_by_name);
        assert_eq!(failure.report.instance, Some(InstanceId::new("i-9")));
    }

    #[tokio::test(start_paused = true)]
    async fn two_boot_volumes_is_a_data_shape_error() {
        let cloud = FakeCloud::new();
        cloud.script().snapshot_volumes = vec![
            SnapshotVolume {
                id: VolumeId::new("a"),
                bootable: true,
            },
            SnapshotVolume {
                id: VolumeId::new("b"),
                bootable: true,
            },
        ];
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::DataShape);
        assert_eq!(failure.error.stage(), Stage::ExtractVolumes);
        assert_eq!(cloud.count(|c| matches!(c, Call::CloneVolumes { .. })), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unmatched_clones_are_still_deleted() {
        let cloud = FakeCloud::new();
        cloud.script().cloned_volumes = vec![ClonedVolume {
            source: VolumeId::new("src-boot"),
            clone: VolumeId::new("c-boot"),
        }];
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::DataShape);
        assert_eq!(failure.error.stage(), Stage::CloneVolumes);
        assert_eq!(cloud.deleted_ids(), vec!["c-boot".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_in_a_stage_still_rolls_back() {
        let cloud = FakeCloud::new();
        cloud.script().panic_on_snapshot = true;
        let config = test_config();

        let failure = Provisioner::new(&cloud, &config).run().await.unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Fault);
        assert_eq!(failure.error.stage(), Stage::CreateSnapshot);
        assert!(failure.error.to_string().contains("snapshot handler exploded"));
        assert_eq!(failure.report.instance, Some(InstanceId::new("i-1")));
        // Nothing attached yet: one listing, the detach, one confirming check.
        assert_eq!(cloud.count(|c| matches!(c, Call::ListInstanceVolumes(_))), 2);
        assert_eq!(cloud.count(|c| matches!(c, Call::DetachAllVolumes(_))), 1);
    }
}

mod stages {
    use super::*;

    fn state_with_clones() -> RunState {
        let mut state = RunState::new(RUN_ID);
        state.enter(Stage::CloneVolumes);
        state.record_instance(InstanceId::new("i-1"));
        state.record_cloned_volumes(VolumeSet::new(
            VolumeId::new("c-boot"),
            vec![VolumeId::new("c-data")],
        ));
        state
    }

    #[tokio::test(start_paused = true)]
    async fn verify_returns_immediately_when_available() {
        let cloud = FakeCloud::new();
        let config = test_config();
        let mut state = state_with_clones();

        let start = Instant::now();
        Provisioner::new(&cloud, &config)
            .execute(Stage::VerifyVolumesAvailable, &mut state)
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(
            cloud.calls(),
            vec![
                Call::GetVolume("c-boot".to_string()),
                Call::GetVolume("c-data".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn verify_is_bounded() {
        let cloud = FakeCloud::new();
        cloud
            .script()
            .volume_states
            .insert("c-boot".to_string(), Sequence::of(["creating".to_string()]));
        let config = test_config();
        let mut state = state_with_clones();

        let err = Provisioner::new(&cloud, &config)
            .execute(Stage::VerifyVolumesAvailable, &mut state)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(
            cloud.count(|c| matches!(c, Call::GetVolume(_))) as u32,
            config.polling.volume().max_attempts
        );
    }

    #[tokio::test(start_paused = true)]
    async fn boot_skips_start_when_already_active() {
        let cloud = FakeCloud::new();
        cloud.script().instance_statuses = Sequence::of(["ACTIVE".to_string()]);
        let config = test_config();
        let mut state = state_with_clones();

        Provisioner::new(&cloud, &config)
            .execute(Stage::BootInstance, &mut state)
            .await
            .unwrap();

        assert!(state.is_success());
        assert_eq!(cloud.count(|c| matches!(c, Call::StartInstance(_))), 0);
        assert_eq!(cloud.count(|c| matches!(c, Call::ConfigureBootMode(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stage_without_its_inputs_is_a_fault() {
        let cloud = FakeCloud::new();
        let config = test_config();
        let mut state = RunState::new(RUN_ID);

        let err = Provisioner::new(&cloud, &config)
            .execute(Stage::AttachVolumes, &mut state)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Fault);
        assert!(cloud.calls().is_empty());
    }
}
