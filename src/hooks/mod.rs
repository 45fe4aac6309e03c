// ABOUTME: Hooks system for provisioning lifecycle events.
// ABOUTME: Discovers and executes shell scripts at post-provision and on-error points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::config::Config;
use crate::provision::{ProvisionError, ProvisionSummary, RunState};

/// Hook execution points in the provisioning lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// After the instance booted with its cloned volumes. Failure logs warning.
    PostProvision,
    /// After rollback of a failed run. Failure logs warning.
    OnError,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PostProvision => "post-provision",
            HookPoint::OnError => "on-error",
        }
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub run_id: String,
    pub instance_name: String,
    pub instance_id: Option<String>,
    pub source_instance: String,
    pub snapshot_id: Option<String>,
    pub clone_boot_id: Option<String>,
    pub clone_data_ids: Vec<String>,
    pub failed_stage: Option<String>,
    pub error_kind: Option<String>,
}

impl HookContext {
    pub fn new(config: &Config, state: &RunState) -> Self {
        let clones = state.cloned_volumes();
        Self {
            run_id: state.run_id().to_string(),
            instance_name: config.instance.name.to_string(),
            instance_id: state.instance_id().map(|id| id.to_string()),
            source_instance: config.primary_instance.clone(),
            snapshot_id: state.snapshot_id().map(|id| id.to_string()),
            clone_boot_id: clones.map(|c| c.boot.to_string()),
            clone_data_ids: clones
                .map(|c| c.data.iter().map(|id| id.to_string()).collect())
                .unwrap_or_default(),
            failed_stage: None,
            error_kind: None,
        }
    }

    pub fn from_summary(summary: &ProvisionSummary) -> Self {
        Self {
            run_id: summary.run_id.clone(),
            instance_name: summary.instance_name.to_string(),
            instance_id: summary.instance_id.as_ref().map(|id| id.to_string()),
            source_instance: summary.source_instance.clone(),
            snapshot_id: summary.snapshot_id.as_ref().map(|id| id.to_string()),
            clone_boot_id: summary.cloned_boot_volume.as_ref().map(|id| id.to_string()),
            clone_data_ids: summary
                .cloned_data_volumes
                .iter()
                .map(|id| id.to_string())
                .collect(),
            failed_stage: None,
            error_kind: None,
        }
    }

    /// Attach the failure that ended the run.
    pub fn with_error(mut self, error: &ProvisionError) -> Self {
        self.failed_stage = Some(error.stage().to_string());
        self.error_kind = Some(error.kind().to_string());
        self
    }

    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("LPARCLONE_RUN_ID".to_string(), self.run_id.clone());
        env.insert(
            "LPARCLONE_INSTANCE_NAME".to_string(),
            self.instance_name.clone(),
        );
        env.insert(
            "LPARCLONE_SOURCE_INSTANCE".to_string(),
            self.source_instance.clone(),
        );
        let optional = [
            ("LPARCLONE_INSTANCE_ID", &self.instance_id),
            ("LPARCLONE_SNAPSHOT_ID", &self.snapshot_id),
            ("LPARCLONE_CLONE_BOOT_ID", &self.clone_boot_id),
            ("LPARCLONE_FAILED_STAGE", &self.failed_stage),
            ("LPARCLONE_ERROR_KIND", &self.error_kind),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                env.insert(key.to_string(), value.clone());
            }
        }
        if !self.clone_data_ids.is_empty() {
            env.insert(
                "LPARCLONE_CLONE_DATA_IDS".to_string(),
                self.clone_data_ids.join(","),
            );
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Create a new hook runner looking for hooks in the given project directory.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            hooks_dir: project_dir.join(".lparclone").join("hooks"),
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let output = Command::new(&hook_path)
            .envs(context.to_env())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!("{} hook completed successfully", point.filename());
                } else {
                    tracing::warn!(
                        "{} hook failed with exit code {:?}",
                        point.filename(),
                        result.exit_code
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}
