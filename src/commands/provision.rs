// ABOUTME: Provision command implementation.
// ABOUTME: Runs the staged provisioner against the live API and fires lifecycle hooks.

use lparclone::cloud::PowerVsClient;
use lparclone::config::Config;
use lparclone::diagnostics::{Diagnostics, Warning};
use lparclone::error::Result;
use lparclone::hooks::{HookContext, HookPoint, HookRunner};
use lparclone::output::Output;
use lparclone::provision::Provisioner;
use std::path::Path;

pub async fn provision(
    config: Config,
    project_dir: &Path,
    run_hooks: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let client = PowerVsClient::from_config(&config)?;
    let hook_runner = HookRunner::new(project_dir);
    let mut diag = Diagnostics::default();

    output.progress(&format!(
        "Provisioning {} from a snapshot of {}",
        config.instance.name, config.primary_instance
    ));

    let provisioner = Provisioner::new(&client, &config).on_stage(|stage| output.stage(stage));

    match provisioner.run().await {
        Ok(summary) => {
            if run_hooks {
                let context = HookContext::from_summary(&summary);
                if let Some(result) = hook_runner.run(HookPoint::PostProvision, &context).await
                    && !result.success
                {
                    diag.warn(Warning::hook(format!(
                        "post-provision hook failed: {}",
                        result.stderr.trim()
                    )));
                }
            }

            output.summary(&summary);
            for warning in diag.warnings() {
                output.warning(&warning.message);
            }
            output.success("Provisioning complete!");
            Ok(())
        }
        Err(failure) => {
            output.failure(&failure.error, &failure.report);

            if run_hooks {
                let context = HookContext::new(&config, &failure.state).with_error(&failure.error);
                if let Some(result) = hook_runner.run(HookPoint::OnError, &context).await
                    && !result.success
                {
                    output.warning("on-error hook failed");
                }
            }

            Err(failure.error.into())
        }
    }
}
