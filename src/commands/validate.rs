// ABOUTME: Validate command implementation.
// ABOUTME: Checks configuration and credentials locally and prints the effective poll bounds.

use lparclone::config::Config;
use lparclone::error::Result;
use lparclone::output::Output;
use lparclone::poll::PollPolicy;

pub fn validate(config: Config, output: &Output) -> Result<()> {
    config.api_key.resolve()?;
    let workspace = config.cloud_instance_id()?;

    output.progress(&format!(
        "Workspace {} in {} ({})",
        workspace,
        config.region,
        config.api_endpoint()
    ));
    output.progress(&format!(
        "Clone {} -> {} ({} GB, {} procs, {})",
        config.primary_instance,
        config.instance.name,
        config.instance.memory,
        config.instance.processors,
        config.instance.proc_type
    ));

    let polling = &config.polling;
    let bounds: [(&str, PollPolicy); 7] = [
        ("instance stop", polling.instance_stop()),
        ("snapshot", polling.snapshot()),
        ("clone", polling.clone_task()),
        ("volume", polling.volume()),
        ("attach", polling.attach()),
        ("boot", polling.boot()),
        ("detach", polling.detach()),
    ];
    for (what, policy) in bounds {
        output.progress(&format!(
            "  {what:<14} {} checks every {}s (up to {}s)",
            policy.max_attempts,
            policy.interval.as_secs(),
            policy.max_elapsed().as_secs()
        ));
    }

    output.success("Configuration is valid");
    Ok(())
}
