// ABOUTME: Polling and timeout tunables for every wait in the stage sequence.
// ABOUTME: Elapsed bounds are converted into attempt counts at the configured interval.

use serde::Deserialize;
use std::time::Duration;

use crate::poll::PollPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Fixed sleep between status checks.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Delay after instance creation before the first status check.
    #[serde(default = "default_instance_grace", with = "humantime_serde")]
    pub instance_grace: Duration,

    #[serde(default = "default_instance_stop_attempts")]
    pub instance_stop_attempts: u32,

    #[serde(default = "default_snapshot_timeout", with = "humantime_serde")]
    pub snapshot_timeout: Duration,

    #[serde(default = "default_clone_timeout", with = "humantime_serde")]
    pub clone_timeout: Duration,

    #[serde(default = "default_volume_timeout", with = "humantime_serde")]
    pub volume_timeout: Duration,

    /// Delay after the attach request before listing instance volumes.
    #[serde(default = "default_attach_settle", with = "humantime_serde")]
    pub attach_settle: Duration,

    #[serde(default = "default_attach_timeout", with = "humantime_serde")]
    pub attach_timeout: Duration,

    #[serde(default = "default_boot_timeout", with = "humantime_serde")]
    pub boot_timeout: Duration,

    #[serde(default = "default_detach_timeout", with = "humantime_serde")]
    pub detach_timeout: Duration,

    #[serde(default = "default_submit_attempts")]
    pub submit_attempts: u32,

    #[serde(default = "default_submit_retry_delay", with = "humantime_serde")]
    pub submit_retry_delay: Duration,
}

fn default_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_instance_grace() -> Duration {
    Duration::from_secs(60)
}

fn default_instance_stop_attempts() -> u32 {
    40
}

fn default_snapshot_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_clone_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_volume_timeout() -> Duration {
    Duration::from_secs(20 * 60)
}

fn default_attach_settle() -> Duration {
    Duration::from_secs(30)
}

fn default_attach_timeout() -> Duration {
    Duration::from_secs(420)
}

fn default_boot_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_detach_timeout() -> Duration {
    Duration::from_secs(240)
}

fn default_submit_attempts() -> u32 {
    3
}

fn default_submit_retry_delay() -> Duration {
    Duration::from_secs(10)
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            interval: default_interval(),
            instance_grace: default_instance_grace(),
            instance_stop_attempts: default_instance_stop_attempts(),
            snapshot_timeout: default_snapshot_timeout(),
            clone_timeout: default_clone_timeout(),
            volume_timeout: default_volume_timeout(),
            attach_settle: default_attach_settle(),
            attach_timeout: default_attach_timeout(),
            boot_timeout: default_boot_timeout(),
            detach_timeout: default_detach_timeout(),
            submit_attempts: default_submit_attempts(),
            submit_retry_delay: default_submit_retry_delay(),
        }
    }
}

impl PollingConfig {
    pub fn instance_stop(&self) -> PollPolicy {
        PollPolicy::attempts(self.interval, self.instance_stop_attempts)
    }

    pub fn snapshot(&self) -> PollPolicy {
        PollPolicy::within(self.snapshot_timeout, self.interval)
    }

    pub fn clone_task(&self) -> PollPolicy {
        PollPolicy::within(self.clone_timeout, self.interval)
    }

    pub fn volume(&self) -> PollPolicy {
        PollPolicy::within(self.volume_timeout, self.interval)
    }

    pub fn attach(&self) -> PollPolicy {
        PollPolicy::within(self.attach_timeout, self.interval)
    }

    pub fn boot(&self) -> PollPolicy {
        PollPolicy::within(self.boot_timeout, self.interval)
    }

    pub fn detach(&self) -> PollPolicy {
        PollPolicy::within(self.detach_timeout, self.interval)
    }
}
