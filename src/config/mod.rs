// ABOUTME: Configuration types and parsing for lparclone.yml.
// ABOUTME: Built once at startup and passed explicitly into the provisioner.

mod env_value;
mod init;
mod polling;
mod proc_type;

pub use env_value::EnvValue;
pub use init::init_config;
pub use polling::PollingConfig;
pub use proc_type::ProcType;

use crate::error::{Error, Result};
use crate::types::InstanceName;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "lparclone.yml";
pub const CONFIG_FILENAME_ALT: &str = "lparclone.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".lparclone/config.yml";

pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.cloud.ibm.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IBM Cloud API key, exchanged for a bearer token at stage 1.
    pub api_key: EnvValue,

    pub region: String,

    /// Workspace CRN; also carries the cloud instance id.
    pub crn: String,

    /// Overrides the regional API endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_iam_endpoint")]
    pub iam_endpoint: String,

    /// Name or id of the running instance to snapshot.
    pub primary_instance: String,

    pub instance: InstanceSpec,

    pub network: NetworkSpec,

    pub storage: StorageConfig,

    #[serde(default)]
    pub boot: BootConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub rollback: RollbackConfig,
}

/// Hardware of the instance to provision.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceSpec {
    pub name: InstanceName,
    /// Memory in GB.
    pub memory: f64,
    pub processors: f64,
    #[serde(default)]
    pub proc_type: ProcType,
    pub sys_type: String,
    /// Image id or name for the stock boot image.
    pub image: String,
    #[serde(default)]
    pub storage_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSpec {
    pub subnet: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub key_pair: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage tier the cloned volumes land on.
    pub target_tier: String,
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

fn default_name_prefix() -> String {
    "lparclone".to_string()
}

fn default_iam_endpoint() -> String {
    DEFAULT_IAM_ENDPOINT.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootConfig {
    /// Initial program load source.
    #[serde(default = "default_boot_mode")]
    pub boot_mode: String,
    #[serde(default = "default_operating_mode")]
    pub operating_mode: String,
}

fn default_boot_mode() -> String {
    "a".to_string()
}

fn default_operating_mode() -> String {
    "normal".to_string()
}

impl Default for BootConfig {
    fn default() -> Self {
        BootConfig {
            boot_mode: default_boot_mode(),
            operating_mode: default_operating_mode(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollbackConfig {
    /// Also delete the provisioned instance during rollback.
    #[serde(default)]
    pub delete_instance: bool,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Reject values that would only fail later, mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::InvalidConfig("region cannot be empty".to_string()));
        }
        self.cloud_instance_id()?;
        if self.primary_instance.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "primary_instance cannot be empty".to_string(),
            ));
        }
        if self.primary_instance == self.instance.name.as_str() {
            return Err(Error::InvalidConfig(
                "primary_instance and instance.name must differ".to_string(),
            ));
        }
        if self.instance.memory <= 0.0 || self.instance.processors <= 0.0 {
            return Err(Error::InvalidConfig(
                "instance memory and processors must be positive".to_string(),
            ));
        }
        if self.storage.target_tier.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "storage.target_tier cannot be empty".to_string(),
            ));
        }
        if self.storage.name_prefix.is_empty()
            || !self
                .storage
                .name_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidConfig(format!(
                "storage.name_prefix '{}' must be non-empty and alphanumeric",
                self.storage.name_prefix
            )));
        }
        if self.polling.interval.is_zero() {
            return Err(Error::InvalidConfig(
                "polling.interval must be greater than zero".to_string(),
            ));
        }
        if self.polling.submit_attempts == 0 || self.polling.instance_stop_attempts == 0 {
            return Err(Error::InvalidConfig(
                "polling attempt counts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Cloud instance id: the eighth colon-separated field of the workspace CRN.
    pub fn cloud_instance_id(&self) -> Result<&str> {
        self.crn
            .split(':')
            .nth(7)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::InvalidConfig(format!("crn '{}' has no cloud instance id", self.crn))
            })
    }

    /// Base URL of the regional Power Virtual Server API.
    pub fn api_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.power-iaas.cloud.ibm.com", self.region))
    }

    pub fn template() -> Self {
        Config {
            api_key: EnvValue::FromEnv {
                var: "IBMCLOUD_API_KEY".to_string(),
                default: None,
            },
            region: "us-south".to_string(),
            crn: "crn:v1:bluemix:public:power-iaas:dal10:a/ACCOUNT:WORKSPACE-ID::".to_string(),
            endpoint: None,
            iam_endpoint: default_iam_endpoint(),
            primary_instance: "prod-lpar".to_string(),
            instance: InstanceSpec {
                name: InstanceName::new("prod-lpar-clone").expect("template name is valid"),
                memory: 8.0,
                processors: 0.5,
                proc_type: ProcType::Shared,
                sys_type: "s1022".to_string(),
                image: "IBMi-75-03-2924-2".to_string(),
                storage_type: None,
            },
            network: NetworkSpec {
                subnet: "SUBNET-ID".to_string(),
                ip_address: None,
                key_pair: None,
            },
            storage: StorageConfig {
                target_tier: "tier3".to_string(),
                name_prefix: default_name_prefix(),
            },
            boot: BootConfig::default(),
            polling: PollingConfig::default(),
            rollback: RollbackConfig::default(),
        }
    }
}
