// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Writes a commented lparclone.yml template.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, generate_template_yaml(&Config::template()))?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"# Credential: literal string or {{ env: VAR, default: ... }}
api_key:
  env: IBMCLOUD_API_KEY
region: {region}
crn: "{crn}"
primary_instance: {primary}

instance:
  name: {name}
  memory: {memory}
  processors: {processors}
  proc_type: {proc_type}
  sys_type: {sys_type}
  image: {image}

network:
  subnet: {subnet}
  # ip_address: 10.0.0.10
  # key_pair: my-key

storage:
  target_tier: {tier}
  name_prefix: {prefix}

# boot:
#   boot_mode: a
#   operating_mode: normal

# polling:
#   interval: 30s
#   attach_timeout: 7m

# rollback:
#   delete_instance: false
"#,
        region = config.region,
        crn = config.crn,
        primary = config.primary_instance,
        name = config.instance.name,
        memory = config.instance.memory,
        processors = config.instance.processors,
        proc_type = config.instance.proc_type,
        sys_type = config.instance.sys_type,
        image = config.instance.image,
        subnet = config.network.subnet,
        tier = config.storage.target_tier,
        prefix = config.storage.name_prefix,
    )
}
