// ABOUTME: Init command implementation.
// ABOUTME: Writes a commented configuration template into the working directory.

use lparclone::config::{self, CONFIG_FILENAME};
use lparclone::error::Result;
use lparclone::output::Output;
use std::path::Path;

pub fn init(dir: &Path, force: bool, output: &Output) -> Result<()> {
    config::init_config(dir, force)?;
    output.success(&format!("Created {CONFIG_FILENAME}"));
    output.progress("Edit the placeholders, export IBMCLOUD_API_KEY, then run `lparclone validate`.");
    Ok(())
}
