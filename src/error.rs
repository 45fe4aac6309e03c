// ABOUTME: Application-wide error types for lparclone.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::cloud::CloudError;
use crate::provision::ProvisionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("cleanup incomplete: {0} resource(s) need manual review")]
    CleanupIncomplete(usize),

    #[error("control plane error: {0}")]
    Cloud(#[from] CloudError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
