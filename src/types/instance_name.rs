// ABOUTME: Validated Power Virtual Server instance name.
// ABOUTME: Names are used for rollback lookups, so they must match exactly what the API stores.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Longest server name the control plane accepts.
const MAX_LEN: usize = 47;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstanceNameError {
    #[error("instance name cannot be empty")]
    Empty,

    #[error("instance name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("instance name must start with a letter")]
    BadStart,

    #[error("invalid character in instance name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceName(String);

impl InstanceName {
    pub fn new(value: &str) -> Result<Self, InstanceNameError> {
        let first = value.chars().next().ok_or(InstanceNameError::Empty)?;

        if value.len() > MAX_LEN {
            return Err(InstanceNameError::TooLong);
        }

        if !first.is_ascii_alphabetic() {
            return Err(InstanceNameError::BadStart);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(InstanceNameError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for InstanceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        InstanceName::new(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for InstanceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
