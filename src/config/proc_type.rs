// ABOUTME: Processor allocation type for new instances.
// ABOUTME: Accepts dedicated, shared, and capped, as the control plane spells them.

use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcType {
    Dedicated,
    #[default]
    Shared,
    Capped,
}

impl ProcType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcType::Dedicated => "dedicated",
            ProcType::Shared => "shared",
            ProcType::Capped => "capped",
        }
    }
}

impl FromStr for ProcType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dedicated" => Ok(ProcType::Dedicated),
            "shared" => Ok(ProcType::Shared),
            "capped" => Ok(ProcType::Capped),
            other => Err(format!(
                "invalid proc type '{}': expected dedicated, shared, or capped",
                other
            )),
        }
    }
}

impl fmt::Display for ProcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProcType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl Serialize for ProcType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
