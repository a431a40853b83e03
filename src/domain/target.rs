use crate::error::{RelgateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A platform/architecture build target, written `os/arch`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub os: String,
    pub arch: String,
}

impl Target {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Target {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// `os-arch`, safe for file names and cache keys
    pub fn slug(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Output file for a binary built for this target
    ///
    /// Windows targets get an `.exe` suffix.
    pub fn output_file_name(&self, name: &str) -> String {
        let ext = if self.os == "windows" { ".exe" } else { "" };
        format!("{}-{}{}", name, self.slug(), ext)
    }
}

impl FromStr for Target {
    type Err = RelgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((os, arch))
                if !os.is_empty() && !arch.is_empty() && !arch.contains('/') =>
            {
                Ok(Target::new(os, arch))
            }
            _ => Err(RelgateError::config(format!(
                "Invalid target '{}' - expected os/arch",
                s
            ))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
