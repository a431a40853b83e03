//! Cross-step value propagation
//!
//! Exported values go to two places: the store's `env-vars` region, so this
//! tool can read them back in a later step, and the CI provider's own channel
//! file so ordinary shell steps see them as environment variables.

use crate::error::{RelgateError, Result};
use crate::pipeline::{PipelineStore, ENV_VARS_REGION, RESULTS_REGION};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Where exported values must land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Store and CI channel; fails outside CI
    #[default]
    Channel,
    /// Store only; never needs a CI channel
    StoreOnly,
}

impl PipelineStore {
    /// Persist `pairs` and append them to the CI environment file
    pub fn export_values(
        &self,
        command_id: &str,
        pairs: &[(String, String)],
        mode: ExportMode,
    ) -> Result<()> {
        let _guard = self.span.enter();

        // Resolve the channel first so a missing one writes nothing
        let channel = match mode {
            ExportMode::Channel => Some(self.env.detect()?.env_file),
            ExportMode::StoreOnly => None,
        };

        for (key, _) in pairs {
            validate_key(key)?;
        }
        for (key, value) in pairs {
            self.store.save(ENV_VARS_REGION, key, value)?;
        }

        if let Some(env_file) = channel {
            append_lines(&env_file, pairs)?;
        }

        info!(command_id, count = pairs.len(), ?mode, "exported values");
        Ok(())
    }

    /// Record the primary output of a command
    ///
    /// Appends `result=<value>` to the CI output file (in `Channel` mode) and
    /// persists the value under `results/<command_id>`.
    pub fn save_result(&self, command_id: &str, value: &str, mode: ExportMode) -> Result<()> {
        let _guard = self.span.enter();

        let channel = match mode {
            ExportMode::Channel => Some(self.env.detect()?.output_file),
            ExportMode::StoreOnly => None,
        };

        self.store.save(RESULTS_REGION, command_id, value)?;
        if let Some(output_file) = channel {
            append_lines(&output_file, &[("result".to_string(), value.to_string())])?;
        }

        debug!(command_id, "saved result");
        Ok(())
    }

    /// Result recorded by an earlier `save_result` for `command_id`
    pub fn load_result(&self, command_id: &str) -> Result<Option<String>> {
        self.store.load(RESULTS_REGION, command_id)
    }

    /// Every value exported so far, by key
    pub fn load_exported(&self) -> Result<BTreeMap<String, String>> {
        self.store.load_all(ENV_VARS_REGION)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RelgateError::config(format!(
            "Invalid variable name '{}' - use letters, digits and underscores",
            key
        )))
    }
}

/// Append `KEY=VALUE` lines; multi-line values use the `KEY<<DELIM` form
fn append_lines(path: &Path, pairs: &[(String, String)]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            RelgateError::not_in_ci(format!("cannot open '{}': {}", path.display(), e))
        })?;

    let mut buf = String::new();
    for (key, value) in pairs {
        if value.contains('\n') {
            let delimiter = heredoc_delimiter(value);
            buf.push_str(&format!("{}<<{}\n{}\n{}\n", key, delimiter, value, delimiter));
        } else {
            buf.push_str(&format!("{}={}\n", key, value));
        }
    }

    file.write_all(buf.as_bytes())?;
    Ok(())
}

fn heredoc_delimiter(value: &str) -> String {
    let mut delimiter = "RELGATE_EOF".to_string();
    while value.contains(&delimiter) {
        delimiter.push('_');
    }
    delimiter
}
