//! Locations of the administrative utilities.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::command::command_line;

/// Default directory holding zvol block device nodes (illumos layout)
pub const DEFAULT_ZVOL_DIR: &str = "/dev/zvol/dsk";

/// Argument-vector prefixes for each wrapped tool.
///
/// A prefix may hold more than the program itself, e.g. `["pfexec", "zfs"]`,
/// so privilege elevation stays a configuration concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub zfs: Vec<String>,
    pub zpool: Vec<String>,
    pub stmfadm: Vec<String>,
    pub itadm: Vec<String>,
    /// Directory under which `<dataset>` resolves to a zvol device
    pub zvol_dir: PathBuf,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            zfs: vec!["zfs".to_string()],
            zpool: vec!["zpool".to_string()],
            stmfadm: vec!["stmfadm".to_string()],
            itadm: vec!["itadm".to_string()],
            zvol_dir: PathBuf::from(DEFAULT_ZVOL_DIR),
        }
    }
}

impl Tools {
    pub fn zfs<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        command_line(&self.zfs, args)
    }

    pub fn zpool<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        command_line(&self.zpool, args)
    }

    pub fn stmfadm<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        command_line(&self.stmfadm, args)
    }

    pub fn itadm<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        command_line(&self.itadm, args)
    }

    /// Device node of a volume dataset.
    pub fn zvol_path(&self, dataset: &str) -> String {
        format!(
            "{}/{}",
            self.zvol_dir.display().to_string().trim_end_matches('/'),
            dataset
        )
    }
}

/// Split a configured tool invocation into its argv prefix.
///
/// Used as a clap value parser, hence the `String` error.
pub fn parse_prefix(s: &str) -> Result<Vec<String>, String> {
    let prefix: Vec<String> = s.split_whitespace().map(str::to_string).collect();
    if prefix.is_empty() {
        return Err("tool command cannot be empty".to_string());
    }
    Ok(prefix)
}
