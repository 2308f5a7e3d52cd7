//! COMSTAR (SCSI target framework) objects managed through `stmfadm` and
//! `itadm`.

pub mod error;
pub mod group;
pub mod iscsi;
pub mod lu;
pub mod view;

use std::sync::Arc;

use tracing::debug;

use crate::command::{self, CommandOutput, CommandRunner, Expect, SystemRunner, Verdict};
use crate::config::Tools;

pub use error::{Result, StmfError};
pub use group::{Group, GroupKind, HostGroup, HostKind, TargetGroup, TargetKind};
pub use iscsi::IscsiTarget;
pub use lu::LogicalUnit;
pub use view::View;

/// Longest identifier accepted for targets, groups, members and LUs
const MAX_NAME_LEN: usize = 223;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

/// Check a target, group, member or LU name before it reaches stmfadm/itadm.
/// IQNs, EUIs, WWNs and GUIDs all fit in `[A-Za-z0-9_.:-]`.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let problem = if name.is_empty() {
        "is empty".to_string()
    } else if name.len() > MAX_NAME_LEN {
        format!("is longer than {} characters", MAX_NAME_LEN)
    } else if let Some(c) = name.chars().find(|&c| !is_name_char(c)) {
        format!("contains {:?}", c)
    } else if name.contains("..") {
        "contains '..'".to_string()
    } else {
        return Ok(());
    };

    Err(StmfError::InvalidName(format!("'{}' {}", name, problem)))
}

/// Entry point for COMSTAR operations.
#[derive(Debug, Clone)]
pub struct StmfManager {
    tools: Arc<Tools>,
    runner: Arc<dyn CommandRunner>,
}

impl StmfManager {
    pub fn new(tools: Tools) -> Self {
        Self::with_runner(tools, Arc::new(SystemRunner))
    }

    pub fn with_runner(tools: Tools, runner: Arc<dyn CommandRunner>) -> Self {
        Self::from_parts(Arc::new(tools), runner)
    }

    pub(crate) fn from_parts(tools: Arc<Tools>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { tools, runner }
    }

    pub(crate) fn tools(&self) -> &Tools {
        &self.tools
    }

    pub(crate) fn execute(&self, argv: &[String], expect: &Expect) -> Result<Verdict> {
        Ok(command::execute(self.runner.as_ref(), argv, expect)?)
    }

    /// Run a command that must exit zero.
    pub(crate) fn run_checked(&self, argv: &[String]) -> Result<CommandOutput> {
        match self.execute(argv, &Expect::Status)? {
            Verdict::Success(output) => Ok(output),
            verdict => Err(StmfError::command_failed(argv, verdict.output())),
        }
    }

    /// Handle for an existing logical unit. No command is run.
    pub fn logical_unit(&self, name: &str) -> LogicalUnit {
        LogicalUnit::new(self.clone(), name)
    }

    /// All logical units known to the framework.
    pub fn logical_units(&self) -> Result<Vec<LogicalUnit>> {
        let argv = self.tools.stmfadm(["list-lu"]);
        let output = self.run_checked(&argv)?;

        // "LU Name: 600144F0..."
        let units: Vec<LogicalUnit> = output
            .stdout
            .lines()
            .filter(|line| line.trim_start().starts_with("LU Name:"))
            .filter_map(|line| line.split_whitespace().nth(2))
            .map(|guid| self.logical_unit(guid))
            .collect();

        debug!(count = units.len(), "Listed logical units");
        Ok(units)
    }

    pub fn target_group(&self, name: &str) -> Result<TargetGroup> {
        Group::new(self.clone(), name)
    }

    pub fn host_group(&self, name: &str) -> Result<HostGroup> {
        Group::new(self.clone(), name)
    }

    /// Handle for an iSCSI target; `None` lets itadm pick the name on create.
    pub fn iscsi_target(&self, name: Option<&str>) -> Result<IscsiTarget> {
        if let Some(name) = name {
            validate_name(name)?;
        }
        Ok(IscsiTarget::new(self.clone(), name.map(str::to_string)))
    }
}
