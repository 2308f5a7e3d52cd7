use std::fmt::{self, Display};

use tracing::{debug, info, instrument, warn};

use super::error::{Result, StmfError};
use super::view::{View, parse_views};
use super::{StmfManager, validate_name};
use crate::command::{Expect, Verdict};

/// A logical unit, identified by its GUID.
#[derive(Clone)]
pub struct LogicalUnit {
    stmf: StmfManager,
    name: String,
}

impl LogicalUnit {
    pub(crate) fn new(stmf: StmfManager, name: &str) -> Self {
        Self {
            stmf,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> Result<bool> {
        validate_name(&self.name)?;
        let argv = self.stmf.tools().stmfadm(["list-lu", self.name.as_str()]);
        Ok(self.stmf.execute(&argv, &Expect::Status)?.is_success())
    }

    /// Remove the logical unit. The backing volume is left alone.
    #[instrument(skip(self), fields(lu = %self.name))]
    pub fn delete(&self) -> Result<()> {
        validate_name(&self.name)?;
        let argv = self.stmf.tools().stmfadm(["delete-lu", self.name.as_str()]);

        match self.stmf.execute(&argv, &Expect::Status)? {
            Verdict::Success(_) => {
                info!(lu = %self.name, "Logical unit deleted");
                Ok(())
            }
            Verdict::NotFound(_) => Err(StmfError::NotFound(format!("logical unit {}", self.name))),
            verdict => {
                let e = StmfError::command_failed(&argv, verdict.output());
                warn!(lu = %self.name, error = %e, "Failed to delete logical unit");
                Err(e)
            }
        }
    }

    /// Expose the unit at `lun` (or a free one) to the given groups (or all).
    #[instrument(skip(self), fields(lu = %self.name))]
    pub fn add_view(
        &self,
        lun: Option<u32>,
        target_group: Option<&str>,
        host_group: Option<&str>,
    ) -> Result<View> {
        validate_name(&self.name)?;
        if let Some(tg) = target_group {
            validate_name(tg)?;
        }
        if let Some(hg) = host_group {
            validate_name(hg)?;
        }

        let mut args = vec!["add-view".to_string()];
        if let Some(lun) = lun {
            args.push("-n".to_string());
            args.push(lun.to_string());
        }
        if let Some(tg) = target_group {
            args.push("-t".to_string());
            args.push(tg.to_string());
        }
        if let Some(hg) = host_group {
            args.push("-h".to_string());
            args.push(hg.to_string());
        }
        args.push(self.name.clone());
        let argv = self.stmf.tools().stmfadm(&args);

        if let Err(e) = self.stmf.run_checked(&argv) {
            warn!(lu = %self.name, error = %e, "Failed to add view");
            return Err(e);
        }

        let view = View::new(&self.name, lun, target_group, host_group);
        info!(%view, "View added");
        Ok(view)
    }

    /// Current view entries of this unit.
    pub fn views(&self) -> Result<Vec<View>> {
        validate_name(&self.name)?;
        let argv = self.stmf.tools().stmfadm(["list-view", "-l", self.name.as_str()]);
        let output = self.stmf.run_checked(&argv)?;

        let views = parse_views(&self.name, &output.stdout)?;
        debug!(lu = %self.name, count = views.len(), "Listed views");
        Ok(views)
    }

    /// Drop every view entry of this unit.
    #[instrument(skip(self), fields(lu = %self.name))]
    pub fn remove_views(&self) -> Result<()> {
        validate_name(&self.name)?;
        let argv = self
            .stmf
            .tools()
            .stmfadm(["remove-view", "-a", "-l", self.name.as_str()]);
        self.stmf.run_checked(&argv)?;

        info!(lu = %self.name, "Views removed");
        Ok(())
    }
}

impl PartialEq for LogicalUnit {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for LogicalUnit {}

impl fmt::Debug for LogicalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalUnit").field("name", &self.name).finish()
    }
}

impl Display for LogicalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LU : {}", self.name)
    }
}
