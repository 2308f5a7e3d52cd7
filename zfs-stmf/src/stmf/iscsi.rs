use std::fmt::{self, Display};

use tracing::{info, instrument, warn};

use super::error::{Result, StmfError};
use super::{StmfManager, validate_name};
use crate::command::{Expect, Verdict};

/// An iSCSI target port provider entry managed with itadm.
///
/// A target without a name only supports [`IscsiTarget::create`], after
/// which it carries the name itadm generated.
#[derive(Clone)]
pub struct IscsiTarget {
    stmf: StmfManager,
    name: Option<String>,
}

impl IscsiTarget {
    pub(crate) fn new(stmf: StmfManager, name: Option<String>) -> Self {
        Self { stmf, name }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn require_name(&self) -> Result<&str> {
        self.name
            .as_deref()
            .ok_or_else(|| StmfError::InvalidName("iscsi target has no name".into()))
    }

    /// Name of an existing target, or why the operation cannot proceed.
    fn existing_name(&self) -> Result<&str> {
        let name = self.require_name()?;
        if !self.exists()? {
            return Err(StmfError::NotFound(format!("iscsi target {}", name)));
        }
        Ok(name)
    }

    pub fn exists(&self) -> Result<bool> {
        let name = self.require_name()?;
        let argv = self.stmf.tools().itadm(["list-target", name]);
        Ok(self.stmf.execute(&argv, &Expect::Status)?.is_success())
    }

    /// Create the target and adopt the name itadm reports.
    #[instrument(skip(self), fields(target = ?self.name))]
    pub fn create(&mut self) -> Result<()> {
        if let Some(name) = &self.name
            && self.exists()?
        {
            return Err(StmfError::AlreadyExists(format!("iscsi target {}", name)));
        }

        let mut args = vec!["create-target"];
        if let Some(name) = &self.name {
            args.push(name.as_str());
        }
        let argv = self.stmf.tools().itadm(args);

        let output = match self.stmf.execute(&argv, &Expect::Status)? {
            Verdict::Success(output) => output,
            verdict => {
                let e = StmfError::command_failed(&argv, verdict.output());
                warn!(error = %e, "Failed to create iscsi target");
                return Err(e);
            }
        };

        // "Target iqn.1986-03.com.sun:02:... successfully created"
        let created = output.stdout.split_whitespace().nth(1).ok_or_else(|| {
            StmfError::ParseError(format!(
                "no target name in create-target output: {}",
                output.stdout.trim()
            ))
        })?;

        info!(target = created, "iSCSI target created");
        self.name = Some(created.to_string());
        Ok(())
    }

    #[instrument(skip(self), fields(target = ?self.name))]
    pub fn delete(&self) -> Result<()> {
        let name = self.existing_name()?;
        let argv = self.stmf.tools().itadm(["delete-target", name]);
        self.stmf.run_checked(&argv)?;

        info!(target = name, "iSCSI target deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(target = ?self.name))]
    pub fn offline(&self) -> Result<()> {
        let name = self.existing_name()?;
        let argv = self.stmf.tools().stmfadm(["offline-target", name]);
        self.stmf.run_checked(&argv)?;

        info!(target = name, "iSCSI target offline");
        Ok(())
    }

    #[instrument(skip(self), fields(target = ?self.name))]
    pub fn online(&self) -> Result<()> {
        let name = self.existing_name()?;
        let argv = self.stmf.tools().stmfadm(["online-target", name]);
        self.stmf.run_checked(&argv)?;

        info!(target = name, "iSCSI target online");
        Ok(())
    }
}

impl PartialEq for IscsiTarget {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for IscsiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IscsiTarget").field("name", &self.name).finish()
    }
}

impl Display for IscsiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iscsi target : {}", self.name.as_deref().unwrap_or("(unnamed)"))
    }
}
