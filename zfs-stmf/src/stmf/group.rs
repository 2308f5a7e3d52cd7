//! Target groups and host groups.
//!
//! Both are named sets of members (target names or initiator names) managed
//! with parallel stmfadm subcommands, so one implementation serves both.

use std::fmt::{self, Display};
use std::marker::PhantomData;

use tracing::{debug, info, instrument, warn};

use super::error::{Result, StmfError};
use super::{StmfManager, validate_name};
use crate::command::{Expect, Verdict};

/// The stmfadm vocabulary of one kind of group.
pub trait GroupKind {
    /// Heading stmfadm prints before each group, e.g. `Target Group`
    const LABEL: &'static str;
    /// Infix of the stmfadm subcommands, `tg` or `hg`
    const ABBREV: &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct TargetKind;

impl GroupKind for TargetKind {
    const LABEL: &'static str = "Target Group";
    const ABBREV: &'static str = "tg";
}

#[derive(Debug, Clone, Copy)]
pub struct HostKind;

impl GroupKind for HostKind {
    const LABEL: &'static str = "Host Group";
    const ABBREV: &'static str = "hg";
}

/// Groups targets; views scoped to it are reachable only through them.
pub type TargetGroup = Group<TargetKind>;

/// Groups initiators; views scoped to it are visible only to them.
pub type HostGroup = Group<HostKind>;

pub struct Group<K: GroupKind> {
    stmf: StmfManager,
    name: String,
    kind: PhantomData<K>,
}

impl<K: GroupKind> Group<K> {
    pub(crate) fn new(stmf: StmfManager, name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self {
            stmf,
            name: name.to_string(),
            kind: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn subcommand(verb: &str) -> String {
        format!("{}-{}", verb, K::ABBREV)
    }

    fn describe(&self) -> String {
        format!("{} {}", K::LABEL.to_ascii_lowercase(), self.name)
    }

    /// Does stmfadm list a group of this name?
    pub fn exists(&self) -> Result<bool> {
        let argv = self
            .stmf
            .tools()
            .stmfadm([Self::subcommand("list").as_str(), self.name.as_str()]);

        let output = match self.stmf.execute(&argv, &Expect::Status)? {
            Verdict::Success(output) => output,
            _ => return Ok(false),
        };

        let heading = format!("{}: {}", K::LABEL, self.name);
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .any(|line| line == heading || line == self.name))
    }

    #[instrument(skip(self), fields(group = %self.name))]
    pub fn create(&self) -> Result<()> {
        if self.exists()? {
            return Err(StmfError::AlreadyExists(self.describe()));
        }

        let argv = self
            .stmf
            .tools()
            .stmfadm([Self::subcommand("create").as_str(), self.name.as_str()]);
        if let Err(e) = self.stmf.run_checked(&argv) {
            warn!(group = %self.name, error = %e, "Failed to create group");
            return Err(e);
        }

        info!(group = %self.name, kind = K::ABBREV, "Group created");
        Ok(())
    }

    #[instrument(skip(self), fields(group = %self.name))]
    pub fn delete(&self) -> Result<()> {
        if !self.exists()? {
            return Err(StmfError::NotFound(self.describe()));
        }

        let argv = self
            .stmf
            .tools()
            .stmfadm([Self::subcommand("delete").as_str(), self.name.as_str()]);
        self.stmf.run_checked(&argv)?;

        info!(group = %self.name, kind = K::ABBREV, "Group deleted");
        Ok(())
    }

    /// Add a member. A member that is already present is not an error.
    #[instrument(skip(self), fields(group = %self.name))]
    pub fn add_member(&self, member: &str) -> Result<()> {
        validate_name(member)?;
        let subcommand = format!("add-{}-member", K::ABBREV);
        let argv = self
            .stmf
            .tools()
            .stmfadm([subcommand.as_str(), "-g", self.name.as_str(), member]);

        match self.stmf.execute(&argv, &Expect::Status)? {
            Verdict::Success(_) => {
                info!(group = %self.name, member, "Member added");
                Ok(())
            }
            Verdict::AlreadyExists(_) => {
                debug!(group = %self.name, member, "Member already present");
                Ok(())
            }
            verdict => Err(StmfError::command_failed(&argv, verdict.output())),
        }
    }

    #[instrument(skip(self), fields(group = %self.name))]
    pub fn remove_member(&self, member: &str) -> Result<()> {
        validate_name(member)?;
        let subcommand = format!("remove-{}-member", K::ABBREV);
        let argv = self
            .stmf
            .tools()
            .stmfadm([subcommand.as_str(), "-g", self.name.as_str(), member]);
        self.stmf.run_checked(&argv)?;

        info!(group = %self.name, member, "Member removed");
        Ok(())
    }

    /// Members as listed by `stmfadm list-tg|list-hg -v`.
    pub fn members(&self) -> Result<Vec<String>> {
        let argv = self
            .stmf
            .tools()
            .stmfadm([Self::subcommand("list").as_str(), "-v", self.name.as_str()]);

        let output = match self.stmf.execute(&argv, &Expect::Status)? {
            Verdict::Success(output) => output,
            Verdict::NotFound(_) => return Err(StmfError::NotFound(self.describe())),
            verdict => return Err(StmfError::command_failed(&argv, verdict.output())),
        };

        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.trim().strip_prefix("Member:"))
            .map(|member| member.trim().to_string())
            .filter(|member| !member.is_empty())
            .collect())
    }
}

impl<K: GroupKind> Clone for Group<K> {
    fn clone(&self) -> Self {
        Self {
            stmf: self.stmf.clone(),
            name: self.name.clone(),
            kind: PhantomData,
        }
    }
}

impl<K: GroupKind> PartialEq for Group<K> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<K: GroupKind> fmt::Debug for Group<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("kind", &K::LABEL)
            .field("name", &self.name)
            .finish()
    }
}

impl<K: GroupKind> Display for Group<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", K::LABEL.to_ascii_lowercase(), self.name)
    }
}
