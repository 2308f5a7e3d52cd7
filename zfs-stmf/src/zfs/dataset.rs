use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::command::{self, CommandOutput, CommandRunner, Expect, SystemRunner, Verdict};
use crate::config::Tools;
use crate::stmf::{LogicalUnit, StmfManager};

use super::error::{Result, ZfsError};
use super::name::DatasetName;
use super::properties::{self, Properties, validate_assignment};

/// Options for [`Filesystem::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Create missing parent datasets (`-p`)
    pub parents: bool,
    /// Create a volume of this size instead of a filesystem (`-V`)
    pub volume: Option<String>,
    /// Skip the volume's reservation (`-s`, volumes only)
    pub sparse: bool,
    /// Properties set at creation (`-o name=value`)
    pub properties: Vec<(String, String)>,
}

/// Options for [`Snapshot::send_to`].
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Send the delta from this snapshot (`-i`); `@name` is relative
    pub incremental: Option<String>,
    /// Send the delta including intermediate snapshots (`-I`)
    pub intermediary: Option<String>,
    /// Replicate descendants and properties (`-R`)
    pub replication: bool,
    /// Receive under the sent name below the destination (`receive -d`)
    pub use_sent_name: bool,
}

/// Entry point for ZFS operations.
///
/// Cloning is cheap; every dataset handle carries a clone so it can issue
/// its own commands.
#[derive(Debug, Clone)]
pub struct ZfsManager {
    tools: Arc<Tools>,
    runner: Arc<dyn CommandRunner>,
}

impl ZfsManager {
    /// Manager running the configured tools on this host
    pub fn new(tools: Tools) -> Self {
        Self::with_runner(tools, Arc::new(SystemRunner))
    }

    pub fn with_runner(tools: Tools, runner: Arc<dyn CommandRunner>) -> Self {
        Self::from_parts(Arc::new(tools), runner)
    }

    pub(crate) fn from_parts(tools: Arc<Tools>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { tools, runner }
    }

    pub fn tools(&self) -> &Tools {
        &self.tools
    }

    /// COMSTAR manager sharing this manager's tools and runner.
    pub fn stmf(&self) -> StmfManager {
        StmfManager::from_parts(self.tools.clone(), self.runner.clone())
    }

    fn execute(&self, argv: &[String], expect: &Expect) -> Result<Verdict> {
        Ok(command::execute(self.runner.as_ref(), argv, expect)?)
    }

    /// Run a command that must meet `expect`; anything else is a failure
    /// carrying the tool's output.
    fn run_checked(&self, argv: &[String], expect: &Expect) -> Result<CommandOutput> {
        match self.execute(argv, expect)? {
            Verdict::Success(output) => Ok(output),
            verdict => Err(ZfsError::command_failed(argv, verdict.output())),
        }
    }

    /// Handle for a filesystem or volume.
    pub fn filesystem(&self, name: &str) -> Result<Filesystem> {
        let name = DatasetName::parse(name)?;
        if name.is_snapshot() {
            return Err(ZfsError::InvalidName(format!("'{}' is a snapshot", name)));
        }
        Ok(Filesystem {
            zfs: self.clone(),
            name,
        })
    }

    /// Handle for a snapshot (`fs@snap`).
    pub fn snapshot(&self, name: &str) -> Result<Snapshot> {
        let name = DatasetName::parse(name)?;
        if !name.is_snapshot() {
            return Err(ZfsError::InvalidName(format!(
                "'{}' is not a snapshot name",
                name
            )));
        }
        Ok(Snapshot {
            zfs: self.clone(),
            name,
        })
    }

    /// Handle of the right type for `name`.
    pub fn dataset(&self, name: DatasetName) -> Dataset {
        if name.is_snapshot() {
            Dataset::Snapshot(Snapshot {
                zfs: self.clone(),
                name,
            })
        } else {
            Dataset::Filesystem(Filesystem {
                zfs: self.clone(),
                name,
            })
        }
    }

    /// Resolve a dataset name, or an absolute path through the mount table.
    pub fn open(&self, path: &str) -> Result<Dataset> {
        if path.starts_with('/') {
            let mountpoint = clean_mountpoint(path);
            return self
                .mounts()?
                .remove(&mountpoint)
                .ok_or_else(|| ZfsError::NotFound(path.to_string()));
        }

        Ok(self.dataset(DatasetName::clean(path)?))
    }

    /// All imported pools, as their root filesystems.
    pub fn pools(&self) -> Result<Vec<Filesystem>> {
        let argv = self.tools.zpool(["list", "-Honame"]);
        let output = self.run_checked(&argv, &Expect::QuietStderr)?;

        output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.filesystem(line.trim()))
            .collect()
    }

    /// Mounted filesystems keyed by mountpoint.
    ///
    /// Datasets whose mountpoint is not an absolute path (`none`, `legacy`,
    /// `-` for snapshots and volumes) are left out.
    pub fn mounts(&self) -> Result<BTreeMap<PathBuf, Dataset>> {
        let argv = self.tools.zfs(["get", "-rHp", "-oname,value", "mountpoint"]);
        let output = self.run_checked(&argv, &Expect::QuietStderr)?;

        let mut mounts = BTreeMap::new();
        for line in output.stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let (name, mountpoint) = line.split_once('\t').ok_or_else(|| {
                ZfsError::ParseError(format!("expected name and mountpoint: {}", line))
            })?;
            if !mountpoint.starts_with('/') {
                continue;
            }
            let name = DatasetName::parse(name)?;
            mounts.insert(PathBuf::from(mountpoint), self.dataset(name));
        }

        debug!(count = mounts.len(), "Read mount table");
        Ok(mounts)
    }

    /// Check if a dataset exists
    pub fn exists(&self, name: &DatasetName) -> Result<bool> {
        let argv = self.tools.zfs(["list", "-H", "-oname", name.as_str()]);
        let verdict = self.execute(&argv, &Expect::ExactLine(name.to_string()))?;
        Ok(verdict.is_success())
    }

    /// Raw property value as printed by `zfs get -Hp`.
    pub fn get(&self, name: &DatasetName, key: &str) -> Result<String> {
        let argv = self.tools.zfs(["get", "-ovalue", "-Hp", key, name.as_str()]);

        let output = self.run_checked(&argv, &Expect::QuietStderr)?;

        let mut lines = output.stdout.lines();
        match (lines.next(), lines.next()) {
            (Some(value), None) => Ok(value.to_string()),
            _ => Err(ZfsError::command_failed(&argv, &output)),
        }
    }

    /// Assign a property. The value must already be validated.
    #[instrument(skip(self))]
    pub fn set(&self, name: &DatasetName, key: &str, value: &str) -> Result<()> {
        let assignment = format!("{}={}", key, value);
        let argv = self.tools.zfs(["set", assignment.as_str(), name.as_str()]);

        if let Err(e) = self.run_checked(&argv, &Expect::Silent) {
            warn!(dataset = %name, property = key, error = %e, "Failed to set property");
            return Err(e);
        }

        debug!(dataset = %name, property = key, "Property set");
        Ok(())
    }

    /// Revert a property to its inherited value.
    #[instrument(skip(self))]
    pub fn inherit(&self, name: &DatasetName, key: &str, recursive: bool) -> Result<()> {
        if !properties::is_user_property(key) {
            let def = properties::lookup(key)
                .ok_or_else(|| ZfsError::UnknownProperty(key.to_string()))?;
            if !def.inheritable {
                return Err(ZfsError::InvalidArgument(format!(
                    "property '{}' is not inheritable",
                    key
                )));
            }
        }

        let mut args = vec!["inherit"];
        if recursive {
            args.push("-r");
        }
        args.extend([key, name.as_str()]);
        let argv = self.tools.zfs(args);

        self.run_checked(&argv, &Expect::Silent)?;
        debug!(dataset = %name, property = key, "Property inherited");
        Ok(())
    }

    fn children(&self, name: &DatasetName, recursive: bool) -> Result<Vec<Filesystem>> {
        if !self.exists(name)? {
            return Err(ZfsError::NotFound(name.to_string()));
        }

        let mut args = vec!["list", "-H", "-r", "-oname", "-tfilesystem"];
        if !recursive {
            args.push("-d1");
        }
        args.push(name.as_str());
        let argv = self.tools.zfs(args);

        let output = self.run_checked(&argv, &Expect::QuietStderr)?;

        // The first line is the dataset itself
        output
            .stdout
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.filesystem(line.trim()))
            .collect()
    }

    fn destroy(&self, name: &DatasetName, recursive: bool) -> Result<()> {
        info!(dataset = %name, recursive, "Destroying dataset");

        if !self.exists(name)? {
            warn!(dataset = %name, "Dataset not found for destroy");
            return Err(ZfsError::NotFound(name.to_string()));
        }

        let mut args = vec!["destroy"];
        if recursive {
            args.push("-r");
        }
        args.push(name.as_str());
        let argv = self.tools.zfs(args);

        if let Err(e) = self.run_checked(&argv, &Expect::Silent) {
            warn!(dataset = %name, error = %e, "Failed to destroy dataset");
            return Err(e);
        }

        info!(dataset = %name, "Dataset destroyed");
        Ok(())
    }

    fn snapshots_of(&self, name: &DatasetName) -> Result<Vec<Snapshot>> {
        if !self.exists(name)? {
            return Err(ZfsError::NotFound(name.to_string()));
        }

        let argv = self
            .tools
            .zfs(["list", "-H", "-d1", "-r", "-oname", "-tsnapshot", name.as_str()]);
        let output = self.run_checked(&argv, &Expect::QuietStderr)?;

        output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.snapshot(line.trim()))
            .collect()
    }
}

/// Fold `.`/`..` and duplicate separators out of an absolute path.
fn clean_mountpoint(path: &str) -> PathBuf {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    PathBuf::from(format!("/{}", parts.join("/")))
}

/// Operations shared by every dataset handle.
pub trait ZfsObject {
    fn manager(&self) -> &ZfsManager;

    fn name(&self) -> &DatasetName;

    /// Does the dataset exist right now?
    fn exists(&self) -> Result<bool> {
        self.manager().exists(self.name())
    }

    /// Containing filesystem, `None` for a pool.
    fn parent(&self) -> Option<Filesystem> {
        self.name().parent().map(|name| Filesystem {
            zfs: self.manager().clone(),
            name,
        })
    }

    /// Child filesystems, direct ones only unless `recursive`.
    fn children(&self, recursive: bool) -> Result<Vec<Filesystem>> {
        self.manager().children(self.name(), recursive)
    }

    /// Destroy the dataset, with descendants when `recursive`.
    fn destroy(&self, recursive: bool) -> Result<()> {
        self.manager().destroy(self.name(), recursive)
    }

    /// Clear a local property value so it is inherited again.
    fn inherit(&self, key: &str, recursive: bool) -> Result<()> {
        self.manager().inherit(self.name(), key, recursive)
    }
}

impl<T: ZfsObject + ?Sized> Properties for T {
    fn get_property(&self, key: &str) -> Result<String> {
        self.manager().get(self.name(), key)
    }

    fn set_property(&self, key: &str, value: &str) -> Result<()> {
        let value = validate_assignment(key, value, false)?;
        self.manager().set(self.name(), key, &value)
    }
}

// ============================================================================
// Filesystem
// ============================================================================

/// A filesystem or volume.
#[derive(Clone)]
pub struct Filesystem {
    zfs: ZfsManager,
    name: DatasetName,
}

impl ZfsObject for Filesystem {
    fn manager(&self) -> &ZfsManager {
        &self.zfs
    }

    fn name(&self) -> &DatasetName {
        &self.name
    }
}

impl Filesystem {
    /// Create the dataset.
    ///
    /// Returns `None` when it already exists, whether noticed up front or
    /// reported by zfs.
    #[instrument(skip(self), fields(dataset = %self.name))]
    pub fn create(&self, options: &CreateOptions) -> Result<Option<Filesystem>> {
        if self.exists()? {
            info!(dataset = %self.name, "Dataset already exists, not creating");
            return Ok(None);
        }

        let mut assignments = Vec::with_capacity(options.properties.len());
        for (key, value) in &options.properties {
            let value = validate_assignment(key, value, true)?;
            assignments.push(format!("{}={}", key, value));
        }

        let mut args: Vec<String> = vec!["create".into()];
        if options.parents {
            args.push("-p".into());
        }
        if options.volume.is_some() && options.sparse {
            args.push("-s".into());
        }
        for assignment in assignments {
            args.push("-o".into());
            args.push(assignment);
        }
        if let Some(size) = &options.volume {
            let size = validate_assignment("volsize", size, true)?;
            args.push("-V".into());
            args.push(size);
        }
        args.push(self.name.to_string());
        let argv = self.zfs.tools.zfs(&args);

        match self.zfs.execute(&argv, &Expect::Silent)? {
            Verdict::Success(_) => {
                info!(dataset = %self.name, "Dataset created");
                Ok(Some(self.clone()))
            }
            Verdict::AlreadyExists(_) => {
                info!(dataset = %self.name, "Dataset appeared concurrently, not creating");
                Ok(None)
            }
            verdict => {
                let e = ZfsError::command_failed(&argv, verdict.output());
                warn!(dataset = %self.name, error = %e, "Failed to create dataset");
                Err(e)
            }
        }
    }

    /// Dataset at `rel` relative to this one; `@snap` names a snapshot.
    pub fn join(&self, rel: &str) -> Result<Dataset> {
        Ok(self.zfs.dataset(self.name.join(rel)?))
    }

    /// Rename the filesystem; the handle follows the new name.
    #[instrument(skip(self), fields(dataset = %self.name))]
    pub fn rename(&mut self, new_name: &str, parents: bool) -> Result<()> {
        let target = self.zfs.filesystem(new_name)?;
        if target.exists()? {
            return Err(ZfsError::AlreadyExists(target.name.to_string()));
        }

        let mut args = vec!["rename"];
        if parents {
            args.push("-p");
        }
        args.extend([self.name.as_str(), target.name.as_str()]);
        let argv = self.zfs.tools.zfs(args);

        self.zfs.run_checked(&argv, &Expect::Silent)?;

        info!(from = %self.name, to = %target.name, "Filesystem renamed");
        self.name = target.name;
        Ok(())
    }

    /// Take a snapshot, of descendants too when `recursive`.
    #[instrument(skip(self), fields(dataset = %self.name))]
    pub fn snapshot(&self, snap_name: &str, recursive: bool) -> Result<Snapshot> {
        let full = self.name.with_snapshot(snap_name)?;

        if !self.exists()? {
            warn!(dataset = %self.name, "Filesystem not found for snapshot");
            return Err(ZfsError::NotFound(self.name.to_string()));
        }
        if self.zfs.exists(&full)? {
            return Err(ZfsError::AlreadyExists(full.to_string()));
        }

        let mut args = vec!["snapshot"];
        if recursive {
            args.push("-r");
        }
        args.push(full.as_str());
        let argv = self.zfs.tools.zfs(args);

        if let Err(e) = self.zfs.run_checked(&argv, &Expect::Silent) {
            warn!(snapshot = %full, error = %e, "Failed to create snapshot");
            return Err(e);
        }

        info!(snapshot = %full, "Snapshot created");
        Ok(Snapshot {
            zfs: self.zfs.clone(),
            name: full,
        })
    }

    /// Snapshots of this filesystem (not of descendants).
    pub fn snapshots(&self) -> Result<Vec<Snapshot>> {
        self.zfs.snapshots_of(&self.name)
    }

    /// Promote a clone so it no longer depends on its origin snapshot.
    #[instrument(skip(self), fields(dataset = %self.name))]
    pub fn promote(&self) -> Result<()> {
        if self.origin()?.is_none() {
            warn!(dataset = %self.name, "Not a clone, no origin to promote from");
            return Err(ZfsError::NotFound(format!("origin of {}", self.name)));
        }

        let argv = self.zfs.tools.zfs(["promote", self.name.as_str()]);
        self.zfs.run_checked(&argv, &Expect::Silent)?;

        info!(dataset = %self.name, "Clone promoted");
        Ok(())
    }

    /// Register this volume with COMSTAR as a logical unit.
    #[instrument(skip(self), fields(dataset = %self.name))]
    pub fn create_lu(&self) -> Result<LogicalUnit> {
        if !self.exists()? {
            return Err(ZfsError::NotFound(self.name.to_string()));
        }

        let device = self.zfs.tools.zvol_path(self.name.as_str());
        let argv = self.zfs.tools.stmfadm(["create-lu", device.as_str()]);
        let output = self.zfs.runner.run(&argv)?;

        if output.combined().trim().is_empty() {
            return Err(ZfsError::CommandFailed {
                command: command::display_argv(&argv),
                output: "no output from create-lu".to_string(),
            });
        }
        if !output.success() {
            let e = ZfsError::command_failed(&argv, &output);
            warn!(device = %device, error = %e, "Failed to create logical unit");
            return Err(e);
        }

        // "Logical unit created: 600144F0..."
        let guid = output.stdout.split_whitespace().nth(3).ok_or_else(|| {
            ZfsError::ParseError(format!(
                "no logical unit name in create-lu output: {}",
                output.stdout.trim()
            ))
        })?;

        info!(device = %device, lu = guid, "Logical unit created");
        Ok(self.zfs.stmf().logical_unit(guid))
    }
}

impl PartialEq for Filesystem {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Filesystem {}

impl fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filesystem").field("name", &self.name).finish()
    }
}

impl Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Clone)]
pub struct Snapshot {
    zfs: ZfsManager,
    name: DatasetName,
}

impl ZfsObject for Snapshot {
    fn manager(&self) -> &ZfsManager {
        &self.zfs
    }

    fn name(&self) -> &DatasetName {
        &self.name
    }
}

impl Snapshot {
    /// The snapshotted filesystem.
    pub fn filesystem(&self) -> Filesystem {
        Filesystem {
            zfs: self.zfs.clone(),
            name: self.name.without_snapshot(),
        }
    }

    /// Same-named snapshot of a filesystem relative to this one's.
    pub fn join(&self, rel: &str) -> Result<Snapshot> {
        Ok(Snapshot {
            zfs: self.zfs.clone(),
            name: self.name.join(rel)?,
        })
    }

    /// Rename to `<fs>@<new_snap>`; the handle follows the new name.
    #[instrument(skip(self), fields(snapshot = %self.name))]
    pub fn rename(&mut self, new_snap: &str, recursive: bool) -> Result<()> {
        let target = self.name.with_snapshot(new_snap)?;
        if self.zfs.exists(&target)? {
            return Err(ZfsError::AlreadyExists(target.to_string()));
        }

        let mut args = vec!["rename"];
        if recursive {
            args.push("-r");
        }
        args.extend([self.name.as_str(), target.as_str()]);
        let argv = self.zfs.tools.zfs(args);

        self.zfs.run_checked(&argv, &Expect::Silent)?;

        info!(from = %self.name, to = %target, "Snapshot renamed");
        self.name = target;
        Ok(())
    }

    /// Create a writable clone of this snapshot.
    #[instrument(skip(self), fields(snapshot = %self.name))]
    pub fn clone_to(&self, target: &str, parents: bool) -> Result<Filesystem> {
        let clone = self.zfs.filesystem(target)?;
        if clone.exists()? {
            return Err(ZfsError::AlreadyExists(clone.name.to_string()));
        }

        let mut args = vec!["clone"];
        if parents {
            args.push("-p");
        }
        args.extend([self.name.as_str(), clone.name.as_str()]);
        let argv = self.zfs.tools.zfs(args);

        if let Err(e) = self.zfs.run_checked(&argv, &Expect::Silent) {
            warn!(snapshot = %self.name, clone = %clone.name, error = %e, "Failed to clone snapshot");
            return Err(e);
        }

        info!(snapshot = %self.name, clone = %clone.name, "Snapshot cloned");
        Ok(clone)
    }

    /// Replicate this snapshot into `dest` with `zfs send | zfs receive`.
    #[instrument(skip(self), fields(snapshot = %self.name))]
    pub fn send_to(&self, dest: &str, options: &SendOptions) -> Result<()> {
        if options.incremental.is_some() && options.intermediary.is_some() {
            return Err(ZfsError::InvalidArgument(
                "incremental and intermediary sends are mutually exclusive".to_string(),
            ));
        }

        let dest = self.zfs.filesystem(dest)?;
        let source = self.filesystem();

        let base = options
            .incremental
            .as_deref()
            .or(options.intermediary.as_deref());

        let base = match base {
            Some(base) => Some(self.check_incremental_base(&source, &dest, base)?),
            None if options.use_sent_name => {
                if !dest.exists()? {
                    warn!(dest = %dest, "Destination must exist when receiving under the sent name");
                    return Err(ZfsError::NotFound(dest.name.to_string()));
                }
                None
            }
            None => {
                if dest.exists()? {
                    warn!(dest = %dest, "Destination must not exist for a full stream");
                    return Err(ZfsError::AlreadyExists(dest.name.to_string()));
                }
                None
            }
        };

        let mut send_args = vec!["send"];
        if let Some(base) = &base {
            send_args.push(if options.incremental.is_some() { "-i" } else { "-I" });
            send_args.push(base.as_str());
        }
        if options.replication {
            send_args.push("-R");
        }
        send_args.push(self.name.as_str());
        let send = self.zfs.tools.zfs(send_args);

        let mut receive_args = vec!["receive"];
        if options.use_sent_name {
            receive_args.push("-d");
        }
        receive_args.push(dest.name.as_str());
        let receive = self.zfs.tools.zfs(receive_args);

        info!(snapshot = %self.name, dest = %dest, "Sending snapshot");
        let (sent, received) = self.zfs.runner.pipe(&send, &receive)?;

        if !sent.success() || !sent.stderr.is_empty() {
            let e = ZfsError::command_failed(&send, &sent);
            warn!(snapshot = %self.name, error = %e, "zfs send failed");
            return Err(e);
        }
        if !received.success() {
            let e = ZfsError::command_failed(&receive, &received);
            warn!(dest = %dest, error = %e, "zfs receive failed");
            return Err(e);
        }

        info!(snapshot = %self.name, dest = %dest, "Snapshot sent");
        Ok(())
    }

    /// Resolve and check the base snapshot of an incremental stream.
    fn check_incremental_base(
        &self,
        source: &Filesystem,
        dest: &Filesystem,
        base: &str,
    ) -> Result<DatasetName> {
        let base = if base.starts_with('@') {
            source.name.with_snapshot(base)?
        } else {
            let base = DatasetName::parse(base)?;
            if base.filesystem() != source.name.as_str() || !base.is_snapshot() {
                return Err(ZfsError::InvalidArgument(format!(
                    "incremental snapshot must be in the same filesystem as {}",
                    self.name
                )));
            }
            base
        };
        let short = base.snapshot().unwrap_or_default();

        if !dest.exists()? {
            warn!(dest = %dest, "Destination must exist for an incremental stream");
            return Err(ZfsError::NotFound(dest.name.to_string()));
        }
        if !source.snapshots()?.iter().any(|s| s.name == base) {
            return Err(ZfsError::NotFound(base.to_string()));
        }
        let counterpart = dest.name.with_snapshot(short)?;
        if !dest.snapshots()?.iter().any(|s| s.name == counterpart) {
            return Err(ZfsError::NotFound(counterpart.to_string()));
        }

        Ok(base)
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Snapshot {}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("name", &self.name).finish()
    }
}

impl Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// Either kind of dataset handle, as returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dataset {
    Filesystem(Filesystem),
    Snapshot(Snapshot),
}

impl Dataset {
    pub fn as_filesystem(&self) -> Option<&Filesystem> {
        match self {
            Dataset::Filesystem(fs) => Some(fs),
            Dataset::Snapshot(_) => None,
        }
    }

    pub fn as_snapshot(&self) -> Option<&Snapshot> {
        match self {
            Dataset::Snapshot(snap) => Some(snap),
            Dataset::Filesystem(_) => None,
        }
    }
}

impl ZfsObject for Dataset {
    fn manager(&self) -> &ZfsManager {
        match self {
            Dataset::Filesystem(fs) => fs.manager(),
            Dataset::Snapshot(snap) => snap.manager(),
        }
    }

    fn name(&self) -> &DatasetName {
        match self {
            Dataset::Filesystem(fs) => fs.name(),
            Dataset::Snapshot(snap) => snap.name(),
        }
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::mock::{MockRunner, fail, ok, silent};
    use crate::zfs::properties::Switch;

    fn manager(runner: &Arc<MockRunner>) -> ZfsManager {
        ZfsManager::with_runner(Tools::default(), runner.clone())
    }

    fn missing(name: &str) -> CommandOutput {
        fail(&format!("cannot open '{}': dataset does not exist\n", name))
    }

    #[test]
    fn test_exists() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], ok("tank/a\n"))
                .expect(&["zfs", "list", "-H", "-oname", "tank/b"], missing("tank/b")),
        );
        let zfs = manager(&runner);

        assert!(zfs.filesystem("tank/a").unwrap().exists().unwrap());
        assert!(!zfs.filesystem("tank/b").unwrap().exists().unwrap());
        runner.assert_done();
    }

    #[test]
    fn test_handle_constructors() {
        let runner = Arc::new(MockRunner::new());
        let zfs = manager(&runner);

        assert!(matches!(zfs.filesystem("tank/a@s"), Err(ZfsError::InvalidName(_))));
        assert!(matches!(zfs.snapshot("tank/a"), Err(ZfsError::InvalidName(_))));
        assert!(matches!(
            zfs.open("tank/a@s").unwrap(),
            Dataset::Snapshot(_)
        ));
        assert!(matches!(
            zfs.open("tank/a/").unwrap(),
            Dataset::Filesystem(_)
        ));
    }

    #[test]
    fn test_equality_by_type_and_name() {
        let runner = Arc::new(MockRunner::new());
        let zfs = manager(&runner);

        let a = zfs.open("tank/a").unwrap();
        let b = Dataset::Filesystem(zfs.filesystem("tank/a").unwrap());
        assert_eq!(a, b);
        assert_ne!(a, zfs.open("tank/b").unwrap());
        assert_eq!(
            zfs.snapshot("tank/a@s").unwrap().filesystem(),
            zfs.filesystem("tank/a").unwrap()
        );
    }

    #[test]
    fn test_parent() {
        let runner = Arc::new(MockRunner::new());
        let zfs = manager(&runner);

        let fs = zfs.filesystem("tank/a/b").unwrap();
        assert_eq!(fs.parent().unwrap().to_string(), "tank/a");
        let snap = zfs.snapshot("tank/a@s").unwrap();
        assert_eq!(snap.parent().unwrap().to_string(), "tank/a");
        assert!(zfs.filesystem("tank").unwrap().parent().is_none());
    }

    #[test]
    fn test_create_filesystem() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], missing("tank/a"))
                .expect(
                    &["zfs", "create", "-p", "-o", "atime=off", "tank/a"],
                    silent(),
                ),
        );
        let zfs = manager(&runner);

        let options = CreateOptions {
            parents: true,
            properties: vec![("atime".into(), "false".into())],
            ..Default::default()
        };
        let created = zfs.filesystem("tank/a").unwrap().create(&options).unwrap();
        assert_eq!(created.unwrap().to_string(), "tank/a");
        runner.assert_done();
    }

    #[test]
    fn test_create_sparse_volume() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/v"], missing("tank/v"))
                .expect(
                    &[
                        "zfs",
                        "create",
                        "-s",
                        "-o",
                        "volblocksize=8192",
                        "-V",
                        "10G",
                        "tank/v",
                    ],
                    silent(),
                ),
        );
        let zfs = manager(&runner);

        let options = CreateOptions {
            volume: Some("10G".into()),
            sparse: true,
            properties: vec![("volblocksize".into(), "8192".into())],
            ..Default::default()
        };
        assert!(zfs.filesystem("tank/v").unwrap().create(&options).unwrap().is_some());
        runner.assert_done();
    }

    #[test]
    fn test_create_existing_returns_none() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], ok("tank/a\n"))
                .expect(&["zfs", "list", "-H", "-oname", "tank/b"], missing("tank/b"))
                .expect(
                    &["zfs", "create", "tank/b"],
                    fail("cannot create 'tank/b': dataset already exists\n"),
                ),
        );
        let zfs = manager(&runner);

        let options = CreateOptions::default();
        assert!(zfs.filesystem("tank/a").unwrap().create(&options).unwrap().is_none());
        assert!(zfs.filesystem("tank/b").unwrap().create(&options).unwrap().is_none());
        runner.assert_done();
    }

    #[test]
    fn test_create_failure_carries_output() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "nope/a"], missing("nope/a"))
                .expect(
                    &["zfs", "create", "nope/a"],
                    fail("cannot create 'nope/a': no such pool 'nope'\n"),
                ),
        );
        let zfs = manager(&runner);

        match zfs.filesystem("nope/a").unwrap().create(&CreateOptions::default()) {
            Err(ZfsError::CommandFailed { command, output }) => {
                assert_eq!(command, "zfs create nope/a");
                assert!(output.contains("no such pool"));
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
        runner.assert_done();
    }

    #[test]
    fn test_create_rejects_read_only_property() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zfs", "list", "-H", "-oname", "tank/a"], missing("tank/a")),
        );
        let zfs = manager(&runner);

        let options = CreateOptions {
            properties: vec![("used".into(), "1".into())],
            ..Default::default()
        };
        assert!(matches!(
            zfs.filesystem("tank/a").unwrap().create(&options),
            Err(ZfsError::PropertyReadOnly(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_destroy() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], ok("tank/a\n"))
                .expect(&["zfs", "destroy", "-r", "tank/a"], silent())
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], missing("tank/a")),
        );
        let zfs = manager(&runner);
        let fs = zfs.filesystem("tank/a").unwrap();

        fs.destroy(true).unwrap();
        assert!(matches!(fs.destroy(false), Err(ZfsError::NotFound(_))));
        runner.assert_done();
    }

    #[test]
    fn test_children() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank"], ok("tank\n"))
                .expect(
                    &["zfs", "list", "-H", "-r", "-oname", "-tfilesystem", "-d1", "tank"],
                    ok("tank\ntank/a\ntank/b\n"),
                ),
        );
        let zfs = manager(&runner);

        let children = zfs.filesystem("tank").unwrap().children(false).unwrap();
        let names: Vec<String> = children.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["tank/a", "tank/b"]);
        runner.assert_done();
    }

    #[test]
    fn test_get_property() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(
                    &["zfs", "get", "-ovalue", "-Hp", "used", "tank/a"],
                    ok("123456\n"),
                )
                .expect(
                    &["zfs", "get", "-ovalue", "-Hp", "compression", "tank/a"],
                    ok("lz4\n"),
                )
                .expect(
                    &["zfs", "get", "-ovalue", "-Hp", "used", "tank/x"],
                    missing("tank/x"),
                ),
        );
        let zfs = manager(&runner);
        let fs = zfs.filesystem("tank/a").unwrap();

        assert_eq!(fs.used().unwrap(), 123456);
        assert_eq!(fs.compression().unwrap(), Switch::Value("lz4".into()));
        assert!(matches!(
            zfs.filesystem("tank/x").unwrap().used(),
            Err(ZfsError::CommandFailed { .. })
        ));
        runner.assert_done();
    }

    #[test]
    fn test_get_property_rejects_multiline() {
        let runner = Arc::new(MockRunner::new().expect(
            &["zfs", "get", "-ovalue", "-Hp", "used", "tank"],
            ok("1\n2\n"),
        ));
        let zfs = manager(&runner);

        assert!(matches!(
            zfs.filesystem("tank").unwrap().get_property("used"),
            Err(ZfsError::CommandFailed { .. })
        ));
        runner.assert_done();
    }

    #[test]
    fn test_set_property() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "set", "readonly=on", "tank/a"], silent())
                .expect(
                    &["zfs", "set", "quota=1G", "tank/a"],
                    fail("cannot set property for 'tank/a': size is less than current used\n"),
                ),
        );
        let zfs = manager(&runner);
        let fs = zfs.filesystem("tank/a").unwrap();

        fs.set_readonly(true).unwrap();
        assert!(matches!(
            fs.set_property("quota", "1G"),
            Err(ZfsError::CommandFailed { .. })
        ));
        // Rejected before any command runs
        assert!(matches!(
            fs.set_property("creation", "0"),
            Err(ZfsError::PropertyReadOnly(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_inherit() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "inherit", "-r", "compression", "tank/a"], silent()),
        );
        let zfs = manager(&runner);
        let fs = zfs.filesystem("tank/a").unwrap();

        fs.inherit("compression", true).unwrap();
        assert!(matches!(
            fs.inherit("quota", false),
            Err(ZfsError::InvalidArgument(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_pools() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zpool", "list", "-Honame"], ok("rpool\ntank\n")),
        );
        let zfs = manager(&runner);

        let pools: Vec<String> = zfs.pools().unwrap().iter().map(|p| p.to_string()).collect();
        assert_eq!(pools, vec!["rpool", "tank"]);
        runner.assert_done();
    }

    #[test]
    fn test_mounts_and_open_path() {
        let table = "rpool\t/rpool\nrpool/ROOT\tlegacy\ntank\t/tank\ntank/a\t/export/a\ntank/v\t-\n";
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "get", "-rHp", "-oname,value", "mountpoint"], ok(table))
                .expect(&["zfs", "get", "-rHp", "-oname,value", "mountpoint"], ok(table))
                .expect(&["zfs", "get", "-rHp", "-oname,value", "mountpoint"], ok(table)),
        );
        let zfs = manager(&runner);

        let mounts = zfs.mounts().unwrap();
        assert_eq!(mounts.len(), 3);
        assert_eq!(mounts[&PathBuf::from("/export/a")].to_string(), "tank/a");

        assert_eq!(zfs.open("/export/./a/").unwrap().to_string(), "tank/a");
        assert!(matches!(zfs.open("/nowhere"), Err(ZfsError::NotFound(_))));
        runner.assert_done();
    }

    #[test]
    fn test_rename_filesystem() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/b"], missing("tank/b"))
                .expect(&["zfs", "rename", "-p", "tank/a", "tank/b"], silent())
                .expect(&["zfs", "list", "-H", "-oname", "tank/c"], ok("tank/c\n")),
        );
        let zfs = manager(&runner);

        let mut fs = zfs.filesystem("tank/a").unwrap();
        fs.rename("tank/b", true).unwrap();
        assert_eq!(fs.to_string(), "tank/b");
        assert!(matches!(
            fs.rename("tank/c", false),
            Err(ZfsError::AlreadyExists(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_snapshot() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], ok("tank/a\n"))
                .expect(
                    &["zfs", "list", "-H", "-oname", "tank/a@daily"],
                    missing("tank/a@daily"),
                )
                .expect(&["zfs", "snapshot", "-r", "tank/a@daily"], silent())
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], ok("tank/a\n"))
                .expect(
                    &["zfs", "list", "-H", "-oname", "tank/a@daily"],
                    ok("tank/a@daily\n"),
                ),
        );
        let zfs = manager(&runner);
        let fs = zfs.filesystem("tank/a").unwrap();

        let snap = fs.snapshot("daily", true).unwrap();
        assert_eq!(snap.to_string(), "tank/a@daily");
        assert!(matches!(
            fs.snapshot("daily", false),
            Err(ZfsError::AlreadyExists(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_snapshots() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], ok("tank/a\n"))
                .expect(
                    &["zfs", "list", "-H", "-d1", "-r", "-oname", "-tsnapshot", "tank/a"],
                    ok("tank/a@one\ntank/a@two\n"),
                ),
        );
        let zfs = manager(&runner);

        let snaps = zfs.filesystem("tank/a").unwrap().snapshots().unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[1].to_string(), "tank/a@two");
        runner.assert_done();
    }

    #[test]
    fn test_promote() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(
                    &["zfs", "get", "-ovalue", "-Hp", "origin", "tank/clone"],
                    ok("tank/a@base\n"),
                )
                .expect(&["zfs", "promote", "tank/clone"], silent())
                .expect(&["zfs", "get", "-ovalue", "-Hp", "origin", "tank/a"], ok("-\n")),
        );
        let zfs = manager(&runner);

        zfs.filesystem("tank/clone").unwrap().promote().unwrap();
        assert!(matches!(
            zfs.filesystem("tank/a").unwrap().promote(),
            Err(ZfsError::NotFound(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_rename_snapshot() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(
                    &["zfs", "list", "-H", "-oname", "tank/a@new"],
                    missing("tank/a@new"),
                )
                .expect(&["zfs", "rename", "tank/a@old", "tank/a@new"], silent()),
        );
        let zfs = manager(&runner);

        let mut snap = zfs.snapshot("tank/a@old").unwrap();
        snap.rename("new", false).unwrap();
        assert_eq!(snap.to_string(), "tank/a@new");
        runner.assert_done();
    }

    #[test]
    fn test_clone_to() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/c"], missing("tank/c"))
                .expect(&["zfs", "clone", "-p", "tank/a@s", "tank/c"], silent()),
        );
        let zfs = manager(&runner);

        let clone = zfs.snapshot("tank/a@s").unwrap().clone_to("tank/c", true).unwrap();
        assert_eq!(clone, zfs.filesystem("tank/c").unwrap());
        runner.assert_done();
    }

    #[test]
    fn test_send_full_stream() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "backup/a"], missing("backup/a"))
                .expect_pipe(
                    &["zfs", "send", "-R", "tank/a@s"],
                    &["zfs", "receive", "backup/a"],
                    silent(),
                    silent(),
                ),
        );
        let zfs = manager(&runner);

        let options = SendOptions {
            replication: true,
            ..Default::default()
        };
        zfs.snapshot("tank/a@s").unwrap().send_to("backup/a", &options).unwrap();
        runner.assert_done();
    }

    #[test]
    fn test_send_full_stream_requires_fresh_destination() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zfs", "list", "-H", "-oname", "backup/a"], ok("backup/a\n")),
        );
        let zfs = manager(&runner);

        assert!(matches!(
            zfs.snapshot("tank/a@s")
                .unwrap()
                .send_to("backup/a", &SendOptions::default()),
            Err(ZfsError::AlreadyExists(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_send_incremental() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "backup/a"], ok("backup/a\n"))
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], ok("tank/a\n"))
                .expect(
                    &["zfs", "list", "-H", "-d1", "-r", "-oname", "-tsnapshot", "tank/a"],
                    ok("tank/a@one\ntank/a@two\n"),
                )
                .expect(&["zfs", "list", "-H", "-oname", "backup/a"], ok("backup/a\n"))
                .expect(
                    &["zfs", "list", "-H", "-d1", "-r", "-oname", "-tsnapshot", "backup/a"],
                    ok("backup/a@one\n"),
                )
                .expect_pipe(
                    &["zfs", "send", "-i", "tank/a@one", "tank/a@two"],
                    &["zfs", "receive", "backup/a"],
                    silent(),
                    silent(),
                ),
        );
        let zfs = manager(&runner);

        let options = SendOptions {
            incremental: Some("@one".into()),
            ..Default::default()
        };
        zfs.snapshot("tank/a@two").unwrap().send_to("backup/a", &options).unwrap();
        runner.assert_done();
    }

    #[test]
    fn test_send_rejects_bad_options() {
        let runner = Arc::new(MockRunner::new());
        let zfs = manager(&runner);
        let snap = zfs.snapshot("tank/a@two").unwrap();

        let both = SendOptions {
            incremental: Some("@one".into()),
            intermediary: Some("@one".into()),
            ..Default::default()
        };
        assert!(matches!(
            snap.send_to("backup/a", &both),
            Err(ZfsError::InvalidArgument(_))
        ));

        let foreign = SendOptions {
            intermediary: Some("other/fs@one".into()),
            ..Default::default()
        };
        assert!(matches!(
            snap.send_to("backup/a", &foreign),
            Err(ZfsError::InvalidArgument(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_send_reports_receive_failure() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank"], ok("tank\n"))
                .expect_pipe(
                    &["zfs", "send", "tank/a@s"],
                    &["zfs", "receive", "-d", "tank"],
                    silent(),
                    fail("cannot receive: destination has been modified\n"),
                ),
        );
        let zfs = manager(&runner);

        let options = SendOptions {
            use_sent_name: true,
            ..Default::default()
        };
        match zfs.snapshot("tank/a@s").unwrap().send_to("tank", &options) {
            Err(ZfsError::CommandFailed { command, .. }) => {
                assert_eq!(command, "zfs receive -d tank")
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
        runner.assert_done();
    }

    #[test]
    fn test_create_lu() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/v"], ok("tank/v\n"))
                .expect(
                    &["stmfadm", "create-lu", "/dev/zvol/dsk/tank/v"],
                    ok("Logical unit created: 600144F0C73ABF0000005C3E6C6B0001\n"),
                ),
        );
        let zfs = manager(&runner);

        let lu = zfs.filesystem("tank/v").unwrap().create_lu().unwrap();
        assert_eq!(lu.name(), "600144F0C73ABF0000005C3E6C6B0001");
        runner.assert_done();
    }

    #[test]
    fn test_create_lu_without_output_fails() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "tank/v"], ok("tank/v\n"))
                .expect(&["stmfadm", "create-lu", "/dev/zvol/dsk/tank/v"], silent()),
        );
        let zfs = manager(&runner);

        assert!(matches!(
            zfs.filesystem("tank/v").unwrap().create_lu(),
            Err(ZfsError::CommandFailed { .. })
        ));
        runner.assert_done();
    }

    #[test]
    fn test_open_folds_relative_components() {
        let runner = Arc::new(MockRunner::new());
        let zfs = manager(&runner);

        assert_eq!(zfs.open("tank/a/./b").unwrap(), zfs.open("tank/a/b").unwrap());
        assert_eq!(zfs.open("tank/a/../b").unwrap(), zfs.open("tank/b").unwrap());
        assert!(matches!(
            zfs.open("tank/a/../b@s").unwrap(),
            Dataset::Snapshot(_)
        ));
        assert!(matches!(zfs.open("tank/.."), Err(ZfsError::InvalidName(_))));
        runner.assert_done();
    }

    #[test]
    fn test_children_of_missing_dataset() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zfs", "list", "-H", "-oname", "tank/gone"], missing("tank/gone")),
        );
        let zfs = manager(&runner);

        assert!(matches!(
            zfs.filesystem("tank/gone").unwrap().children(false),
            Err(ZfsError::NotFound(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_snapshots_of_missing_dataset() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zfs", "list", "-H", "-oname", "tank/gone"], missing("tank/gone")),
        );
        let zfs = manager(&runner);

        assert!(matches!(
            zfs.filesystem("tank/gone").unwrap().snapshots(),
            Err(ZfsError::NotFound(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_rename_snapshot_onto_existing() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zfs", "list", "-H", "-oname", "tank/a@new"], ok("tank/a@new\n")),
        );
        let zfs = manager(&runner);

        let mut snap = zfs.snapshot("tank/a@old").unwrap();
        assert!(matches!(
            snap.rename("new", false),
            Err(ZfsError::AlreadyExists(_))
        ));
        assert_eq!(snap.to_string(), "tank/a@old");
        runner.assert_done();
    }

    #[test]
    fn test_clone_to_existing_target() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zfs", "list", "-H", "-oname", "tank/c"], ok("tank/c\n")),
        );
        let zfs = manager(&runner);

        assert!(matches!(
            zfs.snapshot("tank/a@s").unwrap().clone_to("tank/c", false),
            Err(ZfsError::AlreadyExists(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_send_incremental_requires_destination() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zfs", "list", "-H", "-oname", "backup/a"], missing("backup/a")),
        );
        let zfs = manager(&runner);

        let options = SendOptions {
            incremental: Some("@one".into()),
            ..Default::default()
        };
        match zfs.snapshot("tank/a@two").unwrap().send_to("backup/a", &options) {
            Err(ZfsError::NotFound(name)) => assert_eq!(name, "backup/a"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        runner.assert_done();
    }

    #[test]
    fn test_send_incremental_requires_source_base() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "backup/a"], ok("backup/a\n"))
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], ok("tank/a\n"))
                .expect(
                    &["zfs", "list", "-H", "-d1", "-r", "-oname", "-tsnapshot", "tank/a"],
                    ok("tank/a@two\n"),
                ),
        );
        let zfs = manager(&runner);

        let options = SendOptions {
            incremental: Some("@one".into()),
            ..Default::default()
        };
        match zfs.snapshot("tank/a@two").unwrap().send_to("backup/a", &options) {
            Err(ZfsError::NotFound(name)) => assert_eq!(name, "tank/a@one"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        runner.assert_done();
    }

    #[test]
    fn test_send_incremental_requires_destination_counterpart() {
        let runner = Arc::new(
            MockRunner::new()
                .expect(&["zfs", "list", "-H", "-oname", "backup/a"], ok("backup/a\n"))
                .expect(&["zfs", "list", "-H", "-oname", "tank/a"], ok("tank/a\n"))
                .expect(
                    &["zfs", "list", "-H", "-d1", "-r", "-oname", "-tsnapshot", "tank/a"],
                    ok("tank/a@one\ntank/a@two\n"),
                )
                .expect(&["zfs", "list", "-H", "-oname", "backup/a"], ok("backup/a\n"))
                .expect(
                    &["zfs", "list", "-H", "-d1", "-r", "-oname", "-tsnapshot", "backup/a"],
                    ok("backup/a@zero\n"),
                ),
        );
        let zfs = manager(&runner);

        let options = SendOptions {
            intermediary: Some("tank/a@one".into()),
            ..Default::default()
        };
        match zfs.snapshot("tank/a@two").unwrap().send_to("backup/a", &options) {
            Err(ZfsError::NotFound(name)) => assert_eq!(name, "backup/a@one"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        runner.assert_done();
    }

    #[test]
    fn test_send_under_sent_name_requires_destination() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zfs", "list", "-H", "-oname", "backup"], missing("backup")),
        );
        let zfs = manager(&runner);

        let options = SendOptions {
            use_sent_name: true,
            ..Default::default()
        };
        assert!(matches!(
            zfs.snapshot("tank/a@s").unwrap().send_to("backup", &options),
            Err(ZfsError::NotFound(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_create_lu_on_missing_volume() {
        let runner = Arc::new(
            MockRunner::new().expect(&["zfs", "list", "-H", "-oname", "tank/v"], missing("tank/v")),
        );
        let zfs = manager(&runner);

        assert!(matches!(
            zfs.filesystem("tank/v").unwrap().create_lu(),
            Err(ZfsError::NotFound(_))
        ));
        runner.assert_done();
    }

    #[test]
    fn test_clean_mountpoint() {
        assert_eq!(clean_mountpoint("/export//a/./b/.."), PathBuf::from("/export/a"));
        assert_eq!(clean_mountpoint("/"), PathBuf::from("/"));
    }
}
