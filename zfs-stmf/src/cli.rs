//! Command-line front end.
//!
//! Each subcommand maps onto one library operation. Results go to the given
//! writer, as plain text or, with `--json`, one JSON document per command.

use std::collections::BTreeMap;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{DEFAULT_ZVOL_DIR, Tools, parse_prefix};
use crate::stmf::{Group, GroupKind, StmfManager};
use crate::zfs::properties::{self, PROPERTIES, Properties};
use crate::zfs::{CreateOptions, Dataset, SendOptions, ZfsError, ZfsManager, ZfsObject};

pub type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "zfs-stmf", version)]
#[command(about = "Manage ZFS datasets and COMSTAR SCSI targets")]
pub struct Cli {
    /// Command used to run zfs (e.g. "pfexec zfs")
    #[arg(long, env = "ZFS_STMF_ZFS", default_value = "zfs", value_parser = tool_command)]
    pub zfs: String,

    /// Command used to run zpool
    #[arg(long, env = "ZFS_STMF_ZPOOL", default_value = "zpool", value_parser = tool_command)]
    pub zpool: String,

    /// Command used to run stmfadm
    #[arg(long, env = "ZFS_STMF_STMFADM", default_value = "stmfadm", value_parser = tool_command)]
    pub stmfadm: String,

    /// Command used to run itadm
    #[arg(long, env = "ZFS_STMF_ITADM", default_value = "itadm", value_parser = tool_command)]
    pub itadm: String,

    /// Directory holding zvol device nodes
    #[arg(long, env = "ZFS_STMF_ZVOL_DIR", default_value = DEFAULT_ZVOL_DIR)]
    pub zvol_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn tools(&self) -> Tools {
        let split = |s: &str| s.split_whitespace().map(str::to_string).collect();
        Tools {
            zfs: split(&self.zfs),
            zpool: split(&self.zpool),
            stmfadm: split(&self.stmfadm),
            itadm: split(&self.itadm),
            zvol_dir: self.zvol_dir.clone(),
        }
    }
}

fn tool_command(s: &str) -> Result<String, String> {
    parse_prefix(s).map(|_| s.to_string())
}

/// Parse a `name=value` assignment.
fn assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{}'", s)),
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List imported pools
    Pools,

    /// List mounted datasets by mountpoint
    Mounts,

    /// Report whether a dataset exists
    Exists {
        /// Dataset name or mountpoint path
        dataset: String,
    },

    /// List child filesystems
    List {
        dataset: String,

        /// Include all descendants
        #[arg(short, long)]
        recursive: bool,
    },

    /// Create a filesystem or volume
    Create {
        dataset: String,

        /// Create missing parents
        #[arg(short, long)]
        parents: bool,

        /// Create a sparse volume (no reservation)
        #[arg(short, long, requires = "volume")]
        sparse: bool,

        /// Create a volume of this size
        #[arg(short = 'V', long, value_name = "SIZE")]
        volume: Option<String>,

        /// Set a property at creation
        #[arg(short = 'o', long = "property", value_name = "NAME=VALUE", value_parser = assignment)]
        properties: Vec<(String, String)>,
    },

    /// Destroy a dataset
    Destroy {
        dataset: String,

        /// Destroy descendants too
        #[arg(short, long)]
        recursive: bool,
    },

    /// Print a property value
    Get { dataset: String, property: String },

    /// Set a property
    Set {
        dataset: String,

        #[arg(value_name = "NAME=VALUE", value_parser = assignment)]
        assignment: (String, String),
    },

    /// List the known native properties
    Properties,

    /// Take a snapshot (fs@snap)
    Snapshot {
        snapshot: String,

        /// Snapshot descendants too
        #[arg(short, long)]
        recursive: bool,
    },

    /// List snapshots of a filesystem
    Snapshots { dataset: String },

    /// Rename a filesystem or snapshot
    Rename {
        from: String,

        /// New filesystem name, or new snapshot name
        to: String,

        /// Create missing parents (filesystems)
        #[arg(short, long, conflicts_with = "recursive")]
        parents: bool,

        /// Rename same-named descendant snapshots (snapshots)
        #[arg(short, long)]
        recursive: bool,
    },

    /// Clone a snapshot into a new filesystem
    Clone {
        snapshot: String,
        target: String,

        /// Create missing parents
        #[arg(short, long)]
        parents: bool,
    },

    /// Promote a clone
    Promote { dataset: String },

    /// Send a snapshot into another dataset
    Send {
        snapshot: String,
        dest: String,

        /// Incremental from this snapshot (@name or fs@name)
        #[arg(short = 'i', long, conflicts_with = "intermediary")]
        incremental: Option<String>,

        /// Incremental including intermediate snapshots
        #[arg(short = 'I', long)]
        intermediary: Option<String>,

        /// Replicate descendants and properties
        #[arg(short = 'R', long)]
        replication: bool,

        /// Receive under the sent name below the destination
        #[arg(short = 'd', long)]
        use_sent_name: bool,
    },

    /// Logical units
    Lu {
        #[command(subcommand)]
        command: LuCommand,
    },

    /// iSCSI targets
    Target {
        #[command(subcommand)]
        command: TargetCommand,
    },

    /// Target groups
    Tg {
        #[command(subcommand)]
        command: GroupCommand,
    },

    /// Host groups
    Hg {
        #[command(subcommand)]
        command: GroupCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum LuCommand {
    /// List logical units
    List,

    /// Register a volume as a logical unit
    Create { volume: String },

    Exists { lu: String },

    Delete { lu: String },

    /// Expose a logical unit
    AddView {
        lu: String,

        /// LUN to use, chosen automatically when omitted
        #[arg(short = 'n', long)]
        lun: Option<u32>,

        /// Limit to targets in this group
        #[arg(short, long)]
        target_group: Option<String>,

        /// Limit to initiators in this group
        #[arg(long)]
        host_group: Option<String>,
    },

    /// List view entries of a logical unit
    Views { lu: String },

    /// Remove all view entries of a logical unit
    RemoveViews { lu: String },
}

#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// Create a target, letting itadm pick the name if none is given
    Create { name: Option<String> },

    Delete { name: String },

    Exists { name: String },

    Online { name: String },

    Offline { name: String },
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    Create { name: String },

    Delete { name: String },

    Exists { name: String },

    AddMember { name: String, member: String },

    RemoveMember { name: String, member: String },

    Members { name: String },
}

impl GroupCommand {
    fn name(&self) -> &str {
        match self {
            GroupCommand::Create { name }
            | GroupCommand::Delete { name }
            | GroupCommand::Exists { name }
            | GroupCommand::AddMember { name, .. }
            | GroupCommand::RemoveMember { name, .. }
            | GroupCommand::Members { name } => name,
        }
    }
}

/// Writes command results in the selected format.
struct Printer<'a> {
    json: bool,
    out: &'a mut dyn Write,
}

impl Printer<'_> {
    /// Print `value` as JSON, or `text` (skipped when empty).
    fn print<T: Serialize + ?Sized>(&mut self, value: &T, text: &str) -> CliResult {
        if self.json {
            serde_json::to_writer(&mut *self.out, value)?;
            writeln!(self.out)?;
        } else if !text.is_empty() {
            writeln!(self.out, "{}", text)?;
        }
        Ok(())
    }

    fn names<T: ToString>(&mut self, items: &[T]) -> CliResult {
        let names: Vec<String> = items.iter().map(ToString::to_string).collect();
        self.print(&names, &names.join("\n"))
    }

    fn flag(&mut self, value: bool) -> CliResult {
        self.print(&value, &value.to_string())
    }
}

/// Run the parsed command line against the real tools.
pub fn run(cli: Cli, out: &mut dyn Write) -> CliResult {
    let zfs = ZfsManager::new(cli.tools());
    debug!(tools = ?zfs.tools(), "Configured tools");

    let mut printer = Printer {
        json: cli.json,
        out,
    };
    dispatch(cli.command, &zfs, &mut printer)
}

fn dispatch(command: Command, zfs: &ZfsManager, printer: &mut Printer<'_>) -> CliResult {
    match command {
        Command::Pools => printer.names(&zfs.pools()?),
        Command::Mounts => {
            let mounts: BTreeMap<String, String> = zfs
                .mounts()?
                .iter()
                .map(|(path, dataset)| (path.display().to_string(), dataset.to_string()))
                .collect();
            let text: Vec<String> = mounts
                .iter()
                .map(|(path, dataset)| format!("{}\t{}", path, dataset))
                .collect();
            printer.print(&mounts, &text.join("\n"))
        }
        Command::Exists { dataset } => printer.flag(zfs.open(&dataset)?.exists()?),
        Command::List { dataset, recursive } => {
            printer.names(&zfs.open(&dataset)?.children(recursive)?)
        }
        Command::Create {
            dataset,
            parents,
            sparse,
            volume,
            properties,
        } => {
            let options = CreateOptions {
                parents,
                volume,
                sparse,
                properties,
            };
            let created = zfs.filesystem(&dataset)?.create(&options)?;
            if created.is_none() {
                warn!(dataset = %dataset, "Dataset already exists");
            }
            let text = created.as_ref().map(ToString::to_string).unwrap_or_default();
            printer.print(
                &json!({ "dataset": dataset, "created": created.is_some() }),
                &text,
            )
        }
        Command::Destroy { dataset, recursive } => zfs.open(&dataset)?.destroy(recursive).map_err(Into::into),
        Command::Get { dataset, property } => {
            let dataset = zfs.open(&dataset)?;
            let raw = dataset.get_property(&property)?;
            if !printer.json {
                return printer.print(&raw, &raw);
            }
            // zfs prints "-" where a property does not apply to the dataset
            let value = match properties::lookup(&property).map(|def| def.parse(&raw)) {
                _ if raw == "-" => serde_json::Value::Null,
                Some(Ok(typed)) => serde_json::to_value(typed)?,
                Some(Err(_)) | None => serde_json::Value::String(raw.clone()),
            };
            printer.print(
                &json!({ "dataset": dataset.to_string(), "property": property, "value": value }),
                &raw,
            )
        }
        Command::Set {
            dataset,
            assignment: (key, value),
        } => zfs.open(&dataset)?.set_property(&key, &value).map_err(Into::into),
        Command::Properties => {
            let text: Vec<String> = PROPERTIES
                .iter()
                .map(|def| {
                    format!(
                        "{:<22}{:<10}{:<12}{:<5}{}",
                        def.name,
                        label(&def.kind),
                        label(&def.access),
                        if def.inheritable { "yes" } else { "no" },
                        def.values.join(",")
                    )
                })
                .collect();
            printer.print(PROPERTIES, &text.join("\n"))
        }
        Command::Snapshot { snapshot, recursive } => {
            let target = zfs.snapshot(&snapshot)?;
            let short = target.name().snapshot().unwrap_or_default();
            let created = target.filesystem().snapshot(short, recursive)?;
            printer.print(&created.to_string(), &created.to_string())
        }
        Command::Snapshots { dataset } => printer.names(&zfs.filesystem(&dataset)?.snapshots()?),
        Command::Rename {
            from,
            to,
            parents,
            recursive,
        } => {
            let renamed = match zfs.open(&from)? {
                Dataset::Filesystem(mut fs) => {
                    if recursive {
                        return Err(ZfsError::InvalidArgument(
                            "-r only applies to snapshots".into(),
                        )
                        .into());
                    }
                    fs.rename(&to, parents)?;
                    fs.to_string()
                }
                Dataset::Snapshot(mut snap) => {
                    if parents {
                        return Err(ZfsError::InvalidArgument(
                            "-p only applies to filesystems".into(),
                        )
                        .into());
                    }
                    let new_snap = match to.rsplit_once('@') {
                        Some((fs, new_snap)) if fs.is_empty() || fs == snap.name().filesystem() => {
                            new_snap
                        }
                        Some(_) => {
                            return Err(ZfsError::InvalidArgument(format!(
                                "snapshots cannot move between filesystems: {} -> {}",
                                snap, to
                            ))
                            .into());
                        }
                        None => to.as_str(),
                    };
                    snap.rename(new_snap, recursive)?;
                    snap.to_string()
                }
            };
            printer.print(&renamed, &renamed)
        }
        Command::Clone {
            snapshot,
            target,
            parents,
        } => {
            let clone = zfs.snapshot(&snapshot)?.clone_to(&target, parents)?;
            printer.print(&clone.to_string(), &clone.to_string())
        }
        Command::Promote { dataset } => zfs.filesystem(&dataset)?.promote().map_err(Into::into),
        Command::Send {
            snapshot,
            dest,
            incremental,
            intermediary,
            replication,
            use_sent_name,
        } => {
            let options = SendOptions {
                incremental,
                intermediary,
                replication,
                use_sent_name,
            };
            zfs.snapshot(&snapshot)?
                .send_to(&dest, &options)
                .map_err(Into::into)
        }
        Command::Lu { command } => lu(command, zfs, printer),
        Command::Target { command } => target(command, &zfs.stmf(), printer),
        Command::Tg { command } => {
            let group = zfs.stmf().target_group(command.name())?;
            group_command(group, command, printer)
        }
        Command::Hg { command } => {
            let group = zfs.stmf().host_group(command.name())?;
            group_command(group, command, printer)
        }
    }
}

fn lu(command: LuCommand, zfs: &ZfsManager, printer: &mut Printer<'_>) -> CliResult {
    let stmf = zfs.stmf();
    match command {
        LuCommand::List => printer.names(
            &stmf
                .logical_units()?
                .iter()
                .map(|lu| lu.name().to_string())
                .collect::<Vec<_>>(),
        ),
        LuCommand::Create { volume } => {
            let lu = zfs.filesystem(&volume)?.create_lu()?;
            printer.print(lu.name(), lu.name())
        }
        LuCommand::Exists { lu } => printer.flag(stmf.logical_unit(&lu).exists()?),
        LuCommand::Delete { lu } => stmf.logical_unit(&lu).delete().map_err(Into::into),
        LuCommand::AddView {
            lu,
            lun,
            target_group,
            host_group,
        } => {
            let view = stmf.logical_unit(&lu).add_view(
                lun,
                target_group.as_deref(),
                host_group.as_deref(),
            )?;
            printer.print(&view, &view.to_string())
        }
        LuCommand::Views { lu } => {
            let views = stmf.logical_unit(&lu).views()?;
            let text: Vec<String> = views.iter().map(ToString::to_string).collect();
            printer.print(&views, &text.join("\n"))
        }
        LuCommand::RemoveViews { lu } => stmf.logical_unit(&lu).remove_views().map_err(Into::into),
    }
}

fn target(command: TargetCommand, stmf: &StmfManager, printer: &mut Printer<'_>) -> CliResult {
    match command {
        TargetCommand::Create { name } => {
            let mut target = stmf.iscsi_target(name.as_deref())?;
            target.create()?;
            let name = target.name().unwrap_or_default();
            printer.print(name, name)
        }
        TargetCommand::Delete { name } => stmf.iscsi_target(Some(&name))?.delete().map_err(Into::into),
        TargetCommand::Exists { name } => printer.flag(stmf.iscsi_target(Some(&name))?.exists()?),
        TargetCommand::Online { name } => stmf.iscsi_target(Some(&name))?.online().map_err(Into::into),
        TargetCommand::Offline { name } => {
            stmf.iscsi_target(Some(&name))?.offline().map_err(Into::into)
        }
    }
}

fn group_command<K: GroupKind>(
    group: Group<K>,
    command: GroupCommand,
    printer: &mut Printer<'_>,
) -> CliResult {
    match command {
        GroupCommand::Create { .. } => group.create().map_err(Into::into),
        GroupCommand::Delete { .. } => group.delete().map_err(Into::into),
        GroupCommand::Exists { .. } => printer.flag(group.exists()?),
        GroupCommand::AddMember { member, .. } => group.add_member(&member).map_err(Into::into),
        GroupCommand::RemoveMember { member, .. } => {
            group.remove_member(&member).map_err(Into::into)
        }
        GroupCommand::Members { .. } => printer.names(&group.members()?),
    }
}

/// Serialized name of a unit enum variant, e.g. `read-only`.
fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
