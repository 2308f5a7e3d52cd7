//! ZFS and COMSTAR storage administration library
//!
//! This library drives the `zfs`, `zpool`, `stmfadm` and `itadm` utilities and
//! turns their output into typed results.
//!
//! The library is split into several modules:
//! - `command`: subprocess execution and result classification
//! - `config`: locations of the wrapped utilities
//! - `zfs`: dataset names, the property registry, and dataset handles
//! - `stmf`: logical units, views, target/host groups and iSCSI targets
//! - `cli`: the command-line front end used by the `zfs-stmf` binary

pub mod cli;
pub mod command;
pub mod config;
pub mod stmf;
pub mod zfs;

pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use config::Tools;
pub use stmf::{StmfError, StmfManager};
pub use zfs::{ZfsError, ZfsManager};
