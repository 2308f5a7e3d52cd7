//! ZFS dataset management through the `zfs` and `zpool` utilities.

pub mod dataset;
pub mod error;
pub mod name;
pub mod properties;

pub use dataset::{CreateOptions, Dataset, Filesystem, SendOptions, Snapshot, ZfsManager, ZfsObject};
pub use error::{Result, ZfsError};
pub use name::DatasetName;
pub use properties::{Properties, PropertyDef, PropertyValue, Switch};
