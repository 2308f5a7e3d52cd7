//! Dataset names: `pool[/path...][@snapshot]`.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{Result, ZfsError};

/// Longest name zfs accepts (ZFS_MAX_DATASET_NAME_LEN - 1)
const MAX_NAME_LEN: usize = 255;

fn valid_component_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn validate_component(component: &str, full: &str) -> Result<()> {
    if component.is_empty() {
        return Err(ZfsError::InvalidName(format!(
            "'{}' contains an empty component",
            full
        )));
    }
    if component == "." || component == ".." {
        return Err(ZfsError::InvalidName(format!(
            "'{}' contains a relative component",
            full
        )));
    }
    if !component.chars().all(valid_component_char) {
        return Err(ZfsError::InvalidName(format!(
            "invalid characters in '{}': only alphanumeric, underscore, hyphen, colon, and period allowed",
            full
        )));
    }
    Ok(())
}

/// A validated ZFS dataset name.
///
/// Equality and ordering are plain string comparisons of the full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetName(String);

impl DatasetName {
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(ZfsError::InvalidName("name cannot be empty".into()));
        }
        if s.len() > MAX_NAME_LEN {
            return Err(ZfsError::InvalidName(format!(
                "'{}' exceeds maximum length of {} characters",
                s, MAX_NAME_LEN
            )));
        }

        let (filesystem, snapshot) = match s.split_once('@') {
            Some((fs, snap)) => (fs, Some(snap)),
            None => (s, None),
        };

        for component in filesystem.split('/') {
            validate_component(component, s)?;
        }

        if let Some(snap) = snapshot {
            if snap.contains('@') || snap.contains('/') {
                return Err(ZfsError::InvalidName(format!(
                    "'{}' has a malformed snapshot part",
                    s
                )));
            }
            validate_component(snap, s)?;
        }

        Ok(Self(s.to_string()))
    }

    /// Like [`parse`](Self::parse), but folds `.`/`..` components and stray
    /// separators in the filesystem part first.
    pub fn clean(s: &str) -> Result<Self> {
        let (filesystem, snapshot) = match s.split_once('@') {
            Some((fs, snap)) => (fs, Some(snap)),
            None => (s, None),
        };
        let filesystem = match filesystem.split_once('/') {
            Some((pool, rel)) => Self::parse(pool)?.join(rel.trim_start_matches('/'))?,
            None => Self::parse(filesystem)?,
        };
        match snapshot {
            Some(snap) => Self::parse(&format!("{}@{}", filesystem, snap)),
            None => Ok(filesystem),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pool the dataset lives in.
    pub fn pool(&self) -> &str {
        self.filesystem().split('/').next().unwrap_or_default()
    }

    /// Everything after the pool, snapshot suffix included.
    pub fn path(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, path)| path)
    }

    pub fn is_snapshot(&self) -> bool {
        self.0.contains('@')
    }

    /// Short snapshot name (after the `@`).
    pub fn snapshot(&self) -> Option<&str> {
        self.0.split_once('@').map(|(_, snap)| snap)
    }

    /// Name with any snapshot suffix removed.
    pub fn filesystem(&self) -> &str {
        match self.0.split_once('@') {
            Some((fs, _)) => fs,
            None => &self.0,
        }
    }

    /// This name with any snapshot suffix dropped.
    pub(crate) fn without_snapshot(&self) -> DatasetName {
        Self(self.filesystem().to_string())
    }

    /// The containing dataset: a snapshot's filesystem, or the filesystem one
    /// level up. Pools have no parent.
    pub fn parent(&self) -> Option<DatasetName> {
        if self.is_snapshot() {
            return Some(self.without_snapshot());
        }
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| Self(parent.to_string()))
    }

    /// `<filesystem>@<snapshot>` for this name's filesystem.
    pub fn with_snapshot(&self, snapshot: &str) -> Result<DatasetName> {
        let snapshot = snapshot.strip_prefix('@').unwrap_or(snapshot);
        Self::parse(&format!("{}@{}", self.filesystem(), snapshot))
    }

    /// Resolve `rel` against this name.
    ///
    /// `@snap` names a snapshot of the filesystem. Anything else is a relative
    /// dataset path; `.` and `..` are folded, but the result may not climb
    /// above the pool. Joining onto a snapshot applies the path to its
    /// filesystem and keeps the snapshot suffix.
    pub fn join(&self, rel: &str) -> Result<DatasetName> {
        if let Some(snap) = self.snapshot() {
            if rel.contains('@') {
                return Err(ZfsError::InvalidName(format!(
                    "cannot join '{}' onto snapshot '{}'",
                    rel, self
                )));
            }
            return self.without_snapshot().join(rel)?.with_snapshot(snap);
        }

        if rel.starts_with('@') {
            return self.with_snapshot(rel);
        }
        if rel.starts_with('/') {
            return Err(ZfsError::InvalidName(format!(
                "'{}' is not a relative dataset path",
                rel
            )));
        }

        let mut components: Vec<&str> = self.0.split('/').collect();
        for part in rel.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    components.pop();
                    if components.is_empty() {
                        return Err(ZfsError::InvalidName(format!(
                            "'{}' escapes pool '{}'",
                            rel,
                            self.pool()
                        )));
                    }
                }
                other => components.push(other),
            }
        }

        Self::parse(&components.join("/"))
    }
}

impl Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DatasetName {
    type Err = ZfsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DatasetName {
    type Error = ZfsError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<DatasetName> for String {
    fn from(name: DatasetName) -> Self {
        name.0
    }
}

impl AsRef<str> for DatasetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DatasetName {
        DatasetName::parse(s).unwrap()
    }

    #[test]
    fn test_parse_valid() {
        assert!(DatasetName::parse("tank").is_ok());
        assert!(DatasetName::parse("tank/csi/vol-1_a.b").is_ok());
        assert!(DatasetName::parse("tank/fs@snap:2024-01-01").is_ok());
        assert!(DatasetName::parse("tank@root").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(DatasetName::parse("").is_err());
        assert!(DatasetName::parse("/tank").is_err());
        assert!(DatasetName::parse("tank/").is_err());
        assert!(DatasetName::parse("tank//fs").is_err());
        assert!(DatasetName::parse("tank/../etc").is_err());
        assert!(DatasetName::parse("tank/fs@").is_err());
        assert!(DatasetName::parse("tank/fs@a@b").is_err());
        assert!(DatasetName::parse("tank/fs@a/b").is_err());
        assert!(DatasetName::parse("tank/vol name").is_err());
        assert!(DatasetName::parse("tank/$(whoami)").is_err());
        assert!(DatasetName::parse(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_components() {
        let snap = name("tank/a/b@daily");
        assert_eq!(snap.pool(), "tank");
        assert_eq!(snap.path(), Some("a/b@daily"));
        assert_eq!(snap.snapshot(), Some("daily"));
        assert_eq!(snap.filesystem(), "tank/a/b");
        assert!(snap.is_snapshot());

        let pool = name("tank");
        assert_eq!(pool.pool(), "tank");
        assert_eq!(pool.path(), None);
        assert!(!pool.is_snapshot());
        assert_eq!(name("tank@s").pool(), "tank");
    }

    #[test]
    fn test_parent() {
        assert_eq!(name("tank/a/b").parent(), Some(name("tank/a")));
        assert_eq!(name("tank/a@s").parent(), Some(name("tank/a")));
        assert_eq!(name("tank").parent(), None);
    }

    #[test]
    fn test_join_filesystem() {
        let fs = name("tank/a");
        assert_eq!(fs.join("b/c").unwrap(), name("tank/a/b/c"));
        assert_eq!(fs.join("@snap").unwrap(), name("tank/a@snap"));
        assert_eq!(fs.join("../b").unwrap(), name("tank/b"));
        assert_eq!(fs.join("./b/").unwrap(), name("tank/a/b"));
        assert_eq!(fs.join("b@snap").unwrap(), name("tank/a/b@snap"));
        assert!(fs.join("../..").is_err());
        assert!(fs.join("/etc").is_err());
    }

    #[test]
    fn test_join_snapshot() {
        let snap = name("tank/a@daily");
        assert_eq!(snap.join("b").unwrap(), name("tank/a/b@daily"));
        assert!(matches!(
            snap.join("b@other"),
            Err(ZfsError::InvalidName(_))
        ));
    }

    #[test]
    fn test_clean() {
        assert_eq!(DatasetName::clean("tank/a/./b").unwrap(), name("tank/a/b"));
        assert_eq!(DatasetName::clean("tank/a/../b").unwrap(), name("tank/b"));
        assert_eq!(DatasetName::clean("tank//a/").unwrap(), name("tank/a"));
        assert_eq!(DatasetName::clean("tank/a/../b@s").unwrap(), name("tank/b@s"));
        assert_eq!(DatasetName::clean("tank@s").unwrap(), name("tank@s"));
        assert!(DatasetName::clean("tank/..").is_err());
        assert!(DatasetName::clean("tank/a@s/..").is_err());
        assert!(DatasetName::clean("tank@@s").is_err());
    }

    #[test]
    fn test_without_snapshot() {
        assert_eq!(name("tank/a@s").without_snapshot(), name("tank/a"));
        assert_eq!(name("tank/a").without_snapshot(), name("tank/a"));
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&name("tank/a")).unwrap();
        assert_eq!(json, "\"tank/a\"");
        assert!(serde_json::from_str::<DatasetName>("\"bad name\"").is_err());
    }
}
