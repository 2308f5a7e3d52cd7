//! Views: which initiators see a logical unit, through which targets, at
//! which LUN.

use std::fmt::{self, Display};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::error::{Result, StmfError};

/// One view entry of a logical unit.
///
/// `None` stands for `Auto` (LUN) or `All` (groups).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub lu: String,
    /// Entry number assigned by stmfadm, unknown for a view just added
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<u32>,
    pub lun: Option<u32>,
    pub target_group: Option<String>,
    pub host_group: Option<String>,
}

impl View {
    pub fn new(
        lu: &str,
        lun: Option<u32>,
        target_group: Option<&str>,
        host_group: Option<&str>,
    ) -> Self {
        Self {
            lu: lu.to_string(),
            entry: None,
            lun,
            target_group: target_group.map(str::to_string),
            host_group: host_group.map(str::to_string),
        }
    }
}

impl Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "View: [ lu = {}, lun = ", self.lu)?;
        match self.lun {
            Some(lun) => write!(f, "{}", lun)?,
            None => f.write_str("Auto")?,
        }
        write!(
            f,
            ", target_group = {}, host_group = {} ]",
            self.target_group.as_deref().unwrap_or("All"),
            self.host_group.as_deref().unwrap_or("All")
        )
    }
}

static VIEW_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(view entry|host group|target group|lun)\s*:\s*(.*?)\s*$")
        .expect("valid view field pattern")
});

fn group_value(value: &str) -> Option<String> {
    (value != "All").then(|| value.to_string())
}

/// Parse `stmfadm list-view -l <lu>` output.
///
/// ```text
/// View Entry: 0
///     Host group   : All
///     Target Group : tg1
///     LUN          : 3
/// ```
pub(crate) fn parse_views(lu: &str, output: &str) -> Result<Vec<View>> {
    let mut views: Vec<View> = Vec::new();

    for line in output.lines() {
        let Some(caps) = VIEW_FIELD.captures(line) else {
            continue;
        };
        let key = caps[1].to_ascii_lowercase();
        let value = &caps[2];

        if key == "view entry" {
            let entry = value.parse::<u32>().map_err(|_| {
                StmfError::ParseError(format!("invalid view entry number '{}'", value))
            })?;
            let mut view = View::new(lu, None, None, None);
            view.entry = Some(entry);
            views.push(view);
            continue;
        }

        let view = views.last_mut().ok_or_else(|| {
            StmfError::ParseError(format!("'{}' outside of a view entry", line.trim()))
        })?;
        match key.as_str() {
            "host group" => view.host_group = group_value(value),
            "target group" => view.target_group = group_value(value),
            _ => {
                view.lun = match value {
                    "Auto" => None,
                    lun => Some(lun.parse::<u32>().map_err(|_| {
                        StmfError::ParseError(format!("invalid LUN '{}'", lun))
                    })?),
                }
            }
        }
    }

    Ok(views)
}
