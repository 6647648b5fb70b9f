// src/types.rs

use std::fmt;

use serde::Deserialize;

/// Which kind of extract refresh a spec asks for.
///
/// Besides the short names (`"full"`, `"incremental"`) the config accepts the
/// task type names the server itself reports, so values copied from the
/// server UI or API work unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshKind {
    #[serde(alias = "RefreshExtractTask", alias = "extractRefresh", alias = "Full")]
    Full,
    #[serde(alias = "IncrementExtractTask", alias = "Incremental")]
    Incremental,
}

impl RefreshKind {
    /// Map a task type string reported by the server.
    ///
    /// Returns `None` for task types that are not extract refreshes
    /// (e.g. data acceleration tasks).
    pub fn from_server_type(value: &str) -> Option<Self> {
        match value {
            "RefreshExtractTask" | "extractRefresh" | "FullRefresh" => Some(RefreshKind::Full),
            "IncrementExtractTask" | "IncrementalRefresh" => Some(RefreshKind::Incremental),
            _ => None,
        }
    }
}

impl fmt::Display for RefreshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshKind::Full => f.write_str("full"),
            RefreshKind::Incremental => f.write_str("incremental"),
        }
    }
}

/// Kind of remote entity a refresh spec targets.
///
/// This is the typed discriminator the remote boundary dispatches on when
/// choosing the datasource or workbook endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Datasource,
    Workbook,
}

impl EntityKind {
    /// REST collection segment, e.g. `sites/{site}/datasources`.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Datasource => "datasources",
            EntityKind::Workbook => "workbooks",
        }
    }

    /// Singular element name used in response bodies.
    pub fn element(self) -> &'static str {
        match self {
            EntityKind::Datasource => "datasource",
            EntityKind::Workbook => "workbook",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Datasource => "data source",
            EntityKind::Workbook => "workbook",
        })
    }
}
