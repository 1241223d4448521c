use anyhow::Context;

use crate::foundation::{
    core::{Priority, ReprKind},
    error::ReprResult,
};

/// Serializable snapshot of one owner's cache.
#[derive(Clone, Debug, serde::Serialize)]
pub struct CacheReport {
    /// Data family name.
    pub family: &'static str,
    /// Owner label, if one was set.
    pub label: Option<String>,
    /// Debug rendering of the owner's shape.
    pub shape: String,
    /// One entry per cached kind, best priority first.
    pub entries: Vec<EntryReport>,
}

/// State of one cached representation.
#[derive(Clone, Debug, serde::Serialize)]
pub struct EntryReport {
    /// Representation kind.
    pub kind: ReprKind,
    /// Reported priority.
    pub priority: Priority,
    /// Content matches the owner's logical content.
    pub valid: bool,
    /// Backing resource is still present.
    pub resource_ok: bool,
    /// This kind received the most recent write.
    pub last_written: bool,
}

impl CacheReport {
    /// Kinds currently marked valid.
    pub fn valid_kinds(&self) -> Vec<ReprKind> {
        self.entries
            .iter()
            .filter(|e| e.valid)
            .map(|e| e.kind)
            .collect()
    }

    /// Kinds holding storage but out of date.
    pub fn stale_kinds(&self) -> Vec<ReprKind> {
        self.entries
            .iter()
            .filter(|e| !e.valid)
            .map(|e| e.kind)
            .collect()
    }

    /// Pretty-printed JSON rendering, for logs and debugging dumps.
    pub fn to_json(&self) -> ReprResult<String> {
        Ok(serde_json::to_string_pretty(self).context("serialize cache report")?)
    }
}
