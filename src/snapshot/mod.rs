//! Variable value persistence
//!
//! Snapshots are SafeTensors files keyed by identifier-relative variable
//! names, so a snapshot written by one registry loads into any
//! differently-identified registry with the same component structure. Save
//! and load are best effort over individual variables and report every
//! skipped or failed item instead of swallowing it.

mod load;
mod save;


/// Snapshot format version written into the file metadata.
pub const SNAPSHOT_VERSION: &str = "1";

/// Why a variable was left out of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The variable has no value yet.
    Uninitialized,
    /// Reading the value failed.
    ReadFailed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Uninitialized => write!(f, "uninitialized"),
            SkipReason::ReadFailed(reason) => write!(f, "read failed: {reason}"),
        }
    }
}

/// Outcome of a save: what was written and what was skipped, with reasons.
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    /// Number of variables written.
    pub written: usize,
    /// Variables left out, by relative name.
    pub skipped: Vec<(String, SkipReason)>,
}

/// Outcome of a load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Number of variables restored.
    pub restored: usize,
    /// Snapshot entries with no matching variable in the current graph.
    pub stale: Vec<String>,
    /// Entries whose value could not be assigned, with reasons.
    pub failed: Vec<(String, String)>,
    /// True when the snapshot file did not exist; nothing was loaded and
    /// nothing is wrong.
    pub missing_file: bool,
}

impl LoadReport {
    /// True when every entry in the snapshot was restored.
    pub fn is_clean(&self) -> bool {
        self.stale.is_empty() && self.failed.is_empty()
    }
}
