use serde::{Deserialize, Serialize};

/// How the workspace is brought up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PopulateKind {
    /// Plain incremental sync.
    SyncOnly,

    /// Revert local modifications and remove stray files, then sync.
    AutoClean,

    /// Force every file to be re-transferred.
    ForceClean,
}

/// Populate options for a job: how to sync, and what to sync to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Populate {
    pub kind: PopulateKind,

    /// Label or change to build, before environment expansion. Empty means
    /// the latest change.
    pub pin: String,

    pub quiet: bool,

    /// Whether the server should keep its have list up to date during a
    /// forced sync.
    pub have: bool,
}

impl Populate {
    /// Forced sync options, used when a workspace is emptied before deletion.
    pub fn force_clean(have: bool) -> Self {
        Self {
            kind: PopulateKind::ForceClean,
            pin: String::new(),
            quiet: true,
            have,
        }
    }

    /// Returns the pin if one is configured.
    pub fn pin(&self) -> Option<&str> {
        if self.pin.trim().is_empty() {
            None
        } else {
            Some(self.pin.as_str())
        }
    }
}

impl Default for Populate {
    fn default() -> Self {
        Self {
            kind: PopulateKind::AutoClean,
            pin: String::new(),
            quiet: true,
            have: true,
        }
    }
}
