use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// A submitted changelist.
///
/// Changelists are immutable once submitted, so this is a plain snapshot of
/// what the server reported when it was described.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Changelist {
    pub id: u32,
    pub author: String,
    pub client: String,
    pub description: String,
    pub time: SystemTime,
    pub files: Vec<FileSpec>,
}

impl Changelist {
    /// Constructs a changelist with no description and no files.
    pub fn new(id: u32, author: &str) -> Self {
        Self {
            id,
            author: author.to_string(),
            client: String::new(),
            description: String::new(),
            time: SystemTime::UNIX_EPOCH,
            files: Vec::new(),
        }
    }

    /// Adds a file to the changelist.
    pub fn with_file(mut self, file: FileSpec) -> Self {
        self.files.push(file);
        self
    }
}

/// A file affected by a changelist, keyed by its depot path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileSpec {
    pub depot_path: String,
    pub revision: Option<u32>,
    pub action: String,
}

impl FileSpec {
    pub fn new(depot_path: &str, revision: Option<u32>, action: &str) -> Self {
        Self {
            depot_path: depot_path.to_string(),
            revision,
            action: action.to_string(),
        }
    }
}

/// A single entry in a build's changelog.
///
/// Most entries are full changelists. A build synced by a label that has no
/// revision spec can only name the label itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum LogEntry {
    Change(Changelist),
    Label(String),
}
