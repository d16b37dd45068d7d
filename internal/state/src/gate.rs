use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::edits::GateEdit;

/// The next change each per-change gated job should build, keyed by job.
#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct Store {
    next: BTreeMap<String, u32>,
}

impl Store {
    pub(crate) fn get(&self, job: &str) -> Option<u32> {
        self.next.get(job).copied()
    }

    pub(crate) fn set(&mut self, job: &str, change: Option<u32>) {
        match change {
            Some(change) => self.next.insert(job.to_string(), change),
            None => self.next.remove(job),
        };
    }

    pub(crate) fn take(&mut self, job: &str) -> Option<u32> {
        self.next.remove(job)
    }

    pub(crate) fn apply(&mut self, job: &str, edit: GateEdit) {
        match edit {
            GateEdit::Set(change) => self.set(job, change),
            GateEdit::Taken(change) => {
                if self.get(job) == Some(change) {
                    self.next.remove(job);
                }
            }
        }
    }
}
