use std::collections::{BTreeMap, BTreeSet};

use crate::BuildId;

/// What a `Manager` changed since it was loaded. Persisting replays these
/// onto whatever the state file holds by then, so that runs for other jobs
/// that persisted in the meantime are not overwritten.
#[derive(Debug, Default)]
pub(crate) struct Edits {
    pub(crate) builds: BTreeSet<BuildId>,
    pub(crate) gates: BTreeMap<String, GateEdit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateEdit {
    Set(Option<u32>),

    /// The change was consumed. Only removes the gate if nobody has moved it
    /// since.
    Taken(u32),
}

impl Edits {
    pub(crate) fn touch_build(&mut self, id: &BuildId) {
        self.builds.insert(id.clone());
    }

    pub(crate) fn touch_gate(&mut self, job: &str, edit: GateEdit) {
        self.gates.insert(job.to_string(), edit);
    }

    pub(crate) fn clear(&mut self) {
        self.builds.clear();
        self.gates.clear();
    }
}
