use std::{collections::BTreeMap, sync::Arc};

use changelist::{LogEntry, RevisionMarker};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifies a single build of a job.
///
/// Builds order by job name first, then by number, so the builds of a job are
/// contiguous in the store.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[display(fmt = "{}#{}", job, number)]
pub struct BuildId {
    pub job: String,
    pub number: u64,
}

impl BuildId {
    pub fn new(job: &str, number: u64) -> Self {
        Self {
            job: job.to_string(),
            number,
        }
    }
}

/// What a checkout actually synced. Written once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BuildRevisionRecord {
    pub client: String,
    pub credential: String,
    pub revision: RevisionMarker,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct Build {
    pub(crate) record: Option<Arc<BuildRevisionRecord>>,
    pub(crate) changelog: Option<Arc<Vec<LogEntry>>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct Store {
    builds: BTreeMap<BuildId, Build>,
}

impl Store {
    pub(crate) fn register(&mut self, id: &BuildId) {
        self.builds.entry(id.clone()).or_default();
    }

    pub(crate) fn get(&self, id: &BuildId) -> Option<&Build> {
        self.builds.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &BuildId) -> &mut Build {
        self.builds.entry(id.clone()).or_default()
    }

    /// Copies what this store holds for a build into another store. A record
    /// the other store already has is kept, since records are write-once.
    pub(crate) fn merge_into(&self, id: &BuildId, other: &mut Store) {
        let target = other.get_mut(id);
        let build = match self.get(id) {
            Some(build) => build,
            None => return,
        };

        match (&target.record, &build.record) {
            (None, Some(record)) => target.record = Some(record.clone()),
            (Some(existing), Some(record)) if existing != record => {
                log::warn!(
                    "build {} was recorded concurrently; keeping the first record",
                    id
                )
            }
            _ => {}
        }
        if build.changelog.is_some() {
            target.changelog = build.changelog.clone();
        }
    }

    /// Returns the build of the same job immediately before the given one.
    pub(crate) fn previous(&self, id: &BuildId) -> Option<(&BuildId, &Build)> {
        self.builds
            .range(..id)
            .next_back()
            .filter(|(previous, _)| previous.job == id.job)
    }

    /// Returns the latest build of the job that recorded a revision.
    pub(crate) fn last_record(&self, job: &str) -> Option<(&BuildId, &Arc<BuildRevisionRecord>)> {
        self.builds
            .range(BuildId::new(job, 0)..=BuildId::new(job, u64::MAX))
            .rev()
            .find_map(|(id, build)| build.record.as_ref().map(|record| (id, record)))
    }
}
