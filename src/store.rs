use std::sync::Arc;

use async_trait::async_trait;
use changelist::LogEntry;
use p4_scm_state::{BuildId, BuildRevisionRecord, Manager};

/// Per-build metadata kept by the host between polls and checkouts.
#[async_trait]
pub trait BuildStore: Send + Sync {
    async fn register_build(&self, id: &BuildId);

    /// Attaches the revision a build synced. A build can only record once.
    async fn attach_record(
        &self,
        id: &BuildId,
        record: BuildRevisionRecord,
    ) -> Result<Arc<BuildRevisionRecord>, p4_scm_state::Error>;

    async fn attach_changelog(&self, id: &BuildId, changelog: Vec<LogEntry>);

    async fn record(&self, id: &BuildId) -> Option<Arc<BuildRevisionRecord>>;

    async fn changelog(&self, id: &BuildId) -> Option<Arc<Vec<LogEntry>>>;

    async fn previous_build(
        &self,
        id: &BuildId,
    ) -> Option<(BuildId, Option<Arc<BuildRevisionRecord>>)>;

    async fn last_record(&self, job: &str) -> Option<(BuildId, Arc<BuildRevisionRecord>)>;

    async fn next_change(&self, job: &str) -> Option<u32>;

    async fn set_next_change(&self, job: &str, change: Option<u32>);

    async fn take_next_change(&self, job: &str) -> Option<u32>;
}

#[async_trait]
impl BuildStore for Manager {
    async fn register_build(&self, id: &BuildId) {
        Manager::register_build(self, id).await
    }

    async fn attach_record(
        &self,
        id: &BuildId,
        record: BuildRevisionRecord,
    ) -> Result<Arc<BuildRevisionRecord>, p4_scm_state::Error> {
        Manager::attach_record(self, id, record).await
    }

    async fn attach_changelog(&self, id: &BuildId, changelog: Vec<LogEntry>) {
        Manager::attach_changelog(self, id, changelog).await
    }

    async fn record(&self, id: &BuildId) -> Option<Arc<BuildRevisionRecord>> {
        self.get_record(id).await
    }

    async fn changelog(&self, id: &BuildId) -> Option<Arc<Vec<LogEntry>>> {
        self.get_changelog(id).await
    }

    async fn previous_build(
        &self,
        id: &BuildId,
    ) -> Option<(BuildId, Option<Arc<BuildRevisionRecord>>)> {
        self.get_previous_build(id).await
    }

    async fn last_record(&self, job: &str) -> Option<(BuildId, Arc<BuildRevisionRecord>)> {
        self.get_last_record(job).await
    }

    async fn next_change(&self, job: &str) -> Option<u32> {
        self.get_next_change(job).await
    }

    async fn set_next_change(&self, job: &str, change: Option<u32>) {
        Manager::set_next_change(self, job, change).await
    }

    async fn take_next_change(&self, job: &str) -> Option<u32> {
        Manager::take_next_change(self, job).await
    }
}
