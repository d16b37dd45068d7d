//! Decides whether a job needs building.

use changelist::{is_per_change, should_exclude, RevisionMarker};
use derive_more::Display;
use p4_scm_state::BuildRevisionRecord;

use crate::{
    client::{Connection, Connector, Error},
    config::Job,
    environment,
    store::BuildStore,
    workspace::{Environment, Workspace},
};

/// Why a poll decided to build.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum BuildReason {
    #[display(fmt = "new changes")]
    NewChanges,

    #[display(fmt = "workspace stale")]
    WorkspaceStale,
}

/// The outcome of a poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollDecision {
    /// Changes that passed the filters, newest first.
    pub changes: Vec<u32>,

    /// Whether syncing would change the workspace regardless of new changes.
    pub stale: bool,

    /// For per-change jobs, the oldest qualifying change: the next build
    /// should sync to exactly this change.
    pub next_change: Option<u32>,
}

impl PollDecision {
    pub fn no_changes() -> Self {
        Self::default()
    }

    pub fn build_now(&self) -> bool {
        self.reason().is_some()
    }

    pub fn reason(&self) -> Option<BuildReason> {
        if !self.changes.is_empty() {
            Some(BuildReason::NewChanges)
        } else if self.stale {
            Some(BuildReason::WorkspaceStale)
        } else {
            None
        }
    }
}

impl std::fmt::Display for PollDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "BUILD_NOW ({})", reason),
            None => write!(f, "NO_CHANGES"),
        }
    }
}

/// Polls jobs against the workspace their last build synced.
#[derive(Debug)]
pub struct Poller<'a, K, S> {
    connector: &'a K,
    store: &'a S,
    env: &'a Environment,
}

impl<'a, K, S> Poller<'a, K, S>
where
    K: Connector,
    S: BuildStore,
{
    /// `env` is the host environment; the last build's job name and number
    /// are added to it when expanding pins.
    pub fn new(connector: &'a K, store: &'a S, env: &'a Environment) -> Self {
        Self {
            connector,
            store,
            env,
        }
    }

    /// Polls a job. Errors are logged and reported as no changes, since the
    /// next poll will retry from the same baseline anyway.
    ///
    /// For per-change jobs, the next change is also saved to the store for
    /// the following checkout.
    pub async fn poll(&self, name: &str, job: &Job) -> PollDecision {
        let (build, record) = match self.store.last_record(name).await {
            Some(last) => last,
            None => {
                log::warn!(
                    "P4: no previous build of {} recorded a workspace; polling skipped",
                    name
                );
                return PollDecision::no_changes();
            }
        };

        let env = environment::for_build(self.env, &build);
        let decision = match self.try_poll(job, &record, &env).await {
            Ok(decision) => decision,
            Err(e) => {
                log::error!("P4: Polling Error: {}", e);
                return PollDecision::no_changes();
            }
        };

        if let Some(next) = decision.next_change {
            log::info!("P4: next change for {} is {}", name, next);
            self.store.set_next_change(name, Some(next)).await;
        }
        log::info!("P4: {}: {}", name, &decision);

        decision
    }

    async fn try_poll(
        &self,
        job: &Job,
        record: &BuildRevisionRecord,
        env: &Environment,
    ) -> Result<PollDecision, Error> {
        // The job's credential is current configuration; the record's may
        // have been rotated out since.
        let conn = self
            .connector
            .session(&job.credential, &record.client)
            .await?;

        scan(&*conn, job, &Workspace::load(&job.workspace, env)).await
    }
}

async fn scan<C: Connection>(conn: &C, job: &Job, ws: &Workspace) -> Result<PollDecision, Error> {
    let baseline = conn
        .synced_changes()
        .await?
        .into_iter()
        .max()
        .unwrap_or_default();

    let to = match job.populate.pin() {
        Some(pin) => RevisionMarker::from(ws.expand(pin).as_str()),
        None => RevisionMarker::Head,
    };
    log::info!("P4: Polling with label/change: {},{}", baseline, &to);

    let mut changes = Vec::new();
    for change in conn.list_changes(baseline, &to).await? {
        let id = match change.as_change() {
            Some(id) => id,
            None => {
                log::debug!("P4: ignoring change list entry {:?}", change);
                continue;
            }
        };

        let changelist = conn.describe(id).await?;
        if should_exclude(&changelist, &job.filter) {
            log::debug!("P4: change {} excluded by filters", id);
        } else {
            changes.push(id);
        }
    }

    let next_change = if is_per_change(&job.filter) {
        changes.last().copied()
    } else {
        None
    };

    let stale = conn.is_stale().await?;
    if stale {
        log::info!("P4: workspace {} is out of date", conn.client_name());
    }

    Ok(PollDecision {
        changes,
        stale,
        next_change,
    })
}
