//! Syncs a build's workspace and records what it synced.

use std::sync::Arc;

use changelist::{is_per_change, LogEntry, RevisionMarker};
use p4_scm_state::{BuildId, BuildRevisionRecord};
use thiserror::Error;

use crate::{
    changelog,
    client::{self, Connection, Connector},
    config::Job,
    resolver,
    store::BuildStore,
    workspace::{Environment, Workspace},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] client::Error),

    #[error(transparent)]
    State(#[from] p4_scm_state::Error),

    #[error("cannot sync {client} to {target}: {source}")]
    Sync {
        client: String,
        target: RevisionMarker,
        #[source]
        source: client::Error,
    },
}

/// What a successful checkout recorded.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub record: Arc<BuildRevisionRecord>,
    pub changelog: Vec<LogEntry>,
}

#[derive(Debug)]
pub struct Checkout<'a, K, S> {
    connector: &'a K,
    store: &'a S,
    job: &'a Job,
}

impl<'a, K, S> Checkout<'a, K, S>
where
    K: Connector,
    S: BuildStore,
{
    pub fn new(connector: &'a K, store: &'a S, job: &'a Job) -> Self {
        Self {
            connector,
            store,
            job,
        }
    }

    /// Syncs the workspace for a build and records the revision and the
    /// changelog against the build.
    ///
    /// Nothing is recorded unless the sync succeeds. For per-change jobs, a
    /// boundary left by the last poll takes precedence over the configured
    /// pin, and is consumed once the checkout succeeds.
    pub async fn run(&self, build: &BuildId, env: &Environment) -> Result<CheckoutOutcome, Error> {
        self.store.register_build(build).await;

        let mut ws = Workspace::load(&self.job.workspace, env);
        if let Some(pin) = self.job.populate.pin() {
            ws.set_label(pin);
        }

        let gate = if is_per_change(&self.job.filter) {
            self.store.next_change(&build.job).await
        } else {
            None
        };
        if let Some(next) = gate {
            log::info!("P4: building change {} of {} on its own", next, &build.job);
            ws.set_label(&next.to_string());
        }

        let result = match self.connector.session(&self.job.credential, ws.full_name()).await {
            Ok(conn) => self.sync_and_record(&conn, build, &ws).await,
            Err(e) => Err(e.into()),
        };

        if result.is_ok() && gate.is_some() {
            self.store.take_next_change(&build.job).await;
        }
        result
    }

    async fn sync_and_record(
        &self,
        conn: &K::Connection,
        build: &BuildId,
        ws: &Workspace,
    ) -> Result<CheckoutOutcome, Error> {
        let target = match resolver::resolve_expanded(conn, ws.label().unwrap_or_default()).await
        {
            // Pin head down to a change so later builds have something to
            // compare against. A server without any changes stays at head.
            RevisionMarker::Head => match conn.latest_change(&RevisionMarker::Head).await? {
                Some(change) => RevisionMarker::Change(change),
                None => RevisionMarker::Head,
            },
            marker => marker,
        };

        log::info!("P4: syncing {} to {}", ws.full_name(), &target);
        conn.sync(&target, &self.job.populate)
            .await
            .map_err(|source| Error::Sync {
                client: ws.full_name().to_string(),
                target: target.clone(),
                source,
            })?;

        let markers = match self.store.previous_build(build).await {
            Some((_, Some(previous))) => {
                changelog::delta(conn, &previous.revision, &target).await?
            }
            Some((previous, None)) => {
                log::info!(
                    "P4: previous build {} recorded no revision; changelog is empty",
                    previous
                );
                Vec::new()
            }
            None => vec![target.clone()],
        };
        let changelog = changelog::entries(conn, &markers).await?;

        let record = self
            .store
            .attach_record(
                build,
                BuildRevisionRecord {
                    client: ws.full_name().to_string(),
                    credential: self.job.credential.clone(),
                    revision: target,
                },
            )
            .await?;
        self.store
            .attach_changelog(build, changelog.clone())
            .await;
        log::info!(
            "P4: {} recorded {} with {} changelog entries",
            build,
            &record.revision,
            changelog.len()
        );

        Ok(CheckoutOutcome { record, changelog })
    }
}
