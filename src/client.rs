//! The remote-query seam: everything the poller and the checkout need from a
//! versioning server, behind a pair of traits so tests can substitute an
//! in-memory server.

use std::{collections::BTreeMap, ops::Deref};

use async_trait::async_trait;
use changelist::{ChangeRef, Changelist, Populate, RevisionMarker};
use p4_scm_process::{Client, Opt};
use thiserror::Error;

use crate::config::Credential;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Process(#[from] p4_scm_process::Error),

    #[error("server rejected the request: {0}")]
    Rejected(String),

    #[error("unknown credential {0}")]
    UnknownCredential(String),
}

/// Opens connections to a server on behalf of a client workspace.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection;

    async fn connect(&self, credential: &str, client: &str) -> Result<Self::Connection, Error>;

    /// Connects, returning a session that releases the connection when it is
    /// dropped. Callers go through here rather than [`Connector::connect`].
    async fn session(
        &self,
        credential: &str,
        client: &str,
    ) -> Result<Session<Self::Connection>, Error> {
        Ok(Session(self.connect(credential, client).await?))
    }
}

/// A connection bound to a single client workspace.
#[async_trait]
pub trait Connection: Send + Sync {
    fn client_name(&self) -> &str;

    /// Changes currently synced into the workspace. Only the highest is
    /// guaranteed to be present.
    async fn synced_changes(&self) -> Result<Vec<u32>, Error>;

    /// Submitted changes after `from` up to and including `to`, newest first.
    async fn list_changes(&self, from: u32, to: &RevisionMarker) -> Result<Vec<ChangeRef>, Error>;

    async fn describe(&self, change: u32) -> Result<Changelist, Error>;

    /// The highest submitted change at the given revision, if there is one.
    async fn latest_change(&self, at: &RevisionMarker) -> Result<Option<u32>, Error>;

    /// Whether syncing to head would change the workspace.
    async fn is_stale(&self) -> Result<bool, Error>;

    async fn sync(&self, target: &RevisionMarker, populate: &Populate) -> Result<(), Error>;

    /// The revision spec bound to a label, or `None` if the label has none.
    /// Fails if the name isn't a label.
    async fn label_revision_spec(&self, name: &str) -> Result<Option<String>, Error>;

    /// Releases the connection. Called once, by [`Session`] on drop.
    fn disconnect(&self);
}

/// An open connection. Dropping it disconnects, including when the future
/// using it is cancelled part way through.
#[derive(Debug)]
pub struct Session<C: Connection>(C);

impl<C: Connection> Deref for Session<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

impl<C: Connection> Drop for Session<C> {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

/// Connects through the `p4` command line client.
#[derive(Debug, Clone)]
pub struct P4Connector {
    opt: Opt,
    credentials: BTreeMap<String, Credential>,
}

impl P4Connector {
    pub fn new(opt: &Opt, credentials: &BTreeMap<String, Credential>) -> Self {
        Self {
            opt: opt.clone(),
            credentials: credentials.clone(),
        }
    }
}

#[async_trait]
impl Connector for P4Connector {
    type Connection = Client;

    async fn connect(&self, credential: &str, client: &str) -> Result<Client, Error> {
        let found = self
            .credentials
            .get(credential)
            .ok_or_else(|| Error::UnknownCredential(credential.to_string()))?;

        let connection = Client::new(&self.opt, &found.port, &found.user, client);
        let info = connection.info().await?;
        if info.get("clientName") == Some("*unknown*") {
            return Err(Error::Rejected(format!("client {} does not exist", client)));
        }
        log::debug!(
            "connected to {} as {} for {}",
            info.get("serverAddress").unwrap_or(found.port.as_str()),
            &found.user,
            client
        );

        Ok(connection)
    }
}

#[async_trait]
impl Connection for Client {
    fn client_name(&self) -> &str {
        self.name()
    }

    async fn synced_changes(&self) -> Result<Vec<u32>, Error> {
        Ok(self.have_changes().await?)
    }

    async fn list_changes(&self, from: u32, to: &RevisionMarker) -> Result<Vec<ChangeRef>, Error> {
        Ok(self.changes(from, to).await?)
    }

    async fn describe(&self, change: u32) -> Result<Changelist, Error> {
        Ok(Client::describe(self, change).await?)
    }

    async fn latest_change(&self, at: &RevisionMarker) -> Result<Option<u32>, Error> {
        Ok(Client::latest_change(self, at).await?)
    }

    async fn is_stale(&self) -> Result<bool, Error> {
        Ok(self.needs_sync().await?)
    }

    async fn sync(&self, target: &RevisionMarker, populate: &Populate) -> Result<(), Error> {
        Ok(Client::sync(self, target, populate).await?)
    }

    async fn label_revision_spec(&self, name: &str) -> Result<Option<String>, Error> {
        Ok(self.label_revision(name).await?)
    }

    fn disconnect(&self) {
        log::trace!("released connection for {}", self.name());
    }
}
