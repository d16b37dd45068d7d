//! An in-memory server for tests.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use changelist::{ChangeRef, Changelist, FileSpec, Populate, PopulateKind, RevisionMarker};

use crate::client::{Connection, Connector, Error};

#[derive(Debug, Default)]
pub(crate) struct Server {
    pub(crate) changes: BTreeMap<u32, Changelist>,
    pub(crate) labels: BTreeMap<String, Option<String>>,

    /// Appended to every change listing.
    pub(crate) extra: Vec<ChangeRef>,

    /// The highest change synced into each client.
    pub(crate) have: BTreeMap<String, u32>,
    pub(crate) stale: bool,

    pub(crate) fail_connect: bool,
    pub(crate) fail_changes: bool,
    pub(crate) fail_labels: bool,
    pub(crate) fail_sync: bool,

    pub(crate) connects: usize,

    /// The credential and client of every successful connect.
    pub(crate) logins: Vec<(String, String)>,
    pub(crate) disconnects: usize,
    pub(crate) label_lookups: usize,
    pub(crate) syncs: Vec<(String, RevisionMarker, PopulateKind)>,
}

impl Server {
    pub(crate) fn add_change(&mut self, id: u32, author: &str, paths: &[&str]) {
        let mut changelist = paths
            .iter()
            .fold(Changelist::new(id, author), |changelist, path| {
                changelist.with_file(FileSpec::new(path, Some(1), "edit"))
            });
        changelist.description = format!("change {}", id);
        changelist.time = SystemTime::UNIX_EPOCH + Duration::from_secs(u64::from(id) * 60);

        self.changes.insert(id, changelist);
    }

    pub(crate) fn add_label(&mut self, name: &str, spec: Option<&str>) {
        self.labels
            .insert(name.to_string(), spec.map(|spec| spec.to_string()));
    }

    /// The highest change visible at the given revision.
    fn bound(&self, at: &RevisionMarker) -> Option<u32> {
        let limit = match at {
            RevisionMarker::Head => u32::MAX,
            RevisionMarker::Change(change) => *change,
            RevisionMarker::Label(label) => match self.labels.get(label) {
                Some(Some(spec)) => spec.trim_start_matches('@').parse().unwrap_or(u32::MAX),
                _ => u32::MAX,
            },
        };

        self.changes.range(..=limit).next_back().map(|(id, _)| *id)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeConnector {
    server: Arc<Mutex<Server>>,
}

impl FakeConnector {
    pub(crate) fn new(server: Server) -> Self {
        Self {
            server: Arc::new(Mutex::new(server)),
        }
    }

    pub(crate) fn server(&self) -> MutexGuard<'_, Server> {
        self.server.lock().unwrap()
    }

    /// Opens a connection without counting it.
    pub(crate) fn open(&self, client: &str) -> FakeConnection {
        FakeConnection {
            server: self.server.clone(),
            client: client.to_string(),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self, credential: &str, client: &str) -> Result<FakeConnection, Error> {
        let mut server = self.server();
        if server.fail_connect {
            return Err(Error::UnknownCredential(credential.to_string()));
        }
        server.connects += 1;
        server
            .logins
            .push((credential.to_string(), client.to_string()));

        Ok(self.open(client))
    }
}

#[derive(Debug)]
pub(crate) struct FakeConnection {
    server: Arc<Mutex<Server>>,
    client: String,
}

impl FakeConnection {
    fn server(&self) -> MutexGuard<'_, Server> {
        self.server.lock().unwrap()
    }
}

#[async_trait]
impl Connection for FakeConnection {
    fn client_name(&self) -> &str {
        &self.client
    }

    async fn synced_changes(&self) -> Result<Vec<u32>, Error> {
        Ok(self.server().have.get(&self.client).copied().into_iter().collect())
    }

    async fn list_changes(&self, from: u32, to: &RevisionMarker) -> Result<Vec<ChangeRef>, Error> {
        let server = self.server();
        if server.fail_changes {
            return Err(Error::Rejected(String::from("changes")));
        }

        let mut changes: Vec<ChangeRef> = match server.bound(to) {
            Some(to) if to > from => server
                .changes
                .range(from + 1..=to)
                .rev()
                .map(|(id, _)| ChangeRef::Change(*id))
                .collect(),
            _ => Vec::new(),
        };
        changes.extend(server.extra.iter().cloned());

        Ok(changes)
    }

    async fn describe(&self, change: u32) -> Result<Changelist, Error> {
        self.server()
            .changes
            .get(&change)
            .cloned()
            .ok_or_else(|| Error::Rejected(format!("no such change {}", change)))
    }

    async fn latest_change(&self, at: &RevisionMarker) -> Result<Option<u32>, Error> {
        let server = self.server();
        if server.fail_changes {
            return Err(Error::Rejected(String::from("changes")));
        }

        Ok(server.bound(at))
    }

    async fn is_stale(&self) -> Result<bool, Error> {
        Ok(self.server().stale)
    }

    async fn sync(&self, target: &RevisionMarker, populate: &Populate) -> Result<(), Error> {
        let mut server = self.server();
        server
            .syncs
            .push((self.client.clone(), target.clone(), populate.kind));
        if server.fail_sync {
            return Err(Error::Rejected(String::from("sync")));
        }

        match server.bound(target) {
            Some(change) if *target != RevisionMarker::Change(0) => {
                server.have.insert(self.client.clone(), change);
            }
            _ => {
                server.have.remove(&self.client);
            }
        }

        Ok(())
    }

    async fn label_revision_spec(&self, name: &str) -> Result<Option<String>, Error> {
        let mut server = self.server();
        server.label_lookups += 1;
        if server.fail_labels {
            return Err(Error::Rejected(String::from("labels")));
        }

        server
            .labels
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Rejected(format!("no such label {}", name)))
    }

    fn disconnect(&self) {
        self.server().disconnects += 1;
    }
}
