//! In-memory state management for `p4-scm`: the revision each build synced,
//! the changelog computed for it, and the next change each per-change gated
//! job should build.
//!
//! The whole state is small enough to be persisted to a single file after
//! every command. Several commands may run at once against the same file, so
//! persisting takes a file lock and merges into what is already on disk.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
    sync::Arc,
};

use changelist::LogEntry;
use tempfile::NamedTempFile;
use tokio::sync::RwLock;

mod build;
pub use build::{BuildId, BuildRevisionRecord};

mod edits;
use edits::{Edits, GateEdit};

mod error;
pub use self::error::Error;

mod gate;
mod lock;
use lock::StateLock;

mod v1;

#[derive(Debug, Clone, Default)]
pub struct Manager {
    builds: Arc<RwLock<build::Store>>,
    gates: Arc<RwLock<gate::Store>>,
    edits: Arc<RwLock<Edits>>,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a build, which may or may not go on to record a revision.
    pub async fn register_build(&self, id: &BuildId) {
        self.builds.write().await.register(id);
        self.edits.write().await.touch_build(id);
    }

    pub async fn attach_record(
        &self,
        id: &BuildId,
        record: BuildRevisionRecord,
    ) -> Result<Arc<BuildRevisionRecord>, Error> {
        let mut builds = self.builds.write().await;
        let build = builds.get_mut(id);
        if build.record.is_some() {
            return Err(Error::RecordExists(id.clone()));
        }

        let record = Arc::new(record);
        build.record = Some(record.clone());
        self.edits.write().await.touch_build(id);
        Ok(record)
    }

    pub async fn attach_changelog(&self, id: &BuildId, changelog: Vec<LogEntry>) {
        self.builds.write().await.get_mut(id).changelog = Some(Arc::new(changelog));
        self.edits.write().await.touch_build(id);
    }

    pub async fn get_record(&self, id: &BuildId) -> Option<Arc<BuildRevisionRecord>> {
        self.builds
            .read()
            .await
            .get(id)
            .and_then(|build| build.record.clone())
    }

    pub async fn get_changelog(&self, id: &BuildId) -> Option<Arc<Vec<LogEntry>>> {
        self.builds
            .read()
            .await
            .get(id)
            .and_then(|build| build.changelog.clone())
    }

    /// Returns the build immediately preceding the given build of the same
    /// job, along with its revision record if it has one.
    pub async fn get_previous_build(
        &self,
        id: &BuildId,
    ) -> Option<(BuildId, Option<Arc<BuildRevisionRecord>>)> {
        self.builds
            .read()
            .await
            .previous(id)
            .map(|(id, build)| (id.clone(), build.record.clone()))
    }

    /// Returns the most recent revision record of the job.
    pub async fn get_last_record(&self, job: &str) -> Option<(BuildId, Arc<BuildRevisionRecord>)> {
        self.builds
            .read()
            .await
            .last_record(job)
            .map(|(id, record)| (id.clone(), record.clone()))
    }

    pub async fn get_next_change(&self, job: &str) -> Option<u32> {
        self.gates.read().await.get(job)
    }

    pub async fn set_next_change(&self, job: &str, change: Option<u32>) {
        self.gates.write().await.set(job, change);
        self.edits
            .write()
            .await
            .touch_gate(job, GateEdit::Set(change));
    }

    /// Removes and returns the next change for the job.
    pub async fn take_next_change(&self, job: &str) -> Option<u32> {
        let taken = self.gates.write().await.take(job);
        if let Some(change) = taken {
            self.edits
                .write()
                .await
                .touch_gate(job, GateEdit::Taken(change));
        }
        taken
    }

    pub async fn serialize_into<W>(&self, writer: W) -> Result<(), Error>
    where
        W: Write,
    {
        v1::serialize_into(self, writer).await
    }

    pub fn deserialize_from<R>(reader: R) -> Result<Self, Error>
    where
        R: Read,
    {
        v1::deserialize_from(reader)
    }

    /// Writes the state to the given path. The changes made through this
    /// manager are merged into the current contents of the file under an
    /// exclusive lock, and the file is then replaced atomically. Afterwards
    /// this manager holds the merged state.
    pub async fn persist_to_file(&self, path: &Path) -> Result<(), Error> {
        let _lock = StateLock::acquire(path)?;

        let current = Self::load_from_file(path)?;
        self.merge_into(&current).await;
        current.write_to_file(path).await?;

        std::mem::swap(
            &mut *self.builds.write().await,
            &mut *current.builds.write().await,
        );
        std::mem::swap(
            &mut *self.gates.write().await,
            &mut *current.gates.write().await,
        );
        self.edits.write().await.clear();

        log::debug!("state persisted to {}", path.display());
        Ok(())
    }

    async fn merge_into(&self, other: &Manager) {
        let edits = self.edits.read().await;

        let builds = self.builds.read().await;
        let mut other_builds = other.builds.write().await;
        for id in edits.builds.iter() {
            builds.merge_into(id, &mut other_builds);
        }

        let mut other_gates = other.gates.write().await;
        for (job, edit) in edits.gates.iter() {
            other_gates.apply(job, *edit);
        }
    }

    async fn write_to_file(&self, path: &Path) -> Result<(), Error> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let file = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(file.as_file());
            self.serialize_into(&mut writer).await?;
            writer.flush()?;
        }
        file.persist(path)?;
        Ok(())
    }

    /// Loads the state from the given path. A missing file is an empty state.
    pub fn load_from_file(path: &Path) -> Result<Self, Error> {
        match File::open(path) {
            Ok(file) => Self::deserialize_from(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no state file at {}; starting afresh", path.display());
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use changelist::{Changelist, RevisionMarker};
    use tempfile::TempDir;

    use super::*;

    fn record(revision: RevisionMarker) -> BuildRevisionRecord {
        BuildRevisionRecord {
            client: String::from("build-ws"),
            credential: String::from("main"),
            revision,
        }
    }

    #[test]
    fn test_records() {
        let manager = Manager::new();
        let first = BuildId::new("app", 1);
        let second = BuildId::new("app", 2);

        tokio_test::block_on(async {
            manager.register_build(&first).await;
            assert_eq!(manager.get_record(&first).await, None);

            let attached = manager
                .attach_record(&first, record(RevisionMarker::Change(10)))
                .await
                .unwrap();
            assert_eq!(attached.revision, RevisionMarker::Change(10));
            assert!(matches!(
                manager
                    .attach_record(&first, record(RevisionMarker::Change(11)))
                    .await,
                Err(Error::RecordExists(id)) if id == first
            ));
            assert_eq!(
                manager.get_record(&first).await.unwrap().revision,
                RevisionMarker::Change(10)
            );

            manager.register_build(&second).await;
            assert_eq!(
                manager.get_previous_build(&second).await,
                Some((first.clone(), Some(attached.clone())))
            );
            assert_eq!(manager.get_previous_build(&first).await, None);
        });
    }

    #[test]
    fn test_previous_build_is_per_job() {
        let manager = Manager::new();

        tokio_test::block_on(async {
            manager.register_build(&BuildId::new("api", 7)).await;
            manager.register_build(&BuildId::new("app", 3)).await;
            manager.register_build(&BuildId::new("web", 1)).await;

            assert_eq!(
                manager.get_previous_build(&BuildId::new("app", 5)).await,
                Some((BuildId::new("app", 3), None))
            );
            assert_eq!(
                manager.get_previous_build(&BuildId::new("app", 3)).await,
                None
            );
            assert_eq!(
                manager.get_previous_build(&BuildId::new("web", 1)).await,
                None
            );
        });
    }

    #[test]
    fn test_last_record() {
        let manager = Manager::new();

        tokio_test::block_on(async {
            assert_eq!(manager.get_last_record("app").await, None);

            manager
                .attach_record(&BuildId::new("app", 1), record(RevisionMarker::Change(5)))
                .await
                .unwrap();
            manager
                .attach_record(
                    &BuildId::new("app", 2),
                    record(RevisionMarker::Label(String::from("REL"))),
                )
                .await
                .unwrap();
            manager.register_build(&BuildId::new("app", 3)).await;
            manager
                .attach_record(&BuildId::new("other", 9), record(RevisionMarker::Head))
                .await
                .unwrap();

            let (id, last) = manager.get_last_record("app").await.unwrap();
            assert_eq!(id, BuildId::new("app", 2));
            assert_eq!(last.revision, RevisionMarker::Label(String::from("REL")));
        });
    }

    #[test]
    fn test_next_change() {
        let manager = Manager::new();

        tokio_test::block_on(async {
            manager.set_next_change("app", Some(101)).await;
            assert_eq!(manager.get_next_change("app").await, Some(101));
            assert_eq!(manager.get_next_change("web").await, None);

            assert_eq!(manager.take_next_change("app").await, Some(101));
            assert_eq!(manager.take_next_change("app").await, None);

            manager.set_next_change("app", Some(7)).await;
            manager.set_next_change("app", None).await;
            assert_eq!(manager.get_next_change("app").await, None);
        });
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        let id = BuildId::new("app", 4);

        let manager = Manager::load_from_file(&path).unwrap();
        tokio_test::block_on(async {
            manager
                .attach_record(&id, record(RevisionMarker::Change(42)))
                .await
                .unwrap();
            manager
                .attach_changelog(
                    &id,
                    vec![LogEntry::Change(Changelist::new(42, "bob"))],
                )
                .await;
            manager.set_next_change("app", Some(43)).await;
            manager.persist_to_file(&path).await.unwrap();
        });

        let loaded = Manager::load_from_file(&path).unwrap();
        tokio_test::block_on(async {
            assert_eq!(
                loaded.get_record(&id).await.unwrap().revision,
                RevisionMarker::Change(42)
            );
            assert_eq!(
                *loaded.get_changelog(&id).await.unwrap(),
                vec![LogEntry::Change(Changelist::new(42, "bob"))]
            );
            assert_eq!(loaded.get_next_change("app").await, Some(43));
        });
    }

    #[test]
    fn test_persistence_merges_concurrent_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");
        let app = BuildId::new("app", 1);
        let web = BuildId::new("web", 1);

        let first = Manager::load_from_file(&path).unwrap();
        let second = Manager::load_from_file(&path).unwrap();
        tokio_test::block_on(async {
            first
                .attach_record(&app, record(RevisionMarker::Change(10)))
                .await
                .unwrap();
            second
                .attach_record(&web, record(RevisionMarker::Change(20)))
                .await
                .unwrap();
            second.set_next_change("web", Some(21)).await;

            first.persist_to_file(&path).await.unwrap();
            second.persist_to_file(&path).await.unwrap();

            // The later writer picks up what the earlier one persisted.
            assert_eq!(
                second.get_record(&app).await.unwrap().revision,
                RevisionMarker::Change(10)
            );
        });

        let loaded = Manager::load_from_file(&path).unwrap();
        tokio_test::block_on(async {
            assert_eq!(
                loaded.get_record(&app).await.unwrap().revision,
                RevisionMarker::Change(10)
            );
            assert_eq!(
                loaded.get_record(&web).await.unwrap().revision,
                RevisionMarker::Change(20)
            );
            assert_eq!(loaded.get_next_change("web").await, Some(21));
        });
    }

    #[test]
    fn test_persistence_keeps_moved_gate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");

        tokio_test::block_on(async {
            let seed = Manager::new();
            seed.set_next_change("app", Some(101)).await;
            seed.set_next_change("web", Some(7)).await;
            seed.persist_to_file(&path).await.unwrap();
        });

        let checkout = Manager::load_from_file(&path).unwrap();
        let poll = Manager::load_from_file(&path).unwrap();
        tokio_test::block_on(async {
            assert_eq!(checkout.take_next_change("app").await, Some(101));
            assert_eq!(checkout.take_next_change("web").await, Some(7));
            poll.set_next_change("app", Some(103)).await;

            poll.persist_to_file(&path).await.unwrap();
            checkout.persist_to_file(&path).await.unwrap();
        });

        let loaded = Manager::load_from_file(&path).unwrap();
        tokio_test::block_on(async {
            assert_eq!(loaded.get_next_change("app").await, Some(103));
            assert_eq!(loaded.get_next_change("web").await, None);
        });
    }

    #[test]
    fn test_unknown_version() {
        let mut buf = Vec::new();
        bincode::serialize_into(&mut buf, &(2u8, Vec::<u8>::new(), Vec::<u8>::new())).unwrap();

        assert!(matches!(
            Manager::deserialize_from(buf.as_slice()),
            Err(Error::UnknownSerialisationVersion(2))
        ));
    }
}
