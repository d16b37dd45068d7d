//! Environment variables passed between the host and builds.

use changelist::RevisionMarker;
use p4_scm_state::{BuildId, BuildRevisionRecord};

use crate::{
    client::Connector,
    resolver,
    workspace::Environment,
};

/// The change a build synced.
pub const CHANGELIST: &str = "P4_CHANGELIST";

/// The client workspace a build synced.
pub const CLIENT: &str = "P4_CLIENT";

pub const JOB_NAME: &str = "JOB_NAME";
pub const BUILD_NUMBER: &str = "BUILD_NUMBER";

/// The environment of this process.
pub fn host() -> Environment {
    std::env::vars().collect()
}

/// Adds the identity of a build to an environment.
pub fn for_build(base: &Environment, build: &BuildId) -> Environment {
    let mut env = base.clone();
    env.insert(JOB_NAME.to_string(), build.job.clone());
    env.insert(BUILD_NUMBER.to_string(), build.number.to_string());
    env
}

/// Returns the variables describing what a build synced.
///
/// A build synced to a label exports the change the label currently points
/// at, if the server can tell us; otherwise the label name is exported as is.
pub async fn export<K: Connector>(connector: &K, record: &BuildRevisionRecord) -> Environment {
    let mut env = Environment::new();
    env.insert(CLIENT.to_string(), record.client.clone());

    let change = match &record.revision {
        RevisionMarker::Head => None,
        RevisionMarker::Change(change) => Some(change.to_string()),
        RevisionMarker::Label(label) => Some(resolve(connector, record, label).await),
    };
    if let Some(change) = change {
        env.insert(CHANGELIST.to_string(), change);
    }

    env
}

async fn resolve<K: Connector>(connector: &K, record: &BuildRevisionRecord, label: &str) -> String {
    let conn = match connector.session(&record.credential, &record.client).await {
        Ok(conn) => conn,
        Err(e) => {
            log::warn!("P4: cannot resolve label {}: {}", label, e);
            return label.to_string();
        }
    };

    resolver::resolve_label(&*conn, label).await.to_string()
}
