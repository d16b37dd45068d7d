use changelist::{Populate, RevisionMarker};
use p4_scm_state::BuildRevisionRecord;

use crate::client::{Connection, Connector};

/// Removes every file of a workspace that is about to be deleted, by syncing
/// its client to an empty revision.
///
/// This is best effort: failures are logged, and the caller goes ahead with
/// the deletion regardless. Returns true if the unsync succeeded.
pub async fn unsync<K: Connector>(
    connector: &K,
    job: &str,
    record: Option<&BuildRevisionRecord>,
) -> bool {
    let record = match record {
        Some(record) => record,
        None => {
            log::warn!("P4: no build of {} recorded a workspace; nothing to clean up", job);
            return false;
        }
    };

    let conn = match connector.session(&record.credential, &record.client).await {
        Ok(conn) => conn,
        Err(e) => {
            log::warn!("P4: cannot connect to clean up {}: {}", &record.client, e);
            return false;
        }
    };

    let result = conn
        .sync(&RevisionMarker::Change(0), &Populate::force_clean(false))
        .await;
    drop(conn);

    match result {
        Ok(()) => {
            log::info!("P4: removed files from workspace {}", &record.client);
            true
        }
        Err(e) => {
            log::warn!("P4: cannot clean up {}: {}", &record.client, e);
            false
        }
    }
}
