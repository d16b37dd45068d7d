//! Computes the changes a build picked up since the previous one.

use changelist::{ChangeRef, LogEntry, RevisionMarker};

use crate::{
    client::{Connection, Error},
    resolver,
};

/// Lists the changes after `from`, up to and including `to`, newest first.
///
/// A label on either end is resolved the same way a pin would be. A `from`
/// marker that is still a label after resolution is looked up as the latest
/// change the label includes.
pub async fn delta<C: Connection>(
    conn: &C,
    from: &RevisionMarker,
    to: &RevisionMarker,
) -> Result<Vec<RevisionMarker>, Error> {
    let from = match from {
        RevisionMarker::Label(name) => match resolver::resolve_label(conn, name).await {
            RevisionMarker::Change(change) => change,
            label => conn.latest_change(&label).await?.unwrap_or_default(),
        },
        RevisionMarker::Change(change) => *change,
        RevisionMarker::Head => 0,
    };

    let to = match to {
        RevisionMarker::Label(name) => resolver::resolve_label(conn, name).await,
        other => other.clone(),
    };

    log::debug!("P4: changelog from {} to {}", from, &to);
    Ok(conn
        .list_changes(from, &to)
        .await?
        .iter()
        .filter_map(ChangeRef::as_change)
        .map(RevisionMarker::Change)
        .collect())
}

/// Describes each marker. Labels that couldn't be resolved to a change are
/// kept by name.
pub async fn entries<C: Connection>(
    conn: &C,
    markers: &[RevisionMarker],
) -> Result<Vec<LogEntry>, Error> {
    let mut entries = Vec::with_capacity(markers.len());
    for marker in markers {
        match marker {
            RevisionMarker::Change(change) => {
                entries.push(LogEntry::Change(conn.describe(*change).await?))
            }
            RevisionMarker::Label(label) => entries.push(LogEntry::Label(label.clone())),
            RevisionMarker::Head => {}
        }
    }

    Ok(entries)
}
