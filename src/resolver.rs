//! Turns configured pins into revision markers.
//!
//! Resolution never fails: whenever the server can't tell us more about a
//! label, the name itself is the best marker we have.

use changelist::RevisionMarker;

use crate::{client::Connection, workspace::Workspace};

/// Resolves an unexpanded pin against a workspace. No pin means head.
pub async fn resolve<C: Connection>(conn: &C, pin: Option<&str>, ws: &Workspace) -> RevisionMarker {
    match pin {
        Some(pin) => resolve_expanded(conn, &ws.expand(pin)).await,
        None => RevisionMarker::Head,
    }
}

/// Resolves a pin that has already been expanded. Change numbers and empty
/// pins never reach the server.
pub async fn resolve_expanded<C: Connection>(conn: &C, pin: &str) -> RevisionMarker {
    match RevisionMarker::from(pin) {
        RevisionMarker::Label(name) => resolve_label(conn, &name).await,
        marker => marker,
    }
}

/// Resolves a label to the change it is bound to, if it is bound to one.
pub async fn resolve_label<C: Connection>(conn: &C, name: &str) -> RevisionMarker {
    match conn.label_revision_spec(name).await {
        Ok(Some(spec)) => match spec.trim().trim_start_matches('@').parse::<u32>() {
            Ok(change) => {
                log::debug!("P4: label {} resolved to change {}", name, change);
                RevisionMarker::Change(change)
            }
            Err(_) => {
                log::debug!("P4: label {} has a non-numeric revision {}", name, spec);
                RevisionMarker::Label(name.to_string())
            }
        },
        Ok(None) => RevisionMarker::Label(name.to_string()),
        Err(e) => {
            log::debug!("P4: {} is not a usable label: {}", name, e);
            RevisionMarker::Label(name.to_string())
        }
    }
}
