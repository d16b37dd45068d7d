use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// A point in server history.
///
/// Only `Change` markers are ordered: a label is a mutable pointer on the
/// server and has to be resolved before it can be compared with anything.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum RevisionMarker {
    /// Whatever the server considers latest at the time of the request.
    #[display(fmt = "now")]
    Head,

    #[display(fmt = "{}", _0)]
    Change(u32),

    #[display(fmt = "{}", _0)]
    Label(String),
}

impl RevisionMarker {
    pub fn as_change(&self) -> Option<u32> {
        match self {
            Self::Change(change) => Some(*change),
            _ => None,
        }
    }

    /// Formats the marker as a revision specifier suffix, suitable for
    /// appending to a file pattern.
    pub fn to_revision_spec(&self) -> String {
        match self {
            Self::Head => String::from("#head"),
            Self::Change(change) => format!("@{}", change),
            Self::Label(label) => format!("@{}", label),
        }
    }
}

impl From<&str> for RevisionMarker {
    /// Interprets an already expanded pin without asking the server anything:
    /// empty means head, digits are a change number, anything else is treated
    /// as a label name.
    fn from(pin: &str) -> Self {
        let pin = pin.trim();
        if pin.is_empty() {
            Self::Head
        } else if let Ok(change) = pin.parse::<u32>() {
            Self::Change(change)
        } else {
            Self::Label(pin.to_string())
        }
    }
}

/// An entry in a change listing returned by the server.
///
/// Listings are expected to contain change numbers, but label-bounded queries
/// have been seen to return other tokens; those are kept so callers can decide
/// to skip them.
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum ChangeRef {
    Change(u32),
    Other(String),
}

impl ChangeRef {
    pub fn as_change(&self) -> Option<u32> {
        match self {
            Self::Change(change) => Some(*change),
            Self::Other(_) => None,
        }
    }
}
