//! Server-side change data as seen by the poller and the checkout: submitted
//! changelists, revision markers, change filters and populate options.

mod change;
pub use change::{Changelist, FileSpec, LogEntry};

mod filter;
pub use filter::{is_per_change, should_exclude, Filter};

mod populate;
pub use populate::{Populate, PopulateKind};

mod revision;
pub use revision::{ChangeRef, RevisionMarker};
