use serde::{Deserialize, Serialize};

use crate::{Changelist, FileSpec};

/// A change filter, as configured on a job.
///
/// Filters are evaluated in order by [`should_exclude`]; the order matters
/// because each path filter only sees the files that survived the path filters
/// before it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Filter {
    /// Excludes changes submitted by the given user, compared
    /// case-insensitively.
    User { user: String },

    /// Excludes files under the given depot path prefix. A change is only
    /// excluded once all of its files have been excluded.
    Path { path: String },

    /// Builds one change at a time. This doesn't exclude anything: the poller
    /// reports the oldest qualifying change as the next build boundary.
    PerChange,
}

/// Returns true if the changelist should not trigger a build.
pub fn should_exclude(changelist: &Changelist, filters: &[Filter]) -> bool {
    let mut files: Vec<&FileSpec> = changelist.files.iter().collect();

    for filter in filters {
        match filter {
            Filter::User { user } => {
                if user.to_lowercase() == changelist.author.to_lowercase() {
                    return true;
                }
            }
            Filter::Path { path } => {
                files.retain(|file| !file.depot_path.starts_with(path.as_str()));
                if files.is_empty() {
                    return true;
                }
            }
            Filter::PerChange => {}
        }
    }

    false
}

/// Returns true if any of the filters asks for per-change builds.
pub fn is_per_change(filters: &[Filter]) -> bool {
    filters.iter().any(|filter| matches!(filter, Filter::PerChange))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(author: &str, paths: &[&str]) -> Changelist {
        paths.iter().fold(Changelist::new(100, author), |cl, path| {
            cl.with_file(FileSpec::new(path, Some(1), "edit"))
        })
    }

    fn user(name: &str) -> Filter {
        Filter::User {
            user: name.to_string(),
        }
    }

    fn path(prefix: &str) -> Filter {
        Filter::Path {
            path: prefix.to_string(),
        }
    }

    #[test]
    fn test_no_filters() {
        // Nothing is ever excluded without filters, not even an empty change.
        assert!(!should_exclude(&change("bob", &[]), &[]));
        assert!(!should_exclude(&change("bob", &["//depot/a/x"]), &[]));
    }

    #[test]
    fn test_user_filter() {
        let cl = change("bob", &["//depot/a/x"]);

        assert!(should_exclude(&cl, &[user("Bob")]));
        assert!(should_exclude(&cl, &[user("BOB")]));
        assert!(!should_exclude(&cl, &[user("alice")]));

        // Any matching user filter in the chain excludes the change.
        assert!(should_exclude(&cl, &[user("alice"), user("bob")]));
    }

    #[test]
    fn test_path_filter() {
        // Every file is under the excluded path.
        assert!(should_exclude(
            &change("bob", &["//depot/a/x"]),
            &[path("//depot/a")]
        ));

        // One file survives.
        assert!(!should_exclude(
            &change("bob", &["//depot/a/x", "//depot/b/y"]),
            &[path("//depot/a")]
        ));

        // Successive path filters narrow the file set until nothing is left.
        assert!(should_exclude(
            &change("bob", &["//depot/a/x", "//depot/b/y"]),
            &[path("//depot/a"), path("//depot/b")]
        ));

        // The prefix match is a plain string match.
        assert!(should_exclude(
            &change("bob", &["//depot/another/x"]),
            &[path("//depot/a")]
        ));
    }

    #[test]
    fn test_per_change_filter() {
        let cl = change("bob", &["//depot/a/x"]);
        let filters = [Filter::PerChange];

        assert!(!should_exclude(&cl, &filters));
        assert!(is_per_change(&filters));
        assert!(!is_per_change(&[user("bob"), path("//depot")]));
    }

    #[test]
    fn test_mixed_chain() {
        let filters = [path("//depot/docs"), Filter::PerChange, user("buildbot")];

        assert!(should_exclude(
            &change("alice", &["//depot/docs/readme"]),
            &filters
        ));
        assert!(should_exclude(
            &change("BuildBot", &["//depot/src/main.c"]),
            &filters
        ));
        assert!(!should_exclude(
            &change("alice", &["//depot/docs/readme", "//depot/src/main.c"]),
            &filters
        ));
    }
}
