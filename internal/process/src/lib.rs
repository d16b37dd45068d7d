//! `process` wraps the `p4` command line client, and provides typed methods
//! for the handful of server queries needed to poll and sync a workspace.

use std::{
    ffi::OsString,
    time::{Duration, SystemTime},
};

use changelist::{ChangeRef, Changelist, FileSpec, Populate, PopulateKind, RevisionMarker};
use structopt::StructOpt;

mod error;
mod preflight;
mod process;
mod ztag;

pub use self::error::Error;
pub use self::preflight::preflight;
pub use self::ztag::Record;

// Command line options that are required by the [`Client`] object.
//
// These should be injected into the global `StructOpt` implementation using the
// `flatten` attribute.
#[derive(Clone, Debug, StructOpt)]
pub struct Opt {
    #[structopt(
        long = "--p4",
        default_value = "p4",
        parse(from_os_str),
        help = "path to the p4 command"
    )]
    p4_command: OsString,

    #[structopt(long, help = "a global p4 option to add when invoking p4")]
    p4_global_option: Vec<String>,

    #[structopt(
        long,
        default_value = "60s",
        parse(try_from_str = parse_duration::parse::parse),
        help = "maximum time to wait for a single p4 command"
    )]
    timeout: Duration,
}

/// A connection to a Perforce server, bound to one user and one client
/// workspace.
///
/// Each method runs a single `p4` command; there is no long lived session to
/// tear down beyond dropping the client.
#[derive(Debug, Clone)]
pub struct Client {
    opt: Opt,
    globals: Vec<String>,
    client: String,
}

impl Client {
    pub fn new(opt: &Opt, port: &str, user: &str, client: &str) -> Self {
        Self {
            opt: opt.clone(),
            globals: vec![
                "-p".into(),
                port.into(),
                "-u".into(),
                user.into(),
                "-c".into(),
                client.into(),
            ],
            client: client.to_string(),
        }
    }

    /// The client workspace name.
    pub fn name(&self) -> &str {
        &self.client
    }

    /// Checks that the server is reachable and the user is authenticated.
    pub async fn info(&self) -> Result<Record, Error> {
        self.tagged(&["info"])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::MissingField(String::from("serverAddress")))
    }

    /// Returns the highest change synced into the workspace, if any.
    pub async fn have_changes(&self) -> Result<Vec<u32>, Error> {
        let path = format!("{}#have", self.depot_view());
        self.tagged(&["changes", "-m1", "-s", "submitted", path.as_str()])
            .await?
            .iter()
            .map(|record| record.parse("change"))
            .collect()
    }

    /// Lists the submitted changes after `from`, up to and including `to`,
    /// newest first.
    ///
    /// Entries that aren't change numbers are passed through as
    /// [`ChangeRef::Other`].
    pub async fn changes(&self, from: u32, to: &RevisionMarker) -> Result<Vec<ChangeRef>, Error> {
        let path = format!(
            "{}@{},{}",
            self.depot_view(),
            from.saturating_add(1),
            to.to_revision_spec()
        );

        self.tagged(&["changes", "-s", "submitted", path.as_str()])
            .await?
            .iter()
            .map(|record| {
                let change = record.required("change")?;
                Ok(match change.parse::<u32>() {
                    Ok(id) => ChangeRef::Change(id),
                    Err(_) => ChangeRef::Other(change.to_string()),
                })
            })
            .collect()
    }

    /// Returns the latest submitted change visible to the workspace at the
    /// given revision.
    pub async fn latest_change(&self, at: &RevisionMarker) -> Result<Option<u32>, Error> {
        let path = format!("{}{}", self.depot_view(), at.to_revision_spec());
        match self
            .tagged(&["changes", "-m1", "-s", "submitted", path.as_str()])
            .await?
            .first()
        {
            Some(record) => Ok(Some(record.parse("change")?)),
            None => Ok(None),
        }
    }

    /// Fetches the summary of a submitted change, without diffs.
    pub async fn describe(&self, change: u32) -> Result<Changelist, Error> {
        let id = change.to_string();
        let records = self.tagged(&["describe", "-s", id.as_str()]).await?;
        let record = records
            .first()
            .ok_or_else(|| Error::MissingField(String::from("change")))?;

        let mut changelist = Changelist::new(record.parse("change")?, record.required("user")?);
        changelist.client = record.get("client").unwrap_or_default().to_string();
        changelist.description = record.get("desc").unwrap_or_default().to_string();
        changelist.time = SystemTime::UNIX_EPOCH
            + Duration::from_secs(match record.get("time") {
                Some(_) => record.parse("time")?,
                None => 0,
            });

        for i in 0.. {
            let depot_path = match record.get(&format!("depotFile{}", i)) {
                Some(path) => path,
                None => break,
            };
            let revision = record
                .get(&format!("rev{}", i))
                .and_then(|rev| rev.parse().ok());
            let action = record.get(&format!("action{}", i)).unwrap_or_default();

            changelist
                .files
                .push(FileSpec::new(depot_path, revision, action));
        }

        Ok(changelist)
    }

    /// Returns true if syncing the workspace to head would change anything.
    pub async fn needs_sync(&self) -> Result<bool, Error> {
        let path = format!("{}#head", self.depot_view());
        let output =
            process::run(&self.opt, &self.globals, &["sync", "-n", path.as_str()]).await?;
        if is_up_to_date(&output.stderr) {
            return Ok(false);
        }

        let output = output.success()?;
        Ok(!ztag::parse(&output.stdout).is_empty())
    }

    /// Syncs the workspace to the given revision.
    pub async fn sync(&self, target: &RevisionMarker, populate: &Populate) -> Result<(), Error> {
        let view = self.depot_view();

        if populate.kind == PopulateKind::AutoClean {
            let output =
                process::run(&self.opt, &self.globals, &["reconcile", "-w", view.as_str()])
                    .await?;
            if !is_up_to_date(&output.stderr) {
                output.success()?;
            }
        }

        let mut args = vec!["sync"];
        if populate.kind == PopulateKind::ForceClean {
            args.push("-f");
            if !populate.have {
                args.push("-p");
            }
        }
        if populate.quiet {
            args.push("-q");
        }
        let path = format!("{}{}", view, target.to_revision_spec());
        args.push(&path);

        let output = process::run(&self.opt, &self.globals, args.as_slice()).await?;
        if !is_up_to_date(&output.stderr) {
            output.success()?;
        }

        Ok(())
    }

    /// Returns the revision spec a label is bound to, if it has one.
    ///
    /// Returns [`Error::UnknownLabel`] if no such label exists.
    pub async fn label_revision(&self, name: &str) -> Result<Option<String>, Error> {
        if self.tagged(&["labels", "-e", name, "-m1"]).await?.is_empty() {
            return Err(Error::UnknownLabel(name.to_string()));
        }

        Ok(self
            .tagged(&["label", "-o", name])
            .await?
            .first()
            .and_then(|record| record.get("Revision"))
            .map(|revision| revision.trim().trim_matches('"').to_string())
            .filter(|revision| !revision.is_empty()))
    }

    async fn tagged(&self, args: &[&str]) -> Result<Vec<Record>, Error> {
        let output = process::run(&self.opt, &self.globals, args)
            .await?
            .success()?;

        Ok(ztag::parse(&output.stdout))
    }

    fn depot_view(&self) -> String {
        format!("//{}/...", self.client)
    }
}

// p4 reports "nothing to do" as a warning on stderr, which some server
// versions accompany with a non-zero exit code.
fn is_up_to_date(stderr: &str) -> bool {
    stderr.contains("up-to-date") || stderr.contains("no file(s) to reconcile")
}
