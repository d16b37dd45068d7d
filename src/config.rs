//! Job configuration, loaded from a TOML file.
//!
//! ```toml
//! [credentials.main]
//! port = "ssl:perforce:1666"
//! user = "builder"
//!
//! [jobs.app]
//! credential = "main"
//! workspace = { name = "build-${JOB_NAME}-${NODE_NAME}" }
//! populate = { kind = "auto-clean", pin = "${RELEASE_LABEL}" }
//! browser = { url = "https://swarm.example.com" }
//!
//! [[jobs.app.filter]]
//! kind = "user"
//! user = "automation"
//! ```

use std::{collections::BTreeMap, path::Path};

use changelist::{Filter, Populate};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("job {0} is not configured")]
    UnknownJob(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub credentials: BTreeMap<String, Credential>,

    #[serde(default)]
    pub jobs: BTreeMap<String, Job>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        std::fs::read_to_string(path)?.parse()
    }

    pub fn job(&self, name: &str) -> Result<&Job, Error> {
        self.jobs
            .get(name)
            .ok_or_else(|| Error::UnknownJob(name.to_string()))
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub port: String,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub credential: String,
    pub workspace: WorkspaceTemplate,

    #[serde(default)]
    pub filter: Vec<Filter>,

    #[serde(default)]
    pub populate: Populate,

    pub browser: Option<Browser>,
}

/// A client workspace whose name may contain `${VAR}` placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceTemplate {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Browser {
    pub url: String,
}

impl Browser {
    pub fn change_link(&self, change: u32) -> String {
        format!("{}/changes/{}", self.url.trim_end_matches('/'), change)
    }
}
