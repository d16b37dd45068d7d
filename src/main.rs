use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};

use changelist::LogEntry;
use checkout::Checkout;
use client::P4Connector;
use config::{Browser, Config};
use p4_scm_state::{BuildId, Manager};
use poll::{PollDecision, Poller};
use store::BuildStore;
use structopt::StructOpt;
use tokio::task;
use workspace::Environment;

mod changelog;
mod checkout;
mod cleanup;
mod client;
mod config;
mod environment;
#[cfg(test)]
mod fake;
mod poll;
mod resolver;
mod store;
mod workspace;

#[derive(Debug, StructOpt)]
#[structopt(
    about = "Polls Perforce client workspaces for new changes, and syncs them for builds."
)]
struct Opt {
    #[structopt(
        short,
        long,
        default_value = "p4-scm.toml",
        parse(from_os_str),
        help = "job configuration file"
    )]
    config: PathBuf,

    #[structopt(short, long = "state", parse(from_os_str), help = "state file")]
    state_file: PathBuf,

    #[structopt(flatten)]
    p4: p4_scm_process::Opt,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Checks whether jobs have changes to build.
    Poll {
        #[structopt(short, long, help = "number of parallel workers")]
        jobs: Option<usize>,

        #[structopt(help = "jobs to poll; all configured jobs if omitted")]
        names: Vec<String>,
    },

    /// Syncs the workspace of a build and records what was synced.
    Checkout {
        job: String,
        build: u64,

        #[structopt(long, parse(from_os_str), help = "file to write the changelog to")]
        changelog: Option<PathBuf>,
    },

    /// Prints the environment exported by a build.
    Env { job: String, build: u64 },

    /// Prints the changelog of a build.
    Changes {
        job: String,
        build: u64,

        #[structopt(long, parse(from_os_str), help = "read the changelog from a file instead")]
        file: Option<PathBuf>,
    },

    /// Removes the files of a job's workspace before it is deleted.
    Cleanup { job: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments.
    let opt = Opt::from_args();

    // Set up logging.
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")?.start()?;

    // Ensure p4 is usable before we go any further.
    p4_scm_process::preflight(&opt.p4)?;

    let config = Config::load(&opt.config)?;
    let store = Manager::load_from_file(&opt.state_file)?;
    let connector = P4Connector::new(&opt.p4, &config.credentials);

    match opt.command {
        Command::Poll { jobs, names } => {
            let names = if names.is_empty() {
                config.jobs.keys().cloned().collect()
            } else {
                names
            };

            let decisions = poll_jobs(
                &connector,
                &store,
                &config,
                names,
                jobs.unwrap_or_else(num_cpus::get),
            )
            .await?;
            for (name, decision) in decisions {
                println!("{}: {}", name, decision);
            }

            store.persist_to_file(&opt.state_file).await?;
        }
        Command::Checkout {
            job,
            build,
            changelog,
        } => {
            let build = BuildId::new(&job, build);
            let env = environment::for_build(&environment::host(), &build);
            let result = Checkout::new(&connector, &store, config.job(&job)?)
                .run(&build, &env)
                .await;

            // Failed builds are remembered too, so the next build knows not to
            // compute a changelog against them.
            store.persist_to_file(&opt.state_file).await?;
            let outcome = result?;

            if let Some(path) = changelog {
                write_changelog(&path, &outcome.changelog)?;
            }
            for (key, value) in environment::export(&connector, &outcome.record).await {
                println!("{}={}", key, value);
            }
        }
        Command::Env { job, build } => {
            let build = BuildId::new(&job, build);
            let record = match store.record(&build).await {
                Some(record) => record,
                None => anyhow::bail!("build {} did not record a revision", &build),
            };

            for (key, value) in environment::export(&connector, &record).await {
                println!("{}={}", key, value);
            }
        }
        Command::Changes { job, build, file } => {
            let browser = config.job(&job)?.browser.as_ref();
            let entries = match file {
                Some(path) => changeset::parse(&std::fs::read(path)?)?,
                None => {
                    let build = BuildId::new(&job, build);
                    match store.changelog(&build).await {
                        Some(changelog) => changelog.to_vec(),
                        None => anyhow::bail!("build {} has no changelog", &build),
                    }
                }
            };

            for entry in entries.iter() {
                println!("{}", display_entry(entry, browser));
            }
        }
        Command::Cleanup { job } => {
            config.job(&job)?;
            let record = store.last_record(&job).await.map(|(_, record)| record);
            cleanup::unsync(&connector, &job, record.as_deref()).await;
        }
    }

    Ok(())
}

/// Polls jobs on a pool of workers, returning the decisions sorted by job.
async fn poll_jobs(
    connector: &P4Connector,
    store: &Manager,
    config: &Config,
    names: Vec<String>,
    workers: usize,
) -> anyhow::Result<Vec<(String, PollDecision)>> {
    for name in names.iter() {
        config.job(name)?;
    }

    let config = Arc::new(config.clone());
    let env = Arc::new(environment::host());
    let (tx, rx) = flume::unbounded::<String>();
    let (result_tx, result_rx) = flume::unbounded::<(String, PollDecision)>();

    let mut handles = Vec::with_capacity(workers);
    for _i in 0..workers.max(1) {
        let local_rx = rx.clone();
        let local_result_tx = result_tx.clone();
        let local_connector = connector.clone();
        let local_store = store.clone();
        let local_config = config.clone();
        let local_env: Arc<Environment> = env.clone();

        handles.push(task::spawn(async move {
            while let Ok(name) = local_rx.recv_async().await {
                log::trace!("polling {}", &name);
                let job = match local_config.job(&name) {
                    Ok(job) => job,
                    Err(e) => {
                        log::warn!("error polling {}: {}", &name, e);
                        continue;
                    }
                };

                let decision = Poller::new(&local_connector, &local_store, &local_env)
                    .poll(&name, job)
                    .await;
                local_result_tx.send_async((name, decision)).await?;
            }

            Ok::<(), anyhow::Error>(())
        }));
    }
    drop(result_tx);

    for name in names {
        tx.send_async(name).await?;
    }
    drop(tx);

    for handle in handles {
        handle.await??;
    }

    let mut decisions: Vec<(String, PollDecision)> = result_rx.drain().collect();
    decisions.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(decisions)
}

fn write_changelog(path: &Path, entries: &[LogEntry]) -> anyhow::Result<()> {
    changeset::store(BufWriter::new(File::create(path)?), entries)?;
    log::debug!("changelog written to {}", path.display());

    Ok(())
}

/// Formats a changelog entry as a single line.
fn display_entry(entry: &LogEntry, browser: Option<&Browser>) -> String {
    match entry {
        LogEntry::Change(changelist) => {
            let mut line = format!(
                "{} {} {}",
                changelist.id,
                changelist.author,
                changelist.description.lines().next().unwrap_or_default()
            );
            if let Some(browser) = browser {
                line.push_str(&format!(" <{}>", browser.change_link(changelist.id)));
            }
            line
        }
        LogEntry::Label(label) => format!("label {}", label),
    }
}
