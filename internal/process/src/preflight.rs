use std::{fmt::Display, process::Output};

use crate::Opt;

/// Preflights p4 using the given options, ensuring that the command exists
/// and is executable before any job is processed.
pub fn preflight(opt: &Opt) -> Result<(), crate::Error> {
    // p4 -V only prints version information and never contacts a server.
    let output = std::process::Command::new(&opt.p4_command)
        .arg("-V")
        .output()
        .map_err(crate::Error::Spawn)?;

    if output.status.success() {
        Ok(())
    } else {
        Err(crate::Error::Preflight(Error::new(opt, output)))
    }
}

#[derive(Debug)]
pub struct Error {
    command: String,
    output: Output,
}

impl Error {
    fn new(opt: &Opt, output: Output) -> Self {
        Self {
            command: format!("{} -V", opt.p4_command.to_string_lossy()),
            output,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "running {} failed with {}\n\nstderr:\n{}\n",
            self.command,
            match self.output.status.code() {
                Some(code) => format!("exit code {}", code),
                None => "signal".into(),
            },
            String::from_utf8_lossy(&self.output.stderr)
        )
    }
}

impl std::error::Error for Error {}
