use std::{ffi::OsStr, process::Stdio};

use tokio::process::Command;

use crate::{error::Error, Opt};

/// The captured result of a single `p4` invocation.
#[derive(Debug)]
pub(crate) struct Output {
    pub(crate) command: String,
    pub(crate) status: std::process::ExitStatus,
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: String,
}

impl Output {
    /// Converts a failed invocation into an error.
    pub(crate) fn success(self) -> Result<Self, Error> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(Error::Command {
                status: match self.status.code() {
                    Some(code) => format!("exit code {}", code),
                    None => "signal".into(),
                },
                command: self.command,
                stderr: self.stderr,
            })
        }
    }
}

/// Runs `p4` in tagged mode with the given connection options and arguments.
///
/// The child is killed if it doesn't exit before the configured timeout.
pub(crate) async fn run<S>(opt: &Opt, globals: &[String], args: &[S]) -> Result<Output, Error>
where
    S: AsRef<OsStr>,
{
    let command = describe(opt, args);
    log::debug!("running {}", &command);

    let child = Command::new(&opt.p4_command)
        .args(opt.p4_global_option.iter())
        .arg("-ztag")
        .args(globals.iter())
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(Error::Spawn)?;

    let output = match tokio::time::timeout(opt.timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            log::warn!("{} timed out after {:?}", &command, opt.timeout);
            return Err(Error::Timeout {
                command,
                timeout: opt.timeout,
            });
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    for line in stderr.lines() {
        log::debug!("{}", line);
    }

    Ok(Output {
        command,
        status: output.status,
        stdout: output.stdout,
        stderr,
    })
}

fn describe<S: AsRef<OsStr>>(opt: &Opt, args: &[S]) -> String {
    let mut command = opt.p4_command.to_string_lossy().into_owned();
    for arg in args {
        command.push(' ');
        command.push_str(&arg.as_ref().to_string_lossy());
    }

    command
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use structopt::StructOpt;

    use super::*;

    fn opt(command: &str) -> Opt {
        Opt::from_iter(&["test", "--p4", command, "--timeout", "5s"])
    }

    #[test]
    fn test_run_arguments() {
        let output = tokio_test::block_on(async {
            run(
                &opt("echo"),
                &["-p".to_string(), "perforce:1666".to_string()],
                &["changes", "-m1"],
            )
            .await
        })
        .unwrap()
        .success()
        .unwrap();

        assert_eq!(output.command, "echo changes -m1");
        assert_eq!(
            String::from_utf8(output.stdout).unwrap(),
            "-ztag -p perforce:1666 changes -m1\n"
        );
    }

    #[test]
    fn test_run_failure() {
        let output = tokio_test::block_on(async { run(&opt("false"), &[], &["info"]).await })
            .unwrap();

        match output.success() {
            Err(Error::Command { command, status, .. }) => {
                assert_eq!(command, "false info");
                assert_eq!(status, "exit code 1");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_run_missing_binary() {
        let result = tokio_test::block_on(async {
            run(&opt("/nonexistent/p4"), &[], &["info"]).await
        });
        assert!(matches!(result, Err(Error::Spawn(_))));
    }

    #[test]
    fn test_run_timeout() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("p4.sh");
        std::fs::write(&script, "exec sleep 30\n").unwrap();

        let opt = Opt::from_iter(&[
            "test",
            "--p4",
            "sh",
            "--p4-global-option",
            script.to_str().unwrap(),
            "--timeout",
            "200ms",
        ]);

        let start = std::time::Instant::now();
        let result = tokio_test::block_on(async { run(&opt, &[], &["sync", "//ws/..."]).await });

        match result {
            Err(Error::Timeout { command, timeout }) => {
                assert_eq!(command, "sh sync //ws/...");
                assert_eq!(timeout, Duration::from_millis(200));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
