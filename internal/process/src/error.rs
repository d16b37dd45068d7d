use thiserror::Error;

/// Possible errors from the `process` module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{command} failed with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("field {field} has an invalid value: {value:?}")]
    InvalidField { field: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("p4 output is missing the {0} field")]
    MissingField(String),

    #[error(transparent)]
    Preflight(crate::preflight::Error),

    #[error("error spawning p4: {0:?}")]
    Spawn(std::io::Error),

    #[error("{command} did not complete within {timeout:?}")]
    Timeout {
        command: String,
        timeout: std::time::Duration,
    },

    #[error("label {0} does not exist")]
    UnknownLabel(String),
}
