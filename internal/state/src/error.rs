use thiserror::Error;

use crate::BuildId;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),

    #[error("build {0} already has a revision record")]
    RecordExists(BuildId),

    #[error("serialisation error: {0:?}")]
    Serialisation(#[from] bincode::Error),

    #[error("unknown serialised data version: {0}")]
    UnknownSerialisationVersion(u8),
}
