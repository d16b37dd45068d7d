use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("changelog parse error of kind {kind:?} at byte {offset}")]
    Parse {
        offset: usize,
        kind: nom::error::ErrorKind,
    },
}
