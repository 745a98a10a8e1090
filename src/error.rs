use std::fmt;
use std::io;

/// Crate-level error type.
#[derive(Debug)]
pub enum Error {
    /// Dataset directory failed validation: empty, contains a plain file
    /// where a class folder was expected, or an image could not be decoded.
    Dataset(String),
    /// Underlying filesystem failure (unreadable load path, unwritable
    /// save path, inaccessible dataset root).
    Io(io::Error),
    /// Checkpoint parsed but is not usable: unknown version, missing
    /// fields, or weight shapes that disagree with the declared output width.
    CorruptCheckpoint(String),
    /// A training run was requested while another is still active.
    ConcurrentTraining,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Dataset(msg) => write!(f, "dataset error: {}", msg),
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::CorruptCheckpoint(msg) => write!(f, "corrupt checkpoint: {}", msg),
            Error::ConcurrentTraining => {
                write!(f, "a training run is already active; only one may run at a time")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
