use std::path::PathBuf;

use thiserror::Error;

use crate::serializer::DecodeError;

/// Coarse classification of a [`SortError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Decode,
    Io,
    Release,
}

#[derive(Error, Debug)]
pub enum SortError {
    /// A tuning parameter was rejected by `ConfigurationBuilder::build`.
    #[error("Invalid configuration '{parameter}': {reason}")]
    Config {
        parameter: &'static str,
        reason: String,
    },

    /// The serializer wrote a record outside `1..=max_record_size` bytes.
    #[error("Serialized record is {size} bytes, allowed range is 1..={max}")]
    RecordSize { size: usize, max: usize },

    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// An earlier spill failed part way, so the accumulator no longer holds
    /// every record it counted.
    #[error("Accumulator is unusable after an earlier {kind:?} failure")]
    Aborted { kind: ErrorKind },

    /// Removing a spill file failed after the sort itself completed.
    #[error("Failed to release spill file {path:?}: {source}")]
    Release {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SortError {
    pub(crate) fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> SortError {
        move |source| SortError::Io { context, source }
    }

    pub(crate) fn config(parameter: &'static str, reason: impl Into<String>) -> SortError {
        SortError::Config {
            parameter,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SortError::Config { .. } | SortError::RecordSize { .. } => ErrorKind::Config,
            SortError::Decode(_) => ErrorKind::Decode,
            SortError::Io { .. } => ErrorKind::Io,
            SortError::Release { .. } => ErrorKind::Release,
            SortError::Aborted { kind } => *kind,
        }
    }
}

pub type Result<T> = std::result::Result<T, SortError>;
