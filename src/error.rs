use crate::plan::ConfigError;
use crate::source::SourceError;
use crate::write::WriteError;
use std::fmt;
use std::io;

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Whole-file failures. Per-tile and per-auxiliary-image problems are
/// recovered locally and never reach this type.
#[derive(Debug)]
pub enum ConvertError {
    Configuration(ConfigError),
    Source(SourceError),
    Write(WriteError),
    IoError(io::Error),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Configuration(e) => write!(f, "configuration error: {e}"),
            ConvertError::Source(e) => write!(f, "source error: {e}"),
            ConvertError::Write(e) => write!(f, "write error: {e:?}"),
            ConvertError::IoError(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for ConvertError {}

impl From<ConfigError> for ConvertError {
    fn from(e: ConfigError) -> Self {
        ConvertError::Configuration(e)
    }
}

impl From<SourceError> for ConvertError {
    fn from(e: SourceError) -> Self {
        ConvertError::Source(e)
    }
}

impl From<WriteError> for ConvertError {
    fn from(e: WriteError) -> Self {
        ConvertError::Write(e)
    }
}

impl From<io::Error> for ConvertError {
    fn from(e: io::Error) -> Self {
        ConvertError::IoError(e)
    }
}
