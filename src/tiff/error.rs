use super::TagId;
use std::io;

#[derive(Debug)]
pub enum TiffError {
    BadMagicBytes,
    MissingTag(TagId),
    BadTag(TagId),
    NoIfds,
    ReadError(io::Error),
}

impl From<io::Error> for TiffError {
    fn from(e: io::Error) -> Self {
        TiffError::ReadError(e)
    }
}
