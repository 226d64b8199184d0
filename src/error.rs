use std::fmt;
use std::io;

pub type DatastreamResult<T> = Result<T, DatastreamError>;

#[derive(Debug)]
pub enum DatastreamError {
    ReadError(io::Error),
    BadMagicBytes,
    BadTiffVersion(u16),
    TooManyEntries(u16),
    ValueOutOfRange(u64),
    BadValue(u16),
    SizeOverflow,
    HandlerError(String),
}

impl fmt::Display for DatastreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for DatastreamError {}

impl From<io::Error> for DatastreamError {
    fn from(e: io::Error) -> Self {
        DatastreamError::ReadError(e)
    }
}
