//! Raw image datastreams.
//!
//! A datastream is a sequential byte source a raw decoder pulls from: a
//! buffered file, an unbuffered large file, or bytes already in memory.
//! [`AnyDatastream`] tags which one is in use, and [`ffi`] exposes C read
//! adapters so callback driven decoders can read through an opaque handle.

pub mod error;
pub mod exif;
pub mod ffi;
pub mod io;
pub mod stream;

pub use error::{DatastreamError, DatastreamResult};
pub use exif::{ExifEntry, ExifParser, ExifParserCallback};
pub use ffi::ReadCallback;
pub use stream::{
    AnyDatastream, BigfileDatastream, BufferDatastream, Datastream, DatastreamKind,
    FileDatastream, OpenOptions, ScanFormat, ScanValue, Whence,
};
