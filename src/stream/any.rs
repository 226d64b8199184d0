use super::{
    BigfileDatastream, BufferDatastream, Datastream, FileDatastream, OpenOptions, ScanFormat,
    ScanValue, Whence,
};
use crate::error::DatastreamResult;
use libc::{c_int, c_void};
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::*;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum DatastreamKind {
    File,
    BigFile,
    Buffer,
}

impl fmt::Display for DatastreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatastreamKind::File => "file",
            DatastreamKind::BigFile => "bigfile",
            DatastreamKind::Buffer => "buffer",
        };
        write!(f, "{name}")
    }
}

/// One of the concrete datastreams, tagged with its kind.
#[derive(Debug)]
pub enum AnyDatastream<'a> {
    File(FileDatastream),
    BigFile(BigfileDatastream),
    Buffer(BufferDatastream<'a>),
}

macro_rules! dispatch {
    ($self:expr, $stream:ident => $body:expr) => {
        match $self {
            AnyDatastream::File($stream) => $body,
            AnyDatastream::BigFile($stream) => $body,
            AnyDatastream::Buffer($stream) => $body,
        }
    };
}

impl AnyDatastream<'static> {
    pub fn open<P: AsRef<Path>>(path: P) -> DatastreamResult<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Pick a file or bigfile stream based on the size of the file.
    pub fn open_with<P: AsRef<Path>>(path: P, options: &OpenOptions) -> DatastreamResult<Self> {
        let path = path.as_ref();
        let len = fs::metadata(path)?.len();
        if len > options.bigfile_threshold {
            debug!(
                "{path:?} is {len} bytes (> {}), using bigfile datastream",
                options.bigfile_threshold
            );
            Ok(Self::BigFile(BigfileDatastream::open(path)?))
        } else {
            Ok(Self::File(FileDatastream::open_with(path, options)?))
        }
    }
}

impl<'a> AnyDatastream<'a> {
    pub fn from_buffer<D: Into<Cow<'a, [u8]>>>(data: D) -> Self {
        Self::Buffer(BufferDatastream::new(data))
    }

    pub fn kind(&self) -> DatastreamKind {
        match self {
            AnyDatastream::File(_) => DatastreamKind::File,
            AnyDatastream::BigFile(_) => DatastreamKind::BigFile,
            AnyDatastream::Buffer(_) => DatastreamKind::Buffer,
        }
    }

    /// Opaque pointer to the concrete stream, paired with its kind.
    ///
    /// The pointer matches the adapter returned by
    /// `DatastreamKind::read_callback` and stays valid while `self` is
    /// mutably borrowed.
    pub fn as_raw_parts(&mut self) -> (DatastreamKind, *mut c_void) {
        let kind = self.kind();
        let ptr = match self {
            AnyDatastream::File(stream) => stream as *mut FileDatastream as *mut c_void,
            AnyDatastream::BigFile(stream) => stream as *mut BigfileDatastream as *mut c_void,
            AnyDatastream::Buffer(stream) => stream as *mut BufferDatastream<'a> as *mut c_void,
        };
        (kind, ptr)
    }
}

impl From<FileDatastream> for AnyDatastream<'_> {
    fn from(stream: FileDatastream) -> Self {
        AnyDatastream::File(stream)
    }
}

impl From<BigfileDatastream> for AnyDatastream<'_> {
    fn from(stream: BigfileDatastream) -> Self {
        AnyDatastream::BigFile(stream)
    }
}

impl<'a> From<BufferDatastream<'a>> for AnyDatastream<'a> {
    fn from(stream: BufferDatastream<'a>) -> Self {
        AnyDatastream::Buffer(stream)
    }
}

impl Datastream for AnyDatastream<'_> {
    fn valid(&self) -> bool {
        dispatch!(self, stream => stream.valid())
    }

    fn read_elements(&mut self, buf: &mut [u8], size: usize) -> c_int {
        dispatch!(self, stream => stream.read_elements(buf, size))
    }

    fn seek_whence(&mut self, offset: i64, whence: Whence) -> c_int {
        dispatch!(self, stream => stream.seek_whence(offset, whence))
    }

    fn tell(&mut self) -> i64 {
        dispatch!(self, stream => stream.tell())
    }

    fn size(&mut self) -> i64 {
        dispatch!(self, stream => stream.size())
    }

    fn get_char(&mut self) -> c_int {
        dispatch!(self, stream => stream.get_char())
    }

    fn gets(&mut self, buf: &mut [u8]) -> Option<usize> {
        dispatch!(self, stream => stream.gets(buf))
    }

    fn scanf_one(&mut self, format: ScanFormat) -> Option<ScanValue> {
        dispatch!(self, stream => stream.scanf_one(format))
    }

    fn eof(&mut self) -> bool {
        dispatch!(self, stream => stream.eof())
    }

    fn fname(&self) -> Option<&Path> {
        dispatch!(self, stream => stream.fname())
    }

    fn buffering_off(&mut self) -> DatastreamResult<()> {
        dispatch!(self, stream => stream.buffering_off())
    }
}

impl Read for AnyDatastream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        dispatch!(self, stream => stream.read(buf))
    }
}

impl Seek for AnyDatastream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        dispatch!(self, stream => stream.seek(pos))
    }
}
