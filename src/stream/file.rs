use super::{
    element_count, read_full, resolve_seek, seek_from_parts, Datastream, OpenOptions, Rounding,
    Whence,
};
use crate::error::DatastreamResult;
use libc::c_int;
use std::fs::File;
use std::io::{self, BufReader, Error, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::*;

/// Buffered stream over a regular file.
#[derive(Debug)]
pub struct FileDatastream {
    reader: BufReader<File>,
    path: PathBuf,
}

impl FileDatastream {
    pub fn open<P: AsRef<Path>>(path: P) -> DatastreamResult<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: &OpenOptions) -> DatastreamResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        debug!(
            "Opened file datastream {path:?} with {} byte buffer",
            options.buffer_capacity
        );
        Ok(Self {
            reader: BufReader::with_capacity(options.buffer_capacity, file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_buffered(&self) -> bool {
        self.reader.capacity() > 0
    }

    fn len(&self) -> io::Result<u64> {
        self.reader.get_ref().metadata().map(|m| m.len())
    }
}

impl Datastream for FileDatastream {
    fn valid(&self) -> bool {
        self.reader.get_ref().metadata().is_ok()
    }

    fn read_elements(&mut self, buf: &mut [u8], size: usize) -> c_int {
        if size == 0 || buf.is_empty() {
            return 0;
        }
        match read_full(&mut self.reader, buf) {
            Ok(n) => {
                if n < buf.len() {
                    trace!("Short read from {:?}: {n} < {}", self.path, buf.len());
                }
                element_count(n, size, Rounding::Down)
            }
            Err(e) => {
                warn!("Failed to read from {:?}: {e:?}", self.path);
                -1
            }
        }
    }

    fn seek_whence(&mut self, offset: i64, whence: Whence) -> c_int {
        let target = match whence {
            Whence::Set => u64::try_from(offset).ok(),
            Whence::Current => self
                .reader
                .stream_position()
                .ok()
                .and_then(|position| resolve_seek(position, 0, offset, whence)),
            Whence::End => self
                .len()
                .ok()
                .and_then(|len| resolve_seek(0, len, offset, whence)),
        };
        let Some(target) = target else {
            return -1;
        };
        match self.reader.seek(SeekFrom::Start(target)) {
            Ok(_) => 0,
            Err(e) => {
                warn!("Failed to seek {:?} to {target}: {e:?}", self.path);
                -1
            }
        }
    }

    fn tell(&mut self) -> i64 {
        self.reader
            .stream_position()
            .map(|position| position as i64)
            .unwrap_or(-1)
    }

    fn size(&mut self) -> i64 {
        self.len().map(|len| len as i64).unwrap_or(-1)
    }

    fn get_char(&mut self) -> c_int {
        let mut byte = [0u8];
        match read_full(&mut self.reader, &mut byte) {
            Ok(1) => c_int::from(byte[0]),
            _ => -1,
        }
    }

    fn fname(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn buffering_off(&mut self) -> DatastreamResult<()> {
        if !self.is_buffered() {
            return Ok(());
        }
        // Seeking drops the read-ahead and leaves the shared cursor at the
        // logical position, so the clone picks up exactly where we are.
        let position = self.reader.stream_position()?;
        self.reader.seek(SeekFrom::Start(position))?;
        let file = self.reader.get_ref().try_clone()?;
        self.reader = BufReader::with_capacity(0, file);
        debug!("Buffering off for {:?} at {position}", self.path);
        Ok(())
    }
}

impl Read for FileDatastream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileDatastream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = seek_from_parts(pos);
        if self.seek_whence(offset, whence) == 0 {
            self.reader.stream_position()
        } else {
            Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid seek to {pos:?}"),
            ))
        }
    }
}
