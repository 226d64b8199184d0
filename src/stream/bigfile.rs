use super::{element_count, resolve_seek, seek_from_parts, Datastream, Rounding, Whence};
use crate::error::DatastreamResult;
use crate::io::ReadRange;
use libc::c_int;
use std::fs::File;
use std::io::{self, Error, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::*;

#[cfg(unix)]
type RangeFile = File;
#[cfg(not(unix))]
type RangeFile = std::sync::Mutex<File>;

/// Unbuffered stream for very large files.
///
/// Reads go straight to the file at an absolute 64-bit offset and the cursor
/// lives here rather than in the OS file description.
#[derive(Debug)]
pub struct BigfileDatastream {
    file: RangeFile,
    path: PathBuf,
    position: u64,
    len: u64,
}

impl BigfileDatastream {
    pub fn open<P: AsRef<Path>>(path: P) -> DatastreamResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        debug!("Opened bigfile datastream {path:?} ({len} bytes)");
        Ok(Self {
            #[cfg(unix)]
            file,
            #[cfg(not(unix))]
            file: std::sync::Mutex::new(file),
            path,
            position: 0,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Datastream for BigfileDatastream {
    fn valid(&self) -> bool {
        true
    }

    fn read_elements(&mut self, buf: &mut [u8], size: usize) -> c_int {
        if size == 0 || buf.is_empty() {
            return 0;
        }
        match self.file.read_range_full(self.position, buf) {
            Ok(n) => {
                self.position += n as u64;
                if n < buf.len() {
                    trace!("Short read from {:?}: {n} < {}", self.path, buf.len());
                }
                element_count(n, size, Rounding::Down)
            }
            Err(e) => {
                warn!(
                    "Failed to read {:?} at {}: {e:?}",
                    self.path, self.position
                );
                -1
            }
        }
    }

    fn seek_whence(&mut self, offset: i64, whence: Whence) -> c_int {
        match resolve_seek(self.position, self.len, offset, whence) {
            Some(target) => {
                self.position = target;
                0
            }
            None => -1,
        }
    }

    fn tell(&mut self) -> i64 {
        self.position as i64
    }

    fn size(&mut self) -> i64 {
        self.len as i64
    }

    fn get_char(&mut self) -> c_int {
        let mut byte = [0u8];
        match self.file.read_range_exact(self.position, &mut byte) {
            Ok(()) => {
                self.position += 1;
                c_int::from(byte[0])
            }
            Err(_) => -1,
        }
    }

    fn eof(&mut self) -> bool {
        self.position >= self.len
    }

    fn fname(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

impl Read for BigfileDatastream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read_range(self.position, buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for BigfileDatastream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = seek_from_parts(pos);
        if self.seek_whence(offset, whence) == 0 {
            Ok(self.position)
        } else {
            Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid seek to {pos:?}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn counts_complete_elements() {
        let fixture = fixture(&[7u8; 10]);
        let mut stream = BigfileDatastream::open(fixture.path()).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(stream.read_elements(&mut buf, 8), 1);
        assert_eq!(stream.read_elements(&mut buf, 4), 0);
        assert_eq!(stream.tell(), 10);
        assert!(stream.eof());
    }

    #[test]
    fn seek_past_end_then_back() {
        let fixture = fixture(b"0123456789");
        let mut stream = BigfileDatastream::open(fixture.path()).unwrap();
        assert_eq!(stream.seek_whence(20, Whence::Set), 0);
        assert_eq!(stream.get_char(), -1);
        assert_eq!(stream.seek_whence(-3, Whence::End), 0);
        assert_eq!(stream.get_char(), c_int::from(b'7'));
        assert_eq!(stream.seek_whence(-100, Whence::Current), -1);
        assert_eq!(stream.tell(), 8);
    }

    #[test]
    fn seeks_stay_within_tell_range() {
        let fixture = fixture(b"abc");
        let mut stream = BigfileDatastream::open(fixture.path()).unwrap();
        assert_eq!(stream.seek_whence(i64::MAX, Whence::Set), 0);
        assert_eq!(stream.tell(), i64::MAX);
        assert_eq!(stream.seek_whence(i64::MAX, Whence::Current), -1);
        assert_eq!(stream.seek_whence(1, Whence::Current), -1);
        assert_eq!(stream.tell(), i64::MAX);
        assert!(stream.seek(SeekFrom::Current(1)).is_err());
        assert_eq!(stream.seek_whence(0, Whence::Set), 0);
        assert_eq!(stream.get_char(), c_int::from(b'a'));
    }

    #[test]
    fn io_traits_share_the_cursor() {
        let fixture = fixture(b"abcdef");
        let mut stream = BigfileDatastream::open(fixture.path()).unwrap();
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ab");
        assert_eq!(stream.tell(), 2);
        assert_eq!(stream.seek(SeekFrom::Current(2)).unwrap(), 4);
        assert_eq!(stream.get_char(), c_int::from(b'e'));
        assert!(stream.seek(SeekFrom::Current(-10)).is_err());
    }
}
