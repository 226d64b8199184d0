// Positioned I/O
//   ReadRange reads at an absolute offset through an immutable reference.
//   The big-file and buffer datastreams keep their own cursor and read
//   through this, so no shared file cursor or userspace buffer is involved.
//   Required methods
//     fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> { ... }
//   Provided methods
//     fn read_range_full(&self, start: u64, buf: &mut [u8]) -> Result<usize> { ... }
//     fn read_range_exact(&self, start: u64, buf: &mut [u8]) -> Result<()> { ... }

use std::io::{Error, ErrorKind, Result};
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

pub trait ReadRange {
    /// Read bytes from a specific offset
    ///
    /// Like `Read::read`, a single call may return fewer bytes than requested.
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize>;

    /// Keep reading until `buf` is full or the source is exhausted.
    ///
    /// Returns the number of bytes placed in `buf`. An error is only returned
    /// if it happened before any byte was read.
    fn read_range_full(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read_range(start + filled as u64, &mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if filled == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(filled)
    }

    fn read_range_exact(&self, start: u64, buf: &mut [u8]) -> Result<()> {
        let n = buf.len();
        let bytes_read = self.read_range_full(start, buf)?;
        if bytes_read == n {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("Failed to completely fill buffer: {bytes_read} < {n}"),
            ))
        }
    }
}

impl<R: Read + Seek> ReadRange for Mutex<R> {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        let mut locked_self = self
            .lock()
            .map_err(|e| Error::other(format!("{e:?}")))?;
        locked_self.seek(SeekFrom::Start(start))?;
        locked_self.read(buf)
    }
}

#[cfg(unix)]
impl ReadRange for std::fs::File {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        use std::os::unix::fs::FileExt;
        self.read_at(buf, start)
    }
}

impl ReadRange for [u8] {
    fn read_range(&self, start: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.len() as u64;
        if start >= len {
            return Ok(0);
        }
        let available = &self[start as usize..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn slice_reads_stop_at_end() {
        let data: &[u8] = b"0123456789";
        let mut buf = [0u8; 4];
        assert_eq!(data.read_range(8, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(data.read_range(10, &mut buf).unwrap(), 0);
        assert_eq!(data.read_range(42, &mut buf).unwrap(), 0);
    }

    #[test]
    fn exact_reports_short_source() {
        let data: &[u8] = b"abc";
        let mut buf = [0u8; 4];
        let err = data.read_range_exact(0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn mutex_reader_seeks_before_reading() {
        let reader = Mutex::new(Cursor::new(b"hello world".to_vec()));
        let mut buf = [0u8; 5];
        reader.read_range_exact(6, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
        reader.read_range_exact(0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
