use super::{element_count, seek_from_parts, Datastream, Rounding, Whence};
use crate::io::ReadRange;
use libc::c_int;
use std::borrow::Cow;
use std::io::{self, Error, ErrorKind, Read, Seek, SeekFrom};

/// Stream over bytes already in memory.
///
/// Seeks clamp into `[0, len]` and never fail. Element reads round a trailing
/// partial element up.
#[derive(Clone, Debug)]
pub struct BufferDatastream<'a> {
    data: Cow<'a, [u8]>,
    position: usize,
}

impl<'a> BufferDatastream<'a> {
    pub fn new<D: Into<Cow<'a, [u8]>>>(data: D) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn remaining(&self) -> &[u8] {
        self.data.get(self.position..).unwrap_or_default()
    }

    pub fn into_inner(self) -> Cow<'a, [u8]> {
        self.data
    }

    fn clamp(&self, target: i64) -> usize {
        target.clamp(0, self.data.len() as i64) as usize
    }
}

impl BufferDatastream<'static> {
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl Datastream for BufferDatastream<'_> {
    fn valid(&self) -> bool {
        true
    }

    fn read_elements(&mut self, buf: &mut [u8], size: usize) -> c_int {
        if size == 0 {
            return 0;
        }
        match self.data.read_range(self.position as u64, buf) {
            Ok(n) => {
                self.position += n;
                element_count(n, size, Rounding::Up)
            }
            Err(_) => -1,
        }
    }

    fn seek_whence(&mut self, offset: i64, whence: Whence) -> c_int {
        let len = self.data.len() as i64;
        self.position = match whence {
            Whence::Set => self.clamp(offset),
            Whence::Current => self.clamp((self.position as i64).saturating_add(offset)),
            Whence::End => self.clamp(len.saturating_add(offset)),
        };
        0
    }

    fn tell(&mut self) -> i64 {
        self.position as i64
    }

    fn size(&mut self) -> i64 {
        self.data.len() as i64
    }

    fn get_char(&mut self) -> c_int {
        match self.data.get(self.position) {
            Some(&byte) => {
                self.position += 1;
                c_int::from(byte)
            }
            None => -1,
        }
    }

    fn eof(&mut self) -> bool {
        self.position >= self.data.len()
    }
}

impl Read for BufferDatastream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read_range(self.position as u64, buf)?;
        self.position += n;
        Ok(n)
    }
}

impl Seek for BufferDatastream<'_> {
    /// Unlike `seek_whence`, a seek before the start is an error here.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = seek_from_parts(pos);
        let origin = match whence {
            Whence::Set => 0,
            Whence::Current => self.position as i64,
            Whence::End => self.data.len() as i64,
        };
        match origin.checked_add(offset) {
            Some(target) if target >= 0 => {
                self.position = self.clamp(target);
                Ok(self.position as u64)
            }
            _ => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid seek to {pos:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_elements_round_up() {
        let mut stream = BufferDatastream::new(&b"0123456789"[..]);
        let mut buf = [0u8; 8];
        assert_eq!(stream.read_elements(&mut buf, 4), 2);
        assert_eq!(stream.read_elements(&mut buf, 4), 1);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(stream.read_elements(&mut buf, 4), 0);
        assert!(stream.eof());
    }

    #[test]
    fn seeks_clamp() {
        let mut stream = BufferDatastream::from_vec(b"abcdef".to_vec());
        assert_eq!(stream.seek_whence(-4, Whence::Set), 0);
        assert_eq!(stream.tell(), 0);
        assert_eq!(stream.seek_whence(100, Whence::Set), 0);
        assert_eq!(stream.tell(), 6);
        assert_eq!(stream.seek_whence(3, Whence::End), 0);
        assert_eq!(stream.tell(), 6);
        assert_eq!(stream.seek_whence(-10, Whence::End), 0);
        assert_eq!(stream.tell(), 0);
        assert_eq!(stream.seek_whence(2, Whence::Current), 0);
        assert_eq!(stream.get_char(), c_int::from(b'c'));
        assert_eq!(stream.seek_whence(-9, Whence::Current), 0);
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn gets_splits_lines() {
        let mut stream = BufferDatastream::new(&b"one\ntwo"[..]);
        let mut line = [0xFFu8; 8];
        assert_eq!(stream.gets(&mut line), Some(4));
        assert_eq!(&line[..5], b"one\n\0");
        assert_eq!(stream.gets(&mut line), Some(3));
        assert_eq!(&line[..4], b"two\0");
        assert_eq!(stream.gets(&mut line), None);
    }

    #[test]
    fn gets_truncates_to_buffer() {
        let mut stream = BufferDatastream::new(&b"abcdefgh\n"[..]);
        let mut line = [0u8; 4];
        assert_eq!(stream.gets(&mut line), Some(3));
        assert_eq!(&line, b"abc\0");
        assert_eq!(stream.tell(), 3);
    }

    #[test]
    fn scanf_floats() {
        let mut stream = BufferDatastream::new(&b"\t1.5 -2e1\n"[..]);
        assert_eq!(
            stream.scanf_one(crate::stream::ScanFormat::Float),
            Some(crate::stream::ScanValue::Float(1.5))
        );
        assert_eq!(
            stream.scanf_one(crate::stream::ScanFormat::Float),
            Some(crate::stream::ScanValue::Float(-20.0))
        );
        assert_eq!(stream.scanf_one(crate::stream::ScanFormat::Float), None);
    }

    #[test]
    fn io_seek_rejects_negative() {
        let mut stream = BufferDatastream::new(&b"abc"[..]);
        assert!(stream.seek(SeekFrom::Current(-1)).is_err());
        assert_eq!(stream.seek(SeekFrom::End(-1)).unwrap(), 2);
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"c");
    }
}
