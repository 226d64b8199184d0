//! Sequential byte sources for raw decoding.
//!
//! Every stream kind implements [`Datastream`], which mirrors the cursor
//! contract raw decoders are written against: counted element reads,
//! `SEEK_*` style seeks, single character reads and a couple of text helpers
//! for the formats that embed ASCII headers. The integer sentinels (`-1`,
//! element counts) are kept so the same values can cross the C boundary in
//! [`crate::ffi`] untouched.

use crate::error::DatastreamResult;
use libc::c_int;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::io::{self, ErrorKind, Read, SeekFrom};
use std::path::Path;

mod any;
mod bigfile;
mod buffer;
mod file;

pub use any::{AnyDatastream, DatastreamKind};
pub use bigfile::BigfileDatastream;
pub use buffer::BufferDatastream;
pub use file::FileDatastream;

/// Longest token `scanf_one` will consider.
pub const SCAN_TOKEN_LIMIT: usize = 24;

/// Files above this size open as [`BigfileDatastream`].
pub const DEFAULT_BIGFILE_THRESHOLD: u64 = 250 * 1024 * 1024;

pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Whence {
    Set = libc::SEEK_SET,
    Current = libc::SEEK_CUR,
    End = libc::SEEK_END,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ScanFormat {
    Int,
    Float,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ScanValue {
    Int(i32),
    Float(f32),
}

impl ScanFormat {
    /// Parse the longest numeric prefix of `token`, like `sscanf` would.
    pub fn parse(&self, token: &[u8]) -> Option<ScanValue> {
        let len = numeric_prefix_len(token, *self == ScanFormat::Float);
        let text = std::str::from_utf8(&token[..len]).ok()?;
        match self {
            ScanFormat::Int => text.parse().ok().map(ScanValue::Int),
            ScanFormat::Float => text.parse().ok().map(ScanValue::Float),
        }
    }
}

fn numeric_prefix_len(token: &[u8], float: bool) -> usize {
    let digits_from = |mut i: usize| {
        while i < token.len() && token[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut i = 0;
    if matches!(token.first(), Some(b'+' | b'-')) {
        i = 1;
    }
    let int_end = digits_from(i);
    if !float {
        return if int_end > i { int_end } else { 0 };
    }

    let mut end = int_end;
    let mut mantissa_digits = int_end - i;
    if token.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0;
    }
    if matches!(token.get(end), Some(b'e' | b'E')) {
        let mut j = end + 1;
        if matches!(token.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            end = exp_end;
        }
    }
    end
}

#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub buffer_capacity: usize,
    pub bigfile_threshold: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            bigfile_threshold: DEFAULT_BIGFILE_THRESHOLD,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_bigfile_threshold(mut self, threshold: u64) -> Self {
        self.bigfile_threshold = threshold;
        self
    }
}

/// The abstract datastream contract.
///
/// Methods that cross the C boundary return C-style integers: element counts
/// or `-1` for failure. Rust callers that want `io::Result` can use the
/// [`Read`] and [`std::io::Seek`] impls every stream also provides.
pub trait Datastream {
    fn valid(&self) -> bool;

    /// Fill `buf` with elements of `size` bytes and return how many were read.
    ///
    /// `size == 0` or an empty `buf` reads nothing and returns 0. On an I/O
    /// error before any byte arrived the result is -1.
    fn read_elements(&mut self, buf: &mut [u8], size: usize) -> c_int;

    /// Returns 0 on success, -1 on failure.
    fn seek_whence(&mut self, offset: i64, whence: Whence) -> c_int;

    fn tell(&mut self) -> i64;

    fn size(&mut self) -> i64;

    /// Next byte, or -1 at end of input.
    fn get_char(&mut self) -> c_int;

    /// Read one line with `fgets` semantics.
    ///
    /// At most `buf.len() - 1` bytes are stored, a trailing `\n` is kept and
    /// the line is NUL terminated. Returns the number of bytes stored before
    /// the NUL, or `None` when nothing could be read.
    fn gets(&mut self, buf: &mut [u8]) -> Option<usize> {
        let limit = buf.len().checked_sub(1)?;
        let mut n = 0;
        while n < limit {
            let c = self.get_char();
            if c < 0 {
                break;
            }
            buf[n] = c as u8;
            n += 1;
            if c == c_int::from(b'\n') {
                break;
            }
        }
        buf[n] = 0;
        if n == 0 && limit > 0 {
            None
        } else {
            Some(n)
        }
    }

    /// Read a single whitespace delimited number.
    fn scanf_one(&mut self, format: ScanFormat) -> Option<ScanValue> {
        let mut token = Vec::with_capacity(SCAN_TOKEN_LIMIT);
        loop {
            let c = self.get_char();
            if c < 0 {
                break;
            }
            let byte = c as u8;
            if byte.is_ascii_whitespace() || byte == 0 {
                if token.is_empty() {
                    continue;
                }
                break;
            }
            token.push(byte);
            if token.len() == SCAN_TOKEN_LIMIT {
                break;
            }
        }
        format.parse(&token)
    }

    fn eof(&mut self) -> bool {
        let size = self.size();
        size >= 0 && self.tell() >= size
    }

    fn fname(&self) -> Option<&Path> {
        None
    }

    fn buffering_off(&mut self) -> DatastreamResult<()> {
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum Rounding {
    Down,
    Up,
}

/// Convert a byte count into an element count for `read_elements`.
pub(crate) fn element_count(bytes: usize, size: usize, rounding: Rounding) -> c_int {
    if size == 0 {
        return 0;
    }
    let count = match rounding {
        Rounding::Down => bytes / size,
        Rounding::Up => bytes.div_ceil(size),
    };
    c_int::try_from(count).unwrap_or(c_int::MAX)
}

/// Read until `buf` is full or the reader is exhausted.
///
/// Errors after a partial read are swallowed and the partial count returned,
/// matching how short `fread` calls behave.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if filled == 0 => return Err(e),
            Err(_) => break,
        }
    }
    Ok(filled)
}

/// Absolute target of a `SEEK_*` style seek, or `None` if it would be negative.
pub(crate) fn resolve_seek(position: u64, len: u64, offset: i64, whence: Whence) -> Option<u64> {
    let origin = match whence {
        Whence::Set => 0,
        Whence::Current => position,
        Whence::End => len,
    };
    // positions must stay representable by `tell`
    origin
        .checked_add_signed(offset)
        .filter(|&target| target <= i64::MAX as u64)
}

pub(crate) fn seek_from_parts(pos: SeekFrom) -> (i64, Whence) {
    match pos {
        SeekFrom::Start(offset) => (offset.min(i64::MAX as u64) as i64, Whence::Set),
        SeekFrom::Current(offset) => (offset, Whence::Current),
        SeekFrom::End(offset) => (offset, Whence::End),
    }
}
