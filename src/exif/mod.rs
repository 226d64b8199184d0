//! TIFF/EXIF directory walker.
//!
//! [`ExifParser`] reads a TIFF header at the current stream position and
//! visits every IFD entry, stopping with the stream positioned at the entry's
//! value so a handler can pull the bytes itself. The C flavour hands the
//! handler the opaque [`AnyDatastream`] pointer, to be read back through
//! [`crate::ffi::rawstream_read_datastream`].

use crate::error::{DatastreamError, DatastreamResult};
use crate::stream::{AnyDatastream, Datastream};
use libc::{c_int, c_uint, c_void};
use std::collections::{HashSet, VecDeque};
use std::io::{Read, Seek, SeekFrom};
use tracing::*;

mod endian;
mod entry;
mod tag;

pub use endian::Endian;
pub use entry::{ExifEntry, MAX_VALUE_BYTES};
pub use tag::{
    is_sub_ifd_pointer, TagType, EXIF_IFD_POINTER, GPS_IFD_POINTER, INTEROP_IFD_POINTER,
};

pub const TIFF_VERSION: u16 = 42;
pub const DEFAULT_MAX_ENTRIES: u16 = 512;

const ENTRY_SIZE: u64 = 12;

pub type ExifParserCallback = unsafe extern "C" fn(
    context: *mut c_void,
    tag: c_int,
    type_: c_int,
    len: c_int,
    ord: c_uint,
    ifp: *mut c_void,
    base: i64,
);

#[derive(Clone, Debug)]
pub struct ExifParser {
    max_entries: u16,
    follow_sub_ifds: bool,
}

impl Default for ExifParser {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            follow_sub_ifds: true,
        }
    }
}

impl ExifParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(mut self, max_entries: u16) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_sub_ifds(mut self, follow: bool) -> Self {
        self.follow_sub_ifds = follow;
        self
    }

    /// Walk every IFD and call `handler` once per entry.
    ///
    /// The stream is positioned at the entry's value when `handler` runs.
    /// Returns the number of entries visited; a handler error stops the walk.
    pub fn parse<'a, F>(
        &self,
        stream: &mut AnyDatastream<'a>,
        mut handler: F,
    ) -> DatastreamResult<usize>
    where
        F: FnMut(&ExifEntry, &mut AnyDatastream<'a>) -> DatastreamResult<()>,
    {
        let base = stream.stream_position()?;
        let mut header = [0u8; 4];
        stream.read_exact(&mut header)?;
        let order = Endian::from_marker(&header[..2]).ok_or(DatastreamError::BadMagicBytes)?;
        let version: u16 = order.decode([header[2], header[3]])?;
        if version != TIFF_VERSION {
            return Err(DatastreamError::BadTiffVersion(version));
        }
        let first: u32 = order.read(stream)?;

        let stream_len = u64::try_from(stream.size()).unwrap_or(u64::MAX);
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([(u64::from(first), true)]);
        let mut ifd = 0;
        let mut visited_entries = 0;

        while let Some((offset, follow_chain)) = queue.pop_front() {
            if offset == 0 {
                continue;
            }
            let start = base + offset;
            if start >= stream_len {
                warn!("IFD offset {start} is beyond the end of the stream ({stream_len})");
                continue;
            }
            if !visited.insert(start) {
                warn!("IFD at {start} was already visited, stopping chain");
                continue;
            }

            if start + 2 > stream_len {
                warn!("IFD at {start} has no room for an entry count");
                continue;
            }
            stream.seek(SeekFrom::Start(start))?;
            let count: u16 = order.read(stream)?;
            if count > self.max_entries {
                warn!("IFD at {start} claims {count} entries");
                return Err(DatastreamError::TooManyEntries(count));
            }
            let table_end = start + 2 + ENTRY_SIZE * u64::from(count);
            let complete = if table_end > stream_len {
                let fit = (stream_len - start - 2) / ENTRY_SIZE;
                warn!("IFD at {start} is truncated, {fit} of {count} entries present");
                fit
            } else {
                u64::from(count)
            };
            debug!("IFD{ifd} at {start} with {count} entries");

            for i in 0..complete {
                let entry_start = start + 2 + ENTRY_SIZE * i;
                stream.seek(SeekFrom::Start(entry_start))?;
                let tag: u16 = order.read(stream)?;
                let type_code: u16 = order.read(stream)?;
                let datatype = TagType::from(type_code);
                let count: u32 = order.read(stream)?;

                let mut entry = ExifEntry {
                    ifd,
                    tag,
                    datatype,
                    type_code,
                    count,
                    order,
                    value_offset: entry_start + 8,
                    base,
                };
                let byte_len = entry.byte_len().ok_or(DatastreamError::SizeOverflow)?;
                if byte_len > 4 {
                    let pointer: u32 = order.read(stream)?;
                    entry.value_offset = base + u64::from(pointer);
                }
                if entry.value_offset.saturating_add(byte_len) > stream_len {
                    warn!("Skipping {entry}: value runs past the end of the stream");
                    continue;
                }

                if self.follow_sub_ifds && is_sub_ifd_pointer(tag) {
                    match entry.read_values::<u64, _>(stream) {
                        Ok(offsets) => queue.extend(offsets.first().map(|&o| (o, false))),
                        Err(e) => warn!("Bad sub-IFD pointer {entry}: {e:?}"),
                    }
                }

                stream.seek(SeekFrom::Start(entry.value_offset))?;
                handler(&entry, stream)?;
                visited_entries += 1;
            }

            if follow_chain {
                if complete < u64::from(count) || table_end + 4 > stream_len {
                    warn!("IFD at {start} has no next IFD pointer, stopping chain");
                } else {
                    stream.seek(SeekFrom::Start(table_end))?;
                    let next: u32 = order.read(stream)?;
                    queue.push_back((u64::from(next), true));
                }
            }
            ifd += 1;
        }

        Ok(visited_entries)
    }

    /// Walk the IFDs and report each entry to a C handler.
    ///
    /// `ifp` is the tagged stream handle, positioned at the value. `len` is
    /// the entry's element count and `ord` its byte order mark.
    ///
    /// # Safety
    ///
    /// `callback` must treat `ifp` as an [`AnyDatastream`] and only use it
    /// for the duration of the call. `context` is passed through untouched.
    pub unsafe fn parse_with_callback(
        &self,
        stream: &mut AnyDatastream<'_>,
        callback: ExifParserCallback,
        context: *mut c_void,
    ) -> DatastreamResult<usize> {
        self.parse(stream, |entry, stream| {
            let ifp = (stream as *mut AnyDatastream<'_>).cast::<c_void>();
            let len = c_int::try_from(entry.count).unwrap_or(c_int::MAX);
            // SAFETY: upheld by the caller of `parse_with_callback`.
            unsafe {
                callback(
                    context,
                    c_int::from(entry.tag),
                    c_int::from(entry.type_code),
                    len,
                    entry.order.order_mark(),
                    ifp,
                    entry.base as i64,
                )
            };
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_tiff(entries: &[(u16, u16, u32, u32)], next: u32) -> Vec<u8> {
        let mut out = b"II*\0".to_vec();
        out.extend(8u32.to_le_bytes());
        out.extend((entries.len() as u16).to_le_bytes());
        for &(tag, type_code, count, value) in entries {
            out.extend(tag.to_le_bytes());
            out.extend(type_code.to_le_bytes());
            out.extend(count.to_le_bytes());
            out.extend(value.to_le_bytes());
        }
        out.extend(next.to_le_bytes());
        out
    }

    #[test]
    fn rejects_bad_headers() {
        let mut stream = AnyDatastream::from_buffer(&b"XX*\0\x08\0\0\0"[..]);
        let err = ExifParser::new().parse(&mut stream, |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, DatastreamError::BadMagicBytes));

        let mut stream = AnyDatastream::from_buffer(&b"II+\0\x08\0\0\0"[..]);
        let err = ExifParser::new().parse(&mut stream, |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, DatastreamError::BadTiffVersion(43)));
    }

    #[test]
    fn inline_values_are_readable() {
        let data = le_tiff(&[(0x0112, 3, 1, 6), (0x0100, 4, 1, 4000)], 0);
        let mut stream = AnyDatastream::from_buffer(data);
        let mut seen = vec![];
        let n = ExifParser::new()
            .parse(&mut stream, |entry, stream| {
                let values: Vec<u32> = entry.read_values(stream)?;
                seen.push((entry.tag, values[0]));
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(seen, vec![(0x0112, 6), (0x0100, 4000)]);
    }

    #[test]
    fn ifd_loops_stop() {
        // next IFD offset points back at IFD0
        let data = le_tiff(&[(0x0112, 3, 1, 1)], 8);
        let mut stream = AnyDatastream::from_buffer(data);
        let n = ExifParser::new().parse(&mut stream, |_, _| Ok(())).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn too_many_entries() {
        let data = le_tiff(&[(1, 1, 1, 0), (2, 1, 1, 0), (3, 1, 1, 0)], 0);
        let mut stream = AnyDatastream::from_buffer(data);
        let err = ExifParser::new()
            .with_max_entries(2)
            .parse(&mut stream, |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, DatastreamError::TooManyEntries(3)));
    }

    #[test]
    fn handler_errors_abort() {
        let data = le_tiff(&[(1, 1, 1, 0), (2, 1, 1, 0)], 0);
        let mut stream = AnyDatastream::from_buffer(data);
        let mut calls = 0;
        let err = ExifParser::new()
            .parse(&mut stream, |_, _| {
                calls += 1;
                Err(DatastreamError::HandlerError("stop".into()))
            })
            .unwrap_err();
        assert!(matches!(err, DatastreamError::HandlerError(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn first_ifd_beyond_the_end_is_empty() {
        let mut data = b"II*\0".to_vec();
        data.extend(0x1000u32.to_le_bytes());
        let mut stream = AnyDatastream::from_buffer(data);
        let n = ExifParser::new().parse(&mut stream, |_, _| Ok(())).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn missing_next_pointer_ends_the_chain() {
        let mut data = le_tiff(&[(0x0112, 3, 1, 1)], 0);
        data.truncate(data.len() - 4);
        let mut stream = AnyDatastream::from_buffer(data);
        let n = ExifParser::new().parse(&mut stream, |_, _| Ok(())).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn truncated_tables_keep_complete_entries() {
        let mut data = le_tiff(&[(1, 3, 1, 0), (2, 3, 1, 0), (3, 3, 1, 0)], 0);
        // drop the next pointer and half of the last entry
        data.truncate(data.len() - 10);
        let mut stream = AnyDatastream::from_buffer(data);
        let mut tags = vec![];
        let n = ExifParser::new()
            .parse(&mut stream, |entry, _| {
                tags.push(entry.tag);
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(tags, vec![1, 2]);

        let mut stream = AnyDatastream::from_buffer(&b"II*\0\x08\0\0\0\x01"[..]);
        let n = ExifParser::new().parse(&mut stream, |_, _| Ok(())).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn values_past_the_end_are_skipped() {
        let data = le_tiff(&[(0x010F, 2, 32, 0x1000), (0x0112, 3, 1, 1)], 0);
        let mut stream = AnyDatastream::from_buffer(data);
        let mut tags = vec![];
        ExifParser::new()
            .parse(&mut stream, |entry, _| {
                tags.push(entry.tag);
                Ok(())
            })
            .unwrap();
        assert_eq!(tags, vec![0x0112]);
    }
}
