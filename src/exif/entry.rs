use super::{Endian, TagType};
use crate::error::{DatastreamError, DatastreamResult};
use std::fmt::Display;
use std::io::{Read, Seek, SeekFrom};

/// Values larger than this are not loaded into memory by `read_bytes`.
pub const MAX_VALUE_BYTES: u64 = 64 * 1024 * 1024;

/// One IFD entry. The value itself stays in the stream at `value_offset`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExifEntry {
    pub ifd: usize,
    pub tag: u16,
    pub datatype: TagType,
    /// The type code as stored, kept for codes `TagType` does not know.
    pub type_code: u16,
    pub count: u32,
    pub order: Endian,
    pub value_offset: u64,
    pub base: u64,
}

impl ExifEntry {
    pub fn byte_len(&self) -> Option<u64> {
        u64::from(self.count).checked_mul(self.datatype.size_in_bytes() as u64)
    }

    pub fn read_bytes<R: Read + Seek>(&self, stream: &mut R) -> DatastreamResult<Vec<u8>> {
        let len = self.byte_len().ok_or(DatastreamError::SizeOverflow)?;
        if len > MAX_VALUE_BYTES {
            return Err(DatastreamError::ValueOutOfRange(len));
        }
        stream.seek(SeekFrom::Start(self.value_offset))?;
        let mut buf = vec![0; len as usize];
        stream.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Decode the value as numbers. Rationals become `numerator / denominator`.
    pub fn read_values<T: num_traits::NumCast, R: Read + Seek>(
        &self,
        stream: &mut R,
    ) -> DatastreamResult<Vec<T>> {
        let bytes = self.read_bytes(stream)?;
        let e = self.order;
        let values = match self.datatype {
            TagType::Byte | TagType::Undefined | TagType::Ascii => {
                e.decode_all_to_primitive::<1, u8, T>(&bytes)
            }
            TagType::SByte => e.decode_all_to_primitive::<1, i8, T>(&bytes),
            TagType::Short => e.decode_all_to_primitive::<2, u16, T>(&bytes),
            TagType::SShort => e.decode_all_to_primitive::<2, i16, T>(&bytes),
            TagType::Long | TagType::Ifd => e.decode_all_to_primitive::<4, u32, T>(&bytes),
            TagType::SLong => e.decode_all_to_primitive::<4, i32, T>(&bytes),
            TagType::Float => e.decode_all_to_primitive::<4, f32, T>(&bytes),
            TagType::Double => e.decode_all_to_primitive::<8, f64, T>(&bytes),
            TagType::Long8 | TagType::Ifd8 => e.decode_all_to_primitive::<8, u64, T>(&bytes),
            TagType::SLong8 => e.decode_all_to_primitive::<8, i64, T>(&bytes),
            TagType::Rational => e.decode_all::<4, u32>(&bytes).and_then(|v| {
                v.chunks_exact(2)
                    .map(|p| num_traits::cast(f64::from(p[0]) / f64::from(p[1])))
                    .collect()
            }),
            TagType::SRational => e.decode_all::<4, i32>(&bytes).and_then(|v| {
                v.chunks_exact(2)
                    .map(|p| num_traits::cast(f64::from(p[0]) / f64::from(p[1])))
                    .collect()
            }),
            TagType::Unknown => None,
        };
        values.ok_or(DatastreamError::BadValue(self.tag))
    }

    /// ASCII value with trailing NULs removed.
    pub fn read_string<R: Read + Seek>(&self, stream: &mut R) -> DatastreamResult<String> {
        let bytes = self.read_bytes(stream)?;
        let end = bytes
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

impl Display for ExifEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IFD{} 0x{:04X} {:?}[{}] @{}",
            self.ifd, self.tag, self.datatype, self.count, self.value_offset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn entry(datatype: TagType, count: u32, order: Endian) -> ExifEntry {
        ExifEntry {
            ifd: 0,
            tag: 0x829A,
            datatype,
            type_code: datatype.into(),
            count,
            order,
            value_offset: 2,
            base: 0,
        }
    }

    #[test]
    fn byte_len_scales_with_type() {
        assert_eq!(entry(TagType::Short, 3, Endian::Little).byte_len(), Some(6));
        assert_eq!(
            entry(TagType::Rational, u32::MAX, Endian::Little).byte_len(),
            Some(u64::from(u32::MAX) * 8)
        );
    }

    #[test]
    fn rationals_divide() {
        let mut data = vec![0xAA, 0xBB];
        data.extend(1u32.to_be_bytes());
        data.extend(250u32.to_be_bytes());
        data.extend((-3i32).to_be_bytes());
        data.extend(4i32.to_be_bytes());
        let mut stream = Cursor::new(data);

        let unsigned: Vec<f64> = entry(TagType::Rational, 1, Endian::Big)
            .read_values(&mut stream)
            .unwrap();
        assert_eq!(unsigned, vec![0.004]);

        let mut signed = entry(TagType::SRational, 1, Endian::Big);
        signed.value_offset = 10;
        let values: Vec<f32> = signed.read_values(&mut stream).unwrap();
        assert_eq!(values, vec![-0.75]);
    }

    #[test]
    fn unknown_types_are_bad_values() {
        let mut stream = Cursor::new(vec![0u8; 8]);
        let err = entry(TagType::Unknown, 2, Endian::Little)
            .read_values::<u32, _>(&mut stream)
            .unwrap_err();
        assert!(matches!(err, DatastreamError::BadValue(0x829A)));
    }

    #[test]
    fn strings_lose_trailing_nuls() {
        let mut stream = Cursor::new(b"..Leaf\0\0".to_vec());
        let text = entry(TagType::Ascii, 6, Endian::Little)
            .read_string(&mut stream)
            .unwrap();
        assert_eq!(text, "Leaf");
    }
}
