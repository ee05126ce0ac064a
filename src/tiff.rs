//! Minimal TIFF directory decoder
//!
//! EXIF data is a TIFF stream: a header followed by a chain of IFDs
//! (Image File Directories), each an ordered list of typed tags. This module
//! decodes that chain into [`Directory`] values and gives typed access to
//! each [`Tag`]'s elements. It knows nothing about tag meanings; naming and
//! sub-IFD resolution happen in [`crate::Exif`].
//!
//! TIFF Structure:
//! - Header: byte order (II/MM), magic (0x002A), IFD offset
//! - IFD (Image File Directory): tag count, tags (12 bytes each), next IFD offset
//! - Tags: tag ID (2), type (2), count (4), value/offset (4)

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

/// Maximum number of tags in an IFD (prevents DOS attacks)
pub const MAX_IFD_TAGS: u16 = 1000;

/// Maximum number of IFDs followed in one chain
pub const MAX_IFD_CHAIN: usize = 64;

/// Out-of-line tag values may total at most this multiple of the stream length
pub const VALUE_BUDGET_FACTOR: u64 = 4;

/// Errors raised while decoding TIFF structure or reading tag values
#[derive(Debug, thiserror::Error)]
pub enum TiffError {
    /// I/O error while reading the stream
    #[error("tiff: {0}")]
    Io(#[from] io::Error),

    /// Stream does not start with `II` or `MM`
    #[error("tiff: invalid byte order marker")]
    BadByteOrder,

    /// Header magic is not 42
    #[error("tiff: could not find TIFF magic number")]
    BadMagic,

    /// IFD claims more entries than [`MAX_IFD_TAGS`]
    #[error("tiff: IFD has {0} entries (max {max})", max = MAX_IFD_TAGS)]
    TooManyEntries(u16),

    /// A tag value points past the end of the stream
    #[error("tiff: short read of tag value")]
    ShortReadTagValue,

    /// Out-of-line values add up to more than the stream can hold
    #[error("tiff: tag values exceed {limit} bytes")]
    ValueBudgetExceeded { limit: u64 },

    /// Element requested with the wrong accessor for the tag's type
    #[error("tiff: tag {id:#06x} has format {actual:?}, not {expected:?}")]
    WrongFormat {
        id: u16,
        expected: Format,
        actual: Format,
    },

    /// Element index beyond the tag's count
    #[error("tiff: index {index} out of range for tag {id:#06x} with count {count}")]
    IndexOutOfRange { id: u16, index: usize, count: u32 },
}

/// Result type for TIFF decoding
pub type TiffResult<T> = std::result::Result<T, TiffError>;

/// Byte order for reading multi-byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    fn read_u16(&self, data: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes([data[0], data[1]]),
            ByteOrder::BigEndian => u16::from_be_bytes([data[0], data[1]]),
        }
    }

    fn read_u32(&self, data: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            ByteOrder::BigEndian => u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
        }
    }

    fn read_u64(&self, data: &[u8]) -> u64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&data[..8]);
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(b),
            ByteOrder::BigEndian => u64::from_be_bytes(b),
        }
    }

    fn read_u16_from<R: Read + ?Sized>(&self, r: &mut R) -> io::Result<u16> {
        match self {
            ByteOrder::LittleEndian => r.read_u16::<LittleEndian>(),
            ByteOrder::BigEndian => r.read_u16::<BigEndian>(),
        }
    }

    fn read_u32_from<R: Read + ?Sized>(&self, r: &mut R) -> io::Result<u32> {
        match self {
            ByteOrder::LittleEndian => r.read_u32::<LittleEndian>(),
            ByteOrder::BigEndian => r.read_u32::<BigEndian>(),
        }
    }
}

/// TIFF field data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
}

impl DataType {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => Self::Byte,
            2 => Self::Ascii,
            3 => Self::Short,
            4 => Self::Long,
            5 => Self::Rational,
            6 => Self::SByte,
            7 => Self::Undefined,
            8 => Self::SShort,
            9 => Self::SLong,
            10 => Self::SRational,
            11 => Self::Float,
            12 => Self::Double,
            _ => return None,
        })
    }

    /// Size in bytes of one element of this type
    pub fn size(&self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float => 4,
            Self::Rational | Self::SRational | Self::Double => 8,
        }
    }

    /// Value class used to pick an accessor
    pub fn format(&self) -> Format {
        match self {
            Self::Byte | Self::Short | Self::Long | Self::SByte | Self::SShort | Self::SLong => {
                Format::IntVal
            }
            Self::Rational | Self::SRational => Format::RatVal,
            Self::Float | Self::Double => Format::FloatVal,
            Self::Ascii => Format::StringVal,
            Self::Undefined => Format::UndefVal,
        }
    }
}

/// Value class of a tag, independent of its exact width and signedness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    IntVal,
    FloatVal,
    RatVal,
    StringVal,
    UndefVal,
    OtherVal,
}

/// A single decoded IFD entry
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Numeric tag ID
    pub id: u16,
    /// Raw TIFF data type code
    pub datatype: u16,
    /// Number of elements
    pub count: u32,
    order: ByteOrder,
    val: Vec<u8>,
}

impl Tag {
    /// Build a tag from already-decoded parts
    pub fn new(id: u16, datatype: DataType, count: u32, order: ByteOrder, val: Vec<u8>) -> Self {
        Self {
            id,
            datatype: datatype as u16,
            count,
            order,
            val,
        }
    }

    pub fn data_type(&self) -> Option<DataType> {
        DataType::from_u16(self.datatype)
    }

    pub fn format(&self) -> Format {
        self.data_type()
            .map(|t| t.format())
            .unwrap_or(Format::OtherVal)
    }

    /// Raw value bytes, in the stream's byte order
    pub fn bytes(&self) -> &[u8] {
        &self.val
    }

    fn check(&self, expected: Format, index: usize) -> TiffResult<DataType> {
        let actual = self.format();
        if actual != expected {
            return Err(TiffError::WrongFormat {
                id: self.id,
                expected,
                actual,
            });
        }
        if index >= self.count as usize {
            return Err(TiffError::IndexOutOfRange {
                id: self.id,
                index,
                count: self.count,
            });
        }
        // format() only returns a class other than OtherVal for known types
        let dt = self.data_type().ok_or(TiffError::WrongFormat {
            id: self.id,
            expected,
            actual: Format::OtherVal,
        })?;
        if (index + 1) * dt.size() > self.val.len() {
            return Err(TiffError::IndexOutOfRange {
                id: self.id,
                index,
                count: self.count,
            });
        }
        Ok(dt)
    }

    /// Element `i` of an integer-typed tag
    pub fn int(&self, i: usize) -> TiffResult<i64> {
        let dt = self.check(Format::IntVal, i)?;
        let at = i * dt.size();
        let v = &self.val[at..at + dt.size()];
        Ok(match dt {
            DataType::Byte => v[0] as i64,
            DataType::SByte => v[0] as i8 as i64,
            DataType::Short => self.order.read_u16(v) as i64,
            DataType::SShort => self.order.read_u16(v) as i16 as i64,
            DataType::Long => self.order.read_u32(v) as i64,
            _ => self.order.read_u32(v) as i32 as i64,
        })
    }

    /// Element `i` of a rational-typed tag as numerator and denominator
    pub fn rat2(&self, i: usize) -> TiffResult<(i64, i64)> {
        let dt = self.check(Format::RatVal, i)?;
        let v = &self.val[i * 8..i * 8 + 8];
        let (num, den) = (self.order.read_u32(&v[..4]), self.order.read_u32(&v[4..]));
        Ok(match dt {
            DataType::SRational => (num as i32 as i64, den as i32 as i64),
            _ => (num as i64, den as i64),
        })
    }

    /// Element `i` of a float-typed tag
    pub fn float(&self, i: usize) -> TiffResult<f64> {
        let dt = self.check(Format::FloatVal, i)?;
        Ok(match dt {
            DataType::Float => f32::from_bits(self.order.read_u32(&self.val[i * 4..])) as f64,
            _ => f64::from_bits(self.order.read_u64(&self.val[i * 8..i * 8 + 8])),
        })
    }

    /// Value of an ASCII tag, cut at the first NUL
    pub fn string_val(&self) -> TiffResult<String> {
        let actual = self.format();
        if actual != Format::StringVal {
            return Err(TiffError::WrongFormat {
                id: self.id,
                expected: Format::StringVal,
                actual,
            });
        }
        let end = self
            .val
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.val.len());
        Ok(String::from_utf8_lossy(&self.val[..end]).into_owned())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count as usize;
        let mut parts = Vec::with_capacity(count);
        match self.format() {
            Format::StringVal => {
                return write!(f, "{:?}", self.string_val().unwrap_or_default());
            }
            Format::IntVal => {
                for i in 0..count {
                    parts.push(self.int(i).map(|v| v.to_string()).unwrap_or_default());
                }
            }
            Format::RatVal => {
                for i in 0..count {
                    if let Ok((n, d)) = self.rat2(i) {
                        parts.push(format!("\"{n}/{d}\""));
                    }
                }
            }
            Format::FloatVal => {
                for i in 0..count {
                    parts.push(self.float(i).map(|v| v.to_string()).unwrap_or_default());
                }
            }
            Format::UndefVal | Format::OtherVal => {
                parts.extend(self.val.iter().map(|b| b.to_string()));
            }
        }
        if parts.len() == 1 {
            write!(f, "{}", parts[0])
        } else {
            write!(f, "[{}]", parts.join(","))
        }
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let count = self.count as usize;
        match self.format() {
            Format::StringVal => serializer.serialize_str(&self.string_val().unwrap_or_default()),
            Format::IntVal => {
                let mut seq = serializer.serialize_seq(Some(count))?;
                for i in 0..count {
                    if let Ok(v) = self.int(i) {
                        seq.serialize_element(&v)?;
                    }
                }
                seq.end()
            }
            Format::RatVal => {
                let mut seq = serializer.serialize_seq(Some(count))?;
                for i in 0..count {
                    if let Ok((n, d)) = self.rat2(i) {
                        seq.serialize_element(&format!("{n}/{d}"))?;
                    }
                }
                seq.end()
            }
            Format::FloatVal => {
                let mut seq = serializer.serialize_seq(Some(count))?;
                for i in 0..count {
                    if let Ok(v) = self.float(i) {
                        seq.serialize_element(&v)?;
                    }
                }
                seq.end()
            }
            Format::UndefVal | Format::OtherVal => {
                let mut seq = serializer.serialize_seq(Some(self.val.len()))?;
                for b in &self.val {
                    seq.serialize_element(b)?;
                }
                seq.end()
            }
        }
    }
}

/// One IFD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directory {
    pub tags: Vec<Tag>,
}

/// A decoded TIFF stream: every IFD in the main chain, plus its byte order
#[derive(Debug, Clone)]
pub struct Tiff {
    pub dirs: Vec<Directory>,
    pub order: ByteOrder,
}

/// Decode a TIFF stream into its chain of directories
///
/// The reader is consumed to the end; offsets inside the stream are
/// relative to its first byte.
pub fn decode<R: Read>(mut reader: R) -> TiffResult<Tiff> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    if data.len() < 8 {
        return Err(TiffError::Io(io::ErrorKind::UnexpectedEof.into()));
    }

    // Byte order: "II" (0x4949) = little endian, "MM" (0x4D4D) = big endian
    let order = match &data[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return Err(TiffError::BadByteOrder),
    };
    if order.read_u16(&data[2..4]) != 0x002A {
        return Err(TiffError::BadMagic);
    }

    let limit = value_budget(data.len() as u64);
    let mut budget = limit;
    let mut cursor = io::Cursor::new(data.as_slice());
    let mut dirs = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = order.read_u32(&data[4..8]);

    while offset != 0 {
        if dirs.len() >= MAX_IFD_CHAIN || !visited.insert(offset) {
            tracing::debug!(offset, "tiff: stopping IFD chain at repeated or excess IFD");
            break;
        }
        if !dirs.is_empty() && offset as usize >= data.len() {
            tracing::debug!(offset, "tiff: next IFD offset past end of stream");
            break;
        }
        cursor.seek(SeekFrom::Start(offset as u64))?;
        let (dir, next) = read_dir(&mut cursor, order, limit, &mut budget)?;
        dirs.push(dir);
        offset = next;
    }

    Ok(Tiff { dirs, order })
}

/// Decode a single IFD at the reader's current position
///
/// Returns the directory and the offset of the next IFD (0 if none).
/// Out-of-line values are limited to [`VALUE_BUDGET_FACTOR`] times the
/// stream length in total.
pub fn decode_dir<R: Read + Seek>(reader: &mut R, order: ByteOrder) -> TiffResult<(Directory, u32)> {
    let start = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(start))?;

    let limit = value_budget(len);
    let mut budget = limit;
    read_dir(reader, order, limit, &mut budget)
}

fn value_budget(len: u64) -> u64 {
    len.saturating_mul(VALUE_BUDGET_FACTOR)
}

/// Decode one IFD, charging out-of-line value bytes against `budget`
fn read_dir<R: Read + Seek>(
    reader: &mut R,
    order: ByteOrder,
    limit: u64,
    budget: &mut u64,
) -> TiffResult<(Directory, u32)> {
    let start = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(start))?;

    let tag_count = order.read_u16_from(reader)?;
    if tag_count > MAX_IFD_TAGS {
        return Err(TiffError::TooManyEntries(tag_count));
    }

    let mut dir = Directory::default();
    for _ in 0..tag_count {
        let mut entry = [0u8; 12];
        reader.read_exact(&mut entry)?;

        let id = order.read_u16(&entry[0..2]);
        let datatype = order.read_u16(&entry[2..4]);
        let count = order.read_u32(&entry[4..8]);

        let Some(dt) = DataType::from_u16(datatype) else {
            tracing::debug!(id, datatype, "tiff: skipping tag with unknown data type");
            continue;
        };
        let size = (count as u64)
            .checked_mul(dt.size() as u64)
            .ok_or(TiffError::ShortReadTagValue)?;

        let val = if size <= 4 {
            entry[8..8 + size as usize].to_vec()
        } else {
            let value_offset = order.read_u32(&entry[8..12]) as u64;
            if value_offset + size > len {
                return Err(TiffError::ShortReadTagValue);
            }
            *budget = budget
                .checked_sub(size)
                .ok_or(TiffError::ValueBudgetExceeded { limit })?;
            let resume = reader.stream_position()?;
            reader.seek(SeekFrom::Start(value_offset))?;
            let mut val = vec![0u8; size as usize];
            reader.read_exact(&mut val)?;
            reader.seek(SeekFrom::Start(resume))?;
            val
        };

        dir.tags.push(Tag {
            id,
            datatype,
            count,
            order,
            val,
        });
    }

    let next = order.read_u32_from(reader)?;
    Ok((dir, next))
}
