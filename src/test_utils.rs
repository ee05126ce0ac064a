//! Test utilities for building fixture files in memory.
//!
//! Binary fixtures are awkward to review and to fuzz against, so tests build
//! their inputs from parts instead:
//! - [`TiffBuilder`] lays out a TIFF stream with a main IFD chain, sub-IFDs
//!   reached through pointer tags, and opaque blobs (thumbnails, previews)
//! - [`wrap_jpeg`] frames a TIFF stream as a JPEG with an APP1 Exif segment
//! - [`HeicBuilder`] frames a TIFF stream as an Exif item in a HEIC file
//!
//! # Usage
//!
//! ```
//! use exif_io::test_utils::*;
//! use exif_io::ByteOrder;
//!
//! let tiff = TiffBuilder::new(ByteOrder::BigEndian)
//!     .ifd(vec![Entry::ascii(0x010F, "Canon"), Entry::sub_ifd(0x8769, 0)])
//!     .sub_ifd(vec![Entry::ascii(0x9003, "2023:05:01 12:00:00")])
//!     .build();
//! let jpeg = wrap_jpeg(&tiff, Some("holiday"));
//! let heic = HeicBuilder::new(&tiff).build();
//! # let _ = (jpeg, heic);
//! ```

use crate::tiff::{ByteOrder, DataType};

/// Value carried by an [`Entry`], resolved when the stream is laid out
#[derive(Debug, Clone)]
enum Value {
    Data(DataType, u32, Vec<Scalar>),
    SubIfd(usize),
    BlobOffset(usize),
    BlobLength(usize),
}

#[derive(Debug, Clone, Copy)]
enum Scalar {
    U8(u8),
    U16(u16),
    U32(u32),
    Rat(u32, u32),
}

/// A single IFD entry to be written by [`TiffBuilder`]
#[derive(Debug, Clone)]
pub struct Entry {
    id: u16,
    value: Value,
}

impl Entry {
    fn data(id: u16, datatype: DataType, count: usize, values: Vec<Scalar>) -> Self {
        Self {
            id,
            value: Value::Data(datatype, count as u32, values),
        }
    }

    pub fn byte(id: u16, values: &[u8]) -> Self {
        let v = values.iter().map(|&b| Scalar::U8(b)).collect();
        Self::data(id, DataType::Byte, values.len(), v)
    }

    pub fn undefined(id: u16, values: &[u8]) -> Self {
        let v = values.iter().map(|&b| Scalar::U8(b)).collect();
        Self::data(id, DataType::Undefined, values.len(), v)
    }

    /// ASCII entry; the terminating NUL is added
    pub fn ascii(id: u16, value: &str) -> Self {
        let mut v: Vec<Scalar> = value.bytes().map(Scalar::U8).collect();
        v.push(Scalar::U8(0));
        let count = v.len();
        Self::data(id, DataType::Ascii, count, v)
    }

    pub fn short(id: u16, values: &[u16]) -> Self {
        let v = values.iter().map(|&s| Scalar::U16(s)).collect();
        Self::data(id, DataType::Short, values.len(), v)
    }

    pub fn sshort(id: u16, values: &[i16]) -> Self {
        let v = values.iter().map(|&s| Scalar::U16(s as u16)).collect();
        Self::data(id, DataType::SShort, values.len(), v)
    }

    pub fn long(id: u16, values: &[u32]) -> Self {
        let v = values.iter().map(|&l| Scalar::U32(l)).collect();
        Self::data(id, DataType::Long, values.len(), v)
    }

    pub fn rational(id: u16, values: &[(u32, u32)]) -> Self {
        let v = values.iter().map(|&(n, d)| Scalar::Rat(n, d)).collect();
        Self::data(id, DataType::Rational, values.len(), v)
    }

    /// LONG pointer to the sub-IFD with the given index
    pub fn sub_ifd(id: u16, index: usize) -> Self {
        Self {
            id,
            value: Value::SubIfd(index),
        }
    }

    /// LONG offset of the blob with the given index
    pub fn blob_offset(id: u16, index: usize) -> Self {
        Self {
            id,
            value: Value::BlobOffset(index),
        }
    }

    /// LONG length of the blob with the given index
    pub fn blob_length(id: u16, index: usize) -> Self {
        Self {
            id,
            value: Value::BlobLength(index),
        }
    }
}

/// Lays out a TIFF stream
///
/// Layout: header, main-chain IFDs, sub-IFDs, then blobs. Each IFD is
/// immediately followed by the out-of-line values of its entries.
#[derive(Debug, Clone)]
pub struct TiffBuilder {
    order: ByteOrder,
    chain: Vec<Vec<Entry>>,
    subs: Vec<Vec<Entry>>,
    blobs: Vec<Vec<u8>>,
}

impl TiffBuilder {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            chain: Vec::new(),
            subs: Vec::new(),
            blobs: Vec::new(),
        }
    }

    /// Append an IFD to the main chain
    pub fn ifd(mut self, entries: Vec<Entry>) -> Self {
        self.chain.push(entries);
        self
    }

    /// Add a sub-IFD, referenced by [`Entry::sub_ifd`] with its index
    pub fn sub_ifd(mut self, entries: Vec<Entry>) -> Self {
        self.subs.push(entries);
        self
    }

    /// Add an opaque blob, referenced by [`Entry::blob_offset`] / [`Entry::blob_length`]
    pub fn blob(mut self, data: Vec<u8>) -> Self {
        self.blobs.push(data);
        self
    }

    fn value_size(value: &Value) -> usize {
        match value {
            Value::Data(dt, count, _) => dt.size() * *count as usize,
            _ => 4,
        }
    }

    fn ifd_size(entries: &[Entry]) -> usize {
        let overflow: usize = entries
            .iter()
            .map(|e| Self::value_size(&e.value))
            .filter(|&s| s > 4)
            .map(|s| s + (s & 1))
            .sum();
        2 + 12 * entries.len() + 4 + overflow
    }

    pub fn build(self) -> Vec<u8> {
        // First pass: offsets of every block
        let mut pos = 8usize;
        let mut chain_offsets = Vec::new();
        for entries in &self.chain {
            chain_offsets.push(pos);
            pos += Self::ifd_size(entries);
        }
        let mut sub_offsets = Vec::new();
        for entries in &self.subs {
            sub_offsets.push(pos);
            pos += Self::ifd_size(entries);
        }
        let mut blob_offsets = Vec::new();
        for blob in &self.blobs {
            blob_offsets.push(pos);
            pos += blob.len();
        }

        let mut out = Vec::with_capacity(pos);
        match self.order {
            ByteOrder::LittleEndian => out.extend_from_slice(b"II*\0"),
            ByteOrder::BigEndian => out.extend_from_slice(b"MM\0*"),
        }
        let first = chain_offsets.first().copied().unwrap_or(0);
        self.put_u32(&mut out, first as u32);

        for (i, entries) in self.chain.iter().enumerate() {
            let next = chain_offsets.get(i + 1).copied().unwrap_or(0);
            self.write_ifd(&mut out, entries, next as u32, &sub_offsets, &blob_offsets);
        }
        for entries in &self.subs {
            self.write_ifd(&mut out, entries, 0, &sub_offsets, &blob_offsets);
        }
        for blob in &self.blobs {
            out.extend_from_slice(blob);
        }
        out
    }

    fn write_ifd(
        &self,
        out: &mut Vec<u8>,
        entries: &[Entry],
        next: u32,
        sub_offsets: &[usize],
        blob_offsets: &[usize],
    ) {
        let start = out.len();
        let mut overflow_pos = start + 2 + 12 * entries.len() + 4;
        let mut overflow = Vec::new();

        self.put_u16(out, entries.len() as u16);
        for entry in entries {
            self.put_u16(out, entry.id);
            let mut data = Vec::new();
            let (dt, count) = match &entry.value {
                Value::Data(dt, count, values) => {
                    for v in values {
                        self.put_scalar(&mut data, *v);
                    }
                    (*dt, *count)
                }
                Value::SubIfd(i) => {
                    self.put_u32(&mut data, sub_offsets[*i] as u32);
                    (DataType::Long, 1)
                }
                Value::BlobOffset(i) => {
                    self.put_u32(&mut data, blob_offsets[*i] as u32);
                    (DataType::Long, 1)
                }
                Value::BlobLength(i) => {
                    self.put_u32(&mut data, self.blobs[*i].len() as u32);
                    (DataType::Long, 1)
                }
            };
            self.put_u16(out, dt as u16);
            self.put_u32(out, count);
            if data.len() <= 4 {
                data.resize(4, 0);
                out.extend_from_slice(&data);
            } else {
                self.put_u32(out, overflow_pos as u32);
                if data.len() & 1 == 1 {
                    data.push(0);
                }
                overflow_pos += data.len();
                overflow.extend_from_slice(&data);
            }
        }
        self.put_u32(out, next);
        out.extend_from_slice(&overflow);
    }

    fn put_scalar(&self, out: &mut Vec<u8>, v: Scalar) {
        match v {
            Scalar::U8(b) => out.push(b),
            Scalar::U16(s) => self.put_u16(out, s),
            Scalar::U32(l) => self.put_u32(out, l),
            Scalar::Rat(n, d) => {
                self.put_u32(out, n);
                self.put_u32(out, d);
            }
        }
    }

    fn put_u16(&self, out: &mut Vec<u8>, v: u16) {
        match self.order {
            ByteOrder::LittleEndian => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::BigEndian => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn put_u32(&self, out: &mut Vec<u8>, v: u32) {
        match self.order {
            ByteOrder::LittleEndian => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::BigEndian => out.extend_from_slice(&v.to_be_bytes()),
        }
    }
}

fn jpeg_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.push(0xFF);
    out.push(marker);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Frame a TIFF stream as a JPEG: SOI, APP0 (JFIF), APP1 (Exif), optional
/// COM, a dummy DQT, a minimal scan and EOI
pub fn wrap_jpeg(tiff: &[u8], comment: Option<&str>) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    jpeg_segment(&mut out, 0xE0, b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");

    let mut app1 = b"Exif\0\0".to_vec();
    app1.extend_from_slice(tiff);
    jpeg_segment(&mut out, 0xE1, &app1);

    if let Some(text) = comment {
        jpeg_segment(&mut out, 0xFE, text.as_bytes());
    }
    jpeg_segment(&mut out, 0xDB, &[0u8; 65]);
    jpeg_segment(&mut out, 0xDA, &[1, 1, 0, 0, 0x3F, 0]);
    out.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// Frame a TIFF stream as a JPEG whose only APP1 segment carries `payload`
/// verbatim (no Exif signature is added)
pub fn wrap_jpeg_raw_app1(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    jpeg_segment(&mut out, 0xE1, payload);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

fn bmff_box(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(name);
    out.extend_from_slice(payload);
    out
}

fn bmff_full_box(name: &[u8; 4], version: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![version, 0, 0, 0];
    body.extend_from_slice(payload);
    bmff_box(name, &body)
}

/// Frames a TIFF stream as the Exif item of a HEIC file
///
/// The file holds `ftyp`, `meta` (`hdlr`, `pitm`, `iinf`, `iloc`) and an
/// `mdat` carrying a dummy image item and the Exif item. The Exif item is
/// prefixed with its 4-byte TIFF header offset and `Exif\0\0`.
#[derive(Debug, Clone)]
pub struct HeicBuilder {
    tiff: Vec<u8>,
    brand: [u8; 4],
    iloc_version: u8,
    offset_size: u8,
    base_offset_size: u8,
    mdat_first: bool,
    include_exif_item: bool,
}

impl HeicBuilder {
    pub fn new(tiff: &[u8]) -> Self {
        Self {
            tiff: tiff.to_vec(),
            brand: *b"heic",
            iloc_version: 0,
            offset_size: 4,
            base_offset_size: 0,
            mdat_first: false,
            include_exif_item: true,
        }
    }

    pub fn brand(mut self, brand: &[u8; 4]) -> Self {
        self.brand = *brand;
        self
    }

    /// `iloc` version (0 or 1); version 1 carries a 4-byte index field
    pub fn iloc_version(mut self, version: u8) -> Self {
        self.iloc_version = version;
        self
    }

    /// Width of `iloc` extent offsets and lengths (4 or 8)
    pub fn offset_size(mut self, size: u8) -> Self {
        self.offset_size = size;
        self
    }

    /// Width of `iloc` base offsets (0, 4 or 8); the base offset is always 0
    pub fn base_offset_size(mut self, size: u8) -> Self {
        self.base_offset_size = size;
        self
    }

    /// Place `mdat` before `meta`, so the extent lies in already-read bytes
    pub fn mdat_first(mut self, yes: bool) -> Self {
        self.mdat_first = yes;
        self
    }

    /// Omit the Exif item from `iinf`
    pub fn without_exif_item(mut self) -> Self {
        self.include_exif_item = false;
        self
    }

    fn exif_payload(&self) -> Vec<u8> {
        let mut payload = 6u32.to_be_bytes().to_vec();
        payload.extend_from_slice(b"Exif\0\0");
        payload.extend_from_slice(&self.tiff);
        payload
    }

    fn put_sized(out: &mut Vec<u8>, size: u8, v: u64) {
        match size {
            0 => {}
            4 => out.extend_from_slice(&(v as u32).to_be_bytes()),
            _ => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn meta(&self, image_offset: u64, exif_offset: u64, exif_len: u64) -> Vec<u8> {
        let hdlr = bmff_full_box(b"hdlr", 0, b"\0\0\0\0pict\0\0\0\0\0\0\0\0\0\0\0\0\0");
        let pitm = bmff_full_box(b"pitm", 0, &1u16.to_be_bytes());

        let mut iinf_body = Vec::new();
        let items: Vec<(u16, &[u8; 4])> = if self.include_exif_item {
            vec![(1, b"hvc1"), (2, b"Exif")]
        } else {
            vec![(1, b"hvc1")]
        };
        iinf_body.extend_from_slice(&(items.len() as u16).to_be_bytes());
        for (id, kind) in &items {
            let mut infe = id.to_be_bytes().to_vec();
            infe.extend_from_slice(&0u16.to_be_bytes());
            infe.extend_from_slice(*kind);
            infe.push(0);
            iinf_body.extend_from_slice(&bmff_full_box(b"infe", 2, &infe));
        }
        let iinf = bmff_full_box(b"iinf", 0, &iinf_body);

        let index_size = if self.iloc_version == 1 { 4u8 } else { 0 };
        let mut iloc_body = vec![
            (self.offset_size << 4) | self.offset_size,
            (self.base_offset_size << 4) | index_size,
        ];
        iloc_body.extend_from_slice(&2u16.to_be_bytes());
        for (id, offset, len) in [(1u16, image_offset, 4u64), (2, exif_offset, exif_len)] {
            iloc_body.extend_from_slice(&id.to_be_bytes());
            if self.iloc_version == 1 {
                iloc_body.extend_from_slice(&0u16.to_be_bytes());
            }
            iloc_body.extend_from_slice(&0u16.to_be_bytes());
            Self::put_sized(&mut iloc_body, self.base_offset_size, 0);
            iloc_body.extend_from_slice(&1u16.to_be_bytes());
            if self.iloc_version == 1 {
                iloc_body.extend_from_slice(&0u32.to_be_bytes());
            }
            Self::put_sized(&mut iloc_body, self.offset_size, offset);
            Self::put_sized(&mut iloc_body, self.offset_size, len);
        }
        let iloc = bmff_full_box(b"iloc", self.iloc_version, &iloc_body);

        let mut meta_body = Vec::new();
        meta_body.extend_from_slice(&hdlr);
        meta_body.extend_from_slice(&pitm);
        meta_body.extend_from_slice(&iinf);
        meta_body.extend_from_slice(&iloc);
        bmff_full_box(b"meta", 0, &meta_body)
    }

    pub fn build(self) -> Vec<u8> {
        let mut ftyp_body = self.brand.to_vec();
        ftyp_body.extend_from_slice(&0u32.to_be_bytes());
        ftyp_body.extend_from_slice(b"mif1heic");
        let ftyp = bmff_box(b"ftyp", &ftyp_body);

        let image = [0xAAu8; 4];
        let exif = self.exif_payload();
        let mut mdat_body = image.to_vec();
        mdat_body.extend_from_slice(&exif);
        let mdat = bmff_box(b"mdat", &mdat_body);

        // meta's size does not depend on the offsets it carries
        let meta_len = self.meta(0, 0, 0).len() as u64;
        let mdat_start = if self.mdat_first {
            ftyp.len() as u64
        } else {
            ftyp.len() as u64 + meta_len
        };
        let image_offset = mdat_start + 8;
        let exif_offset = image_offset + image.len() as u64;
        let meta = self.meta(image_offset, exif_offset, exif.len() as u64);

        let mut out = ftyp;
        if self.mdat_first {
            out.extend_from_slice(&mdat);
            out.extend_from_slice(&meta);
        } else {
            out.extend_from_slice(&meta);
            out.extend_from_slice(&mdat);
        }
        out
    }
}
