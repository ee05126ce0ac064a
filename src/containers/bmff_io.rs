//! BMFF (ISO Base Media File Format) Exif item extraction for HEIC/HEIF
//!
//! The walk is a single forward pass: boxes are read through a scoped reader
//! that cannot run past the box's declared end, `meta` is descended into,
//! `iinf` yields the Exif item id and `iloc` yields that item's first extent.
//! The extent is then served from bytes already seen or by skipping ahead.
//!
//! Reference: ISO/IEC 14496-12:2022, ISO/IEC 23008-12:2017

use super::ContainerKind;
use crate::{
    cursor::OffsetReader,
    error::{Error, Result},
};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, BufReader, Read, Take};

/// Default bound on how much of a HEIC stream is scanned for the Exif item
pub const DEFAULT_MAX_HEIC_SCAN: u64 = 5 * 1024 * 1024;

// 4 byte size + 4 byte type
const HEADER_SIZE: u64 = 8;
// 4 byte size + 4 byte type + 8 byte large size
const HEADER_SIZE_LARGE: u64 = 16;
// version (1) + flags (3)
const FULL_BOX_EXT: u64 = 4;

/// Major brands accepted as HEIC
const HEIC_BRANDS: [&[u8; 4]; 6] = [b"mif1", b"msf1", b"heic", b"heix", b"hevc", b"hevx"];

/// Box types the Exif walk cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoxKind {
    Meta,
    Iinf,
    Infe,
    Iloc,
    Other([u8; 4]),
}

impl From<[u8; 4]> for BoxKind {
    fn from(fourcc: [u8; 4]) -> Self {
        match &fourcc {
            b"meta" => Self::Meta,
            b"iinf" => Self::Iinf,
            b"infe" => Self::Infe,
            b"iloc" => Self::Iloc,
            _ => Self::Other(fourcc),
        }
    }
}

/// A box whose content can be read but not overrun
pub(crate) struct BmffBox<R> {
    pub kind: BoxKind,
    /// Declared content size (header excluded); `u64::MAX` for "to end of file"
    pub size: u64,
    content: Take<R>,
}

impl<R: Read> BmffBox<R> {
    /// Read a box header; `None` at a clean end of stream
    pub fn read_header(mut reader: R) -> Result<Option<Self>> {
        let mut header = [0u8; 8];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let fourcc = [header[4], header[5], header[6], header[7]];

        let size = match size {
            // special case to indicate the box runs to the end of the file
            0 => u64::MAX,
            1 => reader
                .read_u64::<BigEndian>()?
                .checked_sub(HEADER_SIZE_LARGE)
                .ok_or_else(|| Error::InvalidBox(format!("{} large size too small", fourcc_str(&fourcc))))?,
            _ => size
                .checked_sub(HEADER_SIZE)
                .ok_or_else(|| Error::InvalidBox(format!("{} size {size} too small", fourcc_str(&fourcc))))?,
        };

        Ok(Some(Self {
            kind: BoxKind::from(fourcc),
            size,
            content: reader.take(size),
        }))
    }

    /// Read the version byte of a full box, discarding the flags
    pub fn read_version(&mut self) -> Result<u8> {
        let version = self.read_u8()?;
        self.read_u24::<BigEndian>()?;
        Ok(version)
    }

    /// Discard exactly `n` bytes of content
    pub fn discard(&mut self, n: u64) -> Result<()> {
        let skipped = io::copy(&mut (&mut self.content).take(n), &mut io::sink())?;
        if skipped < n {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(())
    }

    /// Discard whatever content is left
    pub fn skip_rest(&mut self) -> Result<()> {
        io::copy(&mut self.content, &mut io::sink())?;
        Ok(())
    }
}

impl<R: Read> Read for BmffBox<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.content.read(buf)
    }
}

fn fourcc_str(fourcc: &[u8; 4]) -> String {
    String::from_utf8_lossy(fourcc).into_owned()
}

/// Absolute location of an item's first extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Extent {
    pub offset: u64,
    pub length: u64,
}

/// Walk sibling boxes until the Exif item's extent is found
///
/// Takes a trait object so descending into `meta` does not instantiate a new
/// reader type per nesting level.
fn locate_exif(reader: &mut dyn Read) -> Result<Option<Extent>> {
    let mut exif_item = None;
    while let Some(mut bx) = BmffBox::read_header(&mut *reader)? {
        match bx.kind {
            BoxKind::Meta => {
                bx.discard(FULL_BOX_EXT)?;
                return locate_exif(&mut bx);
            }
            BoxKind::Iinf => {
                let id = parse_iinf(&mut bx)?.ok_or(Error::NoExifItem)?;
                tracing::debug!(item_id = id, "bmff: found Exif item");
                exif_item = Some(id);
                bx.skip_rest()?;
            }
            BoxKind::Iloc => {
                let id = exif_item.ok_or_else(|| Error::InvalidBox("iloc before iinf".into()))?;
                return parse_iloc(&mut bx, id);
            }
            BoxKind::Infe | BoxKind::Other(_) => {
                if bx.size == u64::MAX {
                    // runs to the end of the file; nothing can follow it
                    return Ok(None);
                }
                bx.skip_rest()?;
            }
        }
    }
    Ok(None)
}

/// Parse iinf and return the id of the first item whose entry mentions "Exif"
fn parse_iinf<R: Read>(iinf: &mut BmffBox<R>) -> Result<Option<u32>> {
    let version = iinf.read_version()?;
    let entry_count = if version == 0 {
        iinf.read_u16::<BigEndian>()? as u32
    } else {
        iinf.read_u32::<BigEndian>()?
    };

    for _ in 0..entry_count {
        let Some(mut infe) = BmffBox::read_header(&mut *iinf)? else {
            break;
        };
        if infe.kind != BoxKind::Infe || infe.size < FULL_BOX_EXT + 4 {
            return Err(Error::InvalidBox("bad iinf box".into()));
        }
        let infe_version = infe.read_version()?;

        let mut content = Vec::new();
        infe.read_to_end(&mut content)?;
        if !content.windows(4).any(|w| w == b"Exif") {
            continue;
        }

        let id = if infe_version >= 3 {
            u32::from_be_bytes([content[0], content[1], content[2], content[3]])
        } else {
            u16::from_be_bytes([content[0], content[1]]) as u32
        };
        return Ok(Some(id));
    }
    Ok(None)
}

/// Read a variable-length integer based on size specifier
fn read_variable_int<R: Read>(source: &mut R, size: u8) -> Result<u64> {
    match size {
        0 => Ok(0),
        4 => Ok(source.read_u32::<BigEndian>()? as u64),
        8 => Ok(source.read_u64::<BigEndian>()?),
        _ => Err(Error::InvalidBox(format!(
            "invalid iloc size specifier: {size}"
        ))),
    }
}

/// Parse iloc and return the first extent of `target`
fn parse_iloc<R: Read>(iloc: &mut BmffBox<R>, target: u32) -> Result<Option<Extent>> {
    let version = iloc.read_version()?;
    if version > 2 {
        return Err(Error::InvalidBox(format!("unsupported iloc version {version}")));
    }

    // offset_size (4 bits) + length_size (4 bits) + base_offset_size (4 bits) + index_size/reserved (4 bits)
    let sizes1 = iloc.read_u8()?;
    let sizes2 = iloc.read_u8()?;
    let offset_size = sizes1 >> 4;
    let length_size = sizes1 & 0x0F;
    let base_offset_size = sizes2 >> 4;
    let index_size = if version >= 1 { sizes2 & 0x0F } else { 0 };

    if offset_size == 0 || length_size == 0 {
        return Err(Error::InvalidBox(
            "bad iloc box offset/length sizes".into(),
        ));
    }

    let item_count = if version < 2 {
        iloc.read_u16::<BigEndian>()? as u32
    } else {
        iloc.read_u32::<BigEndian>()?
    };

    for _ in 0..item_count {
        let item_id = if version < 2 {
            iloc.read_u16::<BigEndian>()? as u32
        } else {
            iloc.read_u32::<BigEndian>()?
        };
        if version >= 1 {
            iloc.read_u16::<BigEndian>()?; // construction_method + reserved
        }
        iloc.read_u16::<BigEndian>()?; // data_reference_index
        let base_offset = read_variable_int(iloc, base_offset_size)?;
        let extent_count = iloc.read_u16::<BigEndian>()?;

        if item_id != target {
            // extents are fixed width once the sizes are known
            let extent_len = (index_size + offset_size + length_size) as u64;
            iloc.discard(extent_count as u64 * extent_len)?;
            continue;
        }

        if extent_count == 0 {
            return Ok(None);
        }
        read_variable_int(iloc, index_size)?;
        let extent_offset = read_variable_int(iloc, offset_size)?;
        let length = read_variable_int(iloc, length_size)?;
        let offset = base_offset
            .checked_add(extent_offset)
            .ok_or_else(|| Error::InvalidBox("iloc extent offset overflow".into()))?;
        return Ok(Some(Extent { offset, length }));
    }
    Ok(None)
}

/// Exif extraction from HEIC files
#[derive(Debug, Clone, Copy)]
pub struct BmffIO {
    max_scan: u64,
}

impl BmffIO {
    pub fn new(max_scan: u64) -> Self {
        Self { max_scan }
    }

    pub fn container_type() -> ContainerKind {
        ContainerKind::Heic
    }

    /// `ftyp` box at the start of the file with a HEIC major brand
    pub fn detect(header: &[u8]) -> Option<ContainerKind> {
        if header.len() < 12 || &header[4..8] != b"ftyp" {
            return None;
        }
        HEIC_BRANDS
            .iter()
            .any(|brand| &header[8..12] == *brand)
            .then_some(ContainerKind::Heic)
    }

    /// Locate the Exif item and return its TIFF bytes
    ///
    /// The item starts with a 4-byte big-endian offset to the TIFF header
    /// (typically 6, skipping `Exif\0\0`); that many bytes are skipped.
    pub fn read_exif<R: Read>(&self, source: R) -> Result<Vec<u8>> {
        let mut walker = OffsetReader::new(BufReader::new(source.take(self.max_scan)));
        let extent = locate_exif(&mut walker)?.ok_or(Error::NoExifItem)?;
        tracing::debug!(
            offset = extent.offset,
            length = extent.length,
            walked = walker.position(),
            "bmff: Exif item located"
        );

        let mut item = walker.into_reader_at(extent.offset)?.take(extent.length);
        let header_offset = item.read_u32::<BigEndian>()? as u64;
        let skipped = io::copy(&mut (&mut item).take(header_offset), &mut io::sink())?;
        if skipped < header_offset {
            return Err(Error::InvalidBox(format!(
                "Exif item TIFF header offset {header_offset} beyond item length {}",
                extent.length
            )));
        }

        let mut raw = Vec::new();
        item.read_to_end(&mut raw)?;
        if (raw.len() as u64) < extent.length.saturating_sub(4 + header_offset) {
            tracing::warn!(
                read = raw.len(),
                expected = extent.length,
                "bmff: Exif item truncated"
            );
        }
        Ok(raw)
    }
}

impl Default for BmffIO {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEIC_SCAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::HeicBuilder;

    const TIFF: &[u8] = b"MM\0*\0\0\0\x08\0\0\0\0\0\0";

    #[test]
    fn test_bmff_detect() {
        // Minimal BMFF ftyp box
        let data = vec![
            0x00, 0x00, 0x00, 0x18, // size = 24
            b'f', b't', b'y', b'p', // type = ftyp
            b'h', b'e', b'i', b'c', // major brand = heic
            0x00, 0x00, 0x00, 0x00, // minor version
        ];
        assert_eq!(BmffIO::detect(&data), Some(ContainerKind::Heic));

        let mut avif = data.clone();
        avif[8..12].copy_from_slice(b"avif");
        assert_eq!(BmffIO::detect(&avif), None);
        assert_eq!(BmffIO::detect(b"\xFF\xD8\xFF\xE1"), None);
    }

    #[test]
    fn test_box_header_sizes() {
        let mut data = 16u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"free12345678");
        let bx = BmffBox::read_header(data.as_slice()).unwrap().unwrap();
        assert_eq!(bx.kind, BoxKind::Other(*b"free"));
        assert_eq!(bx.size, 8);

        let mut large = 1u32.to_be_bytes().to_vec();
        large.extend_from_slice(b"meta");
        large.extend_from_slice(&20u64.to_be_bytes());
        let bx = BmffBox::read_header(large.as_slice()).unwrap().unwrap();
        assert_eq!(bx.kind, BoxKind::Meta);
        assert_eq!(bx.size, 4);

        let mut bad = 4u32.to_be_bytes().to_vec();
        bad.extend_from_slice(b"iloc");
        assert!(matches!(
            BmffBox::read_header(bad.as_slice()),
            Err(Error::InvalidBox(_))
        ));

        assert!(BmffBox::read_header(&b""[..]).unwrap().is_none());
    }

    #[test]
    fn test_box_content_is_bounded() {
        let mut data = 12u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"infe");
        data.extend_from_slice(b"abcdEFGH");
        let mut bx = BmffBox::read_header(data.as_slice()).unwrap().unwrap();
        let mut content = Vec::new();
        bx.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"abcd");
        assert_eq!(bx.content.limit(), 0);
    }

    #[test]
    fn test_read_exif_item() {
        let heic = HeicBuilder::new(TIFF).build();
        let raw = BmffIO::default().read_exif(heic.as_slice()).unwrap();
        assert_eq!(raw, TIFF);
    }

    #[test]
    fn test_read_exif_item_layouts() {
        let variants = [
            HeicBuilder::new(TIFF).iloc_version(1),
            HeicBuilder::new(TIFF).offset_size(8),
            HeicBuilder::new(TIFF).base_offset_size(4),
            HeicBuilder::new(TIFF).base_offset_size(8).iloc_version(1),
            HeicBuilder::new(TIFF).mdat_first(true),
            HeicBuilder::new(TIFF).brand(b"mif1"),
        ];
        for builder in variants {
            let heic = builder.build();
            let raw = BmffIO::default().read_exif(heic.as_slice()).unwrap();
            assert_eq!(raw, TIFF);
        }
    }

    #[test]
    fn test_missing_exif_item() {
        let heic = HeicBuilder::new(TIFF).without_exif_item().build();
        assert!(matches!(
            BmffIO::default().read_exif(heic.as_slice()),
            Err(Error::NoExifItem)
        ));
    }

    #[test]
    fn test_scan_limit() {
        // meta follows mdat, so a tiny scan bound cuts the walk short
        let heic = HeicBuilder::new(TIFF).mdat_first(true).build();
        assert!(BmffIO::new(40).read_exif(heic.as_slice()).is_err());
    }

    #[test]
    fn test_iloc_zero_sizes_rejected() {
        let mut body = vec![0, 0, 0, 0]; // version 0, flags
        body.extend_from_slice(&[0x00, 0x00]); // offset_size 0, length_size 0
        body.extend_from_slice(&0u16.to_be_bytes());
        let mut data = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        data.extend_from_slice(b"iloc");
        data.extend_from_slice(&body);

        let mut bx = BmffBox::read_header(data.as_slice()).unwrap().unwrap();
        assert!(matches!(parse_iloc(&mut bx, 1), Err(Error::InvalidBox(_))));
    }

    #[test]
    fn test_read_variable_int() {
        let data = [0u8, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2, 0];
        let mut r = &data[..];
        assert_eq!(read_variable_int(&mut r, 0).unwrap(), 0);
        assert_eq!(read_variable_int(&mut r, 4).unwrap(), 256);
        assert_eq!(read_variable_int(&mut r, 8).unwrap(), 512);
        assert!(read_variable_int(&mut r, 3).is_err());
    }
}
