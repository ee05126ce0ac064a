//! JPEG Exif extraction
//!
//! Marker segments are scanned forward without seeking. The first APP1
//! segment carrying the `Exif\0\0` signature yields the TIFF bytes; the first
//! COM segment, if any, yields the comment.

use super::ContainerKind;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, BufRead, BufReader, Read};

// JPEG markers
const APP1: u8 = 0xE1; // XMP / EXIF
const COM: u8 = 0xFE; // Comment

const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";

/// A marker segment's payload, length field excluded
#[derive(Debug)]
pub(crate) struct AppSegment {
    pub marker: u8,
    pub data: Vec<u8>,
}

impl AppSegment {
    /// Scan forward to the next non-empty segment whose marker is in `markers`
    ///
    /// Bytes that are not a wanted marker are skipped, so this also steps
    /// over entropy-coded data. `None` means the stream ended before such a
    /// segment started; a segment cut short is an `UnexpectedEof` error.
    pub fn find<R: BufRead>(reader: &mut R, markers: &[u8]) -> io::Result<Option<Self>> {
        loop {
            if !skip_past(reader, 0xFF)? {
                return Ok(None);
            }
            let marker = match reader.read_u8() {
                Ok(marker) => marker,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e),
            };
            if !markers.contains(&marker) {
                continue;
            }
            let len = reader.read_u16::<BigEndian>()? as usize;
            let data_len = len.saturating_sub(2);
            if data_len == 0 {
                continue;
            }
            let mut data = vec![0u8; data_len];
            reader.read_exact(&mut data)?;
            return Ok(Some(Self { marker, data }));
        }
    }

    pub fn is_exif(&self) -> bool {
        self.marker == APP1 && self.data.starts_with(EXIF_SIGNATURE)
    }

    /// TIFF bytes following the Exif signature
    pub fn into_exif_payload(mut self) -> Result<Vec<u8>> {
        if !self.is_exif() {
            return Err(Error::IntroMarkerNotFound);
        }
        self.data.drain(..EXIF_SIGNATURE.len());
        Ok(self.data)
    }

    fn into_comment(self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Consume bytes up to and including the next `byte`; false at end of stream
fn skip_past<R: BufRead>(reader: &mut R, byte: u8) -> io::Result<bool> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(false);
        }
        if let Some(i) = buf.iter().position(|&b| b == byte) {
            reader.consume(i + 1);
            return Ok(true);
        }
        let n = buf.len();
        reader.consume(n);
    }
}

/// TIFF bytes and comment extracted from a JPEG stream
#[derive(Debug)]
pub(crate) struct JpegExif {
    pub tiff: Vec<u8>,
    pub comment: Option<String>,
}

/// Exif extraction from JPEG files
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegIO;

impl JpegIO {
    pub fn new() -> Self {
        Self
    }

    pub fn container_type() -> ContainerKind {
        ContainerKind::Jpeg
    }

    /// Detect if this is a JPEG file from header
    pub fn detect(header: &[u8]) -> Option<ContainerKind> {
        // JPEG magic bytes: FF D8
        header
            .starts_with(&[0xFF, 0xD8])
            .then_some(ContainerKind::Jpeg)
    }

    /// Find the Exif APP1 segment and the first comment
    ///
    /// APP1 segments without the Exif signature (XMP, for instance) are
    /// skipped; if the stream ends after one was seen, the result is
    /// [`Error::IntroMarkerNotFound`]. A segment truncated mid-read is an
    /// [`Error::Io`] either way. A comment that follows the Exif segment
    /// is picked up by continuing the scan; failing to find one is not an
    /// error.
    pub(crate) fn read_exif<R: Read>(&self, source: R) -> Result<JpegExif> {
        let mut reader = BufReader::new(source);
        let mut comment = None;
        let mut saw_app1 = false;

        let tiff = loop {
            let segment = match AppSegment::find(&mut reader, &[APP1, COM])? {
                Some(segment) => segment,
                None if saw_app1 => return Err(Error::IntroMarkerNotFound),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "jpeg: marker not found",
                    )
                    .into())
                }
            };
            if segment.marker == COM {
                if comment.is_none() {
                    comment = Some(segment.into_comment());
                }
                continue;
            }
            saw_app1 = true;
            if segment.is_exif() {
                break segment.into_exif_payload()?;
            }
            tracing::debug!(len = segment.data.len(), "jpeg: skipping non-Exif APP1");
        };

        if comment.is_none() {
            comment = AppSegment::find(&mut reader, &[COM])
                .ok()
                .flatten()
                .map(AppSegment::into_comment);
        }

        Ok(JpegExif { tiff, comment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{wrap_jpeg, wrap_jpeg_raw_app1};

    const TIFF: &[u8] = b"II*\0\x08\0\0\0\0\0\0\0\0\0";

    #[test]
    fn test_detect() {
        assert_eq!(JpegIO::detect(&[0xFF, 0xD8, 0xFF]), Some(ContainerKind::Jpeg));
        assert_eq!(JpegIO::detect(b"II*\0"), None);
    }

    #[test]
    fn test_exif_and_comment() {
        let jpeg = wrap_jpeg(TIFF, Some("a comment"));
        let exif = JpegIO::new().read_exif(jpeg.as_slice()).unwrap();
        assert_eq!(exif.tiff, TIFF);
        assert_eq!(exif.comment.as_deref(), Some("a comment"));

        let jpeg = wrap_jpeg(TIFF, None);
        let exif = JpegIO::new().read_exif(jpeg.as_slice()).unwrap();
        assert_eq!(exif.tiff, TIFF);
        assert_eq!(exif.comment, None);
    }

    #[test]
    fn test_comment_before_app1() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xFE, 0x00, 0x05, b'h', b'e', b'y'];
        jpeg.extend_from_slice(&wrap_jpeg(TIFF, None)[2..]);
        let exif = JpegIO::new().read_exif(jpeg.as_slice()).unwrap();
        assert_eq!(exif.comment.as_deref(), Some("hey"));
        assert_eq!(exif.tiff, TIFF);
    }

    #[test]
    fn test_missing_signature() {
        let jpeg = wrap_jpeg_raw_app1(b"http://ns.adobe.com/xap/1.0/\0<x/>");
        assert!(matches!(
            JpegIO::new().read_exif(jpeg.as_slice()),
            Err(Error::IntroMarkerNotFound)
        ));
    }

    #[test]
    fn test_xmp_before_exif() {
        let mut jpeg = wrap_jpeg_raw_app1(b"http://ns.adobe.com/xap/1.0/\0<x/>");
        jpeg.truncate(jpeg.len() - 2);
        jpeg.extend_from_slice(&wrap_jpeg(TIFF, None)[2..]);
        let exif = JpegIO::new().read_exif(jpeg.as_slice()).unwrap();
        assert_eq!(exif.tiff, TIFF);
    }

    #[test]
    fn test_no_app1() {
        let err = JpegIO::new()
            .read_exif(&[0xFF, 0xD8, 0xFF, 0xD9][..])
            .unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_truncated_segment() {
        let jpeg = wrap_jpeg(TIFF, None);
        let cut = jpeg.windows(6).position(|w| w == EXIF_SIGNATURE).unwrap() + 8;
        assert!(JpegIO::new().read_exif(&jpeg[..cut]).is_err());
    }

    #[test]
    fn test_truncated_exif_after_xmp() {
        let mut jpeg = wrap_jpeg_raw_app1(b"http://ns.adobe.com/xap/1.0/\0<x/>");
        jpeg.truncate(jpeg.len() - 2);
        jpeg.extend_from_slice(&wrap_jpeg(TIFF, None)[2..]);
        let signature = jpeg.windows(6).position(|w| w == EXIF_SIGNATURE).unwrap();

        // cut inside the payload, then inside the length field
        for cut in [signature + 8, signature - 1] {
            let err = JpegIO::new().read_exif(&jpeg[..cut]).unwrap_err();
            assert!(
                matches!(&err, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof),
                "cut at {cut}: {err:?}"
            );
        }

        // the stream ends cleanly after the XMP segment
        let xmp = wrap_jpeg_raw_app1(b"http://ns.adobe.com/xap/1.0/\0<x/>");
        assert!(matches!(
            JpegIO::new().read_exif(&xmp[..xmp.len() - 2]),
            Err(Error::IntroMarkerNotFound)
        ));
    }
}
