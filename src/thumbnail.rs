//! Embedded image extraction
//!
//! Many files carry pre-rendered images next to the main one, located by an
//! offset/length field pair into the raw TIFF bytes:
//! - JPEG/TIFF: the Exif thumbnail in the second IFD (typically 160x120)
//! - raw formats: a preview strip and a full-size JPEG in the primary IFD
//!
//! The bytes are returned as stored; nothing is decoded.

use crate::{
    error::{Error, Result},
    fields::{
        FieldName, JPEG_FROM_RAW_LENGTH, JPEG_FROM_RAW_START, PREVIEW_IMAGE_LENGTH,
        PREVIEW_IMAGE_START, THUMB_JPEG_INTERCHANGE_FORMAT, THUMB_JPEG_INTERCHANGE_FORMAT_LENGTH,
    },
    Exif,
};

/// Which embedded image to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddedImage {
    /// Exif thumbnail from the thumbnail IFD
    Thumbnail,
    /// Preview image of raw files
    Preview,
    /// Full-size JPEG of raw files
    JpegFromRaw,
}

impl EmbeddedImage {
    /// Offset and length fields locating this image
    pub fn fields(&self) -> (FieldName, FieldName) {
        match self {
            Self::Thumbnail => (THUMB_JPEG_INTERCHANGE_FORMAT, THUMB_JPEG_INTERCHANGE_FORMAT_LENGTH),
            Self::Preview => (PREVIEW_IMAGE_START, PREVIEW_IMAGE_LENGTH),
            Self::JpegFromRaw => (JPEG_FROM_RAW_START, JPEG_FROM_RAW_LENGTH),
        }
    }
}

/// Format of an embedded image, sniffed from its first bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    /// JPEG thumbnail
    Jpeg,
    /// PNG thumbnail
    Png,
    /// Uncompressed TIFF strip
    Tiff,
    /// Other/unknown format
    Other,
}

impl ThumbnailFormat {
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(&[0xFF, 0xD8]) {
            Self::Jpeg
        } else if data.starts_with(b"\x89PNG") {
            Self::Png
        } else if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
            Self::Tiff
        } else {
            Self::Other
        }
    }
}

/// An embedded image borrowed from a document's raw bytes
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedThumbnail<'a> {
    pub kind: EmbeddedImage,
    pub format: ThumbnailFormat,
    pub data: &'a [u8],
}

impl Exif {
    /// Bytes of an embedded image
    ///
    /// Fails with a not-present error if either locating field is missing,
    /// and with a malformed-value error if the range does not fit inside
    /// the raw TIFF bytes.
    pub fn embedded_image(&self, kind: EmbeddedImage) -> Result<&[u8]> {
        let (start_field, length_field) = kind.fields();
        let start = self.get(&start_field)?.int(0).map_err(Error::malformed)?;
        let length = self.get(&length_field)?.int(0).map_err(Error::malformed)?;

        let (Ok(start), Ok(length)) = (usize::try_from(start), usize::try_from(length)) else {
            return Err(Error::Malformed(format!(
                "{start_field}/{length_field} negative: {start}/{length}"
            )));
        };
        start
            .checked_add(length)
            .and_then(|end| self.raw().get(start..end))
            .ok_or_else(|| {
                Error::Malformed(format!(
                    "{kind:?} range {start}+{length} outside {} raw bytes",
                    self.raw().len()
                ))
            })
    }

    /// Embedded image together with its sniffed format
    pub fn embedded_thumbnail(&self, kind: EmbeddedImage) -> Result<EmbeddedThumbnail<'_>> {
        let data = self.embedded_image(kind)?;
        Ok(EmbeddedThumbnail {
            kind,
            format: ThumbnailFormat::detect(data),
            data,
        })
    }

    /// Exif thumbnail, usually a small JPEG
    pub fn jpeg_thumbnail(&self) -> Result<&[u8]> {
        self.embedded_image(EmbeddedImage::Thumbnail)
    }

    pub fn preview_image(&self) -> Result<&[u8]> {
        self.embedded_image(EmbeddedImage::Preview)
    }

    pub fn jpeg_from_raw(&self) -> Result<&[u8]> {
        self.embedded_image(EmbeddedImage::JpegFromRaw)
    }
}
