//! Container framing
//!
//! Each container format (TIFF, JPEG, HEIC) wraps the same TIFF-structured
//! Exif payload differently. Framing sniffs the first bytes of the stream,
//! replays them, and hands back the payload: raw TIFF streams are passed on
//! unread, while JPEG and HEIC payloads are extracted into memory.

mod bmff_io;
mod jpeg_io;

pub use bmff_io::{BmffIO, DEFAULT_MAX_HEIC_SCAN};
pub use jpeg_io::JpegIO;

use crate::error::Result;
use serde::Serialize;
use std::{
    fmt,
    io::{Chain, Cursor, Read},
};

/// Bytes sniffed to pick a container
const HEADER_LEN: usize = 16;

/// Container format the Exif payload was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Bare TIFF stream (also raw formats built on TIFF)
    Tiff,

    /// JPEG container (JFIF/Exif structure)
    Jpeg,

    /// HEIC/HEIF (ISO Base Media File Format)
    Heic,
}

impl ContainerKind {
    /// Classify a stream from its first bytes
    ///
    /// Anything that is neither a TIFF header nor a HEIC `ftyp` is treated as
    /// JPEG, so an unrecognized stream fails during the marker scan.
    pub fn detect(header: &[u8]) -> ContainerKind {
        if header.starts_with(b"II*\0") || header.starts_with(b"MM\0*") {
            ContainerKind::Tiff
        } else if let Some(kind) = BmffIO::detect(header) {
            kind
        } else {
            JpegIO::detect(header).unwrap_or(ContainerKind::Jpeg)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiff => "tiff",
            Self::Jpeg => "jpeg",
            Self::Heic => "heic",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the TIFF bytes come from once the container is unwrapped
pub(crate) enum Payload<R> {
    /// The stream itself is TIFF; decode it while recording it
    Stream(R),
    /// TIFF bytes extracted from a JPEG segment or HEIC item
    Bytes(Vec<u8>),
}

pub(crate) struct Framed<R> {
    pub kind: ContainerKind,
    pub comment: Option<String>,
    pub payload: Payload<R>,
}

/// Sniff the container and unwrap its Exif payload
pub(crate) fn frame<R: Read>(
    mut source: R,
    max_heic_scan: u64,
) -> Result<Framed<Chain<Cursor<Vec<u8>>, R>>> {
    let mut header = vec![0u8; HEADER_LEN];
    source.read_exact(&mut header)?;
    let kind = ContainerKind::detect(&header);
    tracing::debug!(%kind, "exif: detected container");

    let stream = Cursor::new(header).chain(source);
    match kind {
        ContainerKind::Tiff => Ok(Framed {
            kind,
            comment: None,
            payload: Payload::Stream(stream),
        }),
        ContainerKind::Heic => {
            let tiff = BmffIO::new(max_heic_scan).read_exif(stream)?;
            Ok(Framed {
                kind,
                comment: None,
                payload: Payload::Bytes(tiff),
            })
        }
        ContainerKind::Jpeg => {
            let exif = JpegIO::new().read_exif(stream)?;
            Ok(Framed {
                kind,
                comment: exif.comment,
                payload: Payload::Bytes(exif.tiff),
            })
        }
    }
}
