//! Streaming Exif extraction from TIFF, JPEG and HEIC files.
//!
//! This crate finds the TIFF-structured Exif payload inside a container,
//! decodes its directories, and resolves tags into named fields, following
//! the pointers to the EXIF, GPS and Interoperability sub-IFDs.
//!
//! # Design Principles
//!
//! - **Streaming**: Input is read forward only; no `Seek` bound
//! - **Bounded**: HEIC scans stop after a configurable number of bytes
//! - **Partial results**: A broken sub-IFD does not cost you the rest of the
//!   metadata; see [`Error::Partial`]
//! - **Container agnostic**: One call for TIFF, JPEG and HEIC
//!
//! # Quick Start
//!
//! ```no_run
//! use std::fs::File;
//!
//! # fn main() -> exif_io::Result<()> {
//! let exif = match exif_io::decode(File::open("image.jpg")?) {
//!     Ok(exif) => exif,
//!     // sub-IFD failures still yield a usable document
//!     Err(e) => {
//!         let (exif, failures) = e.into_partial()?.into_inner();
//!         eprintln!("{failures}");
//!         exif
//!     }
//! };
//!
//! if let Ok(make) = exif.get("Make") {
//!     println!("Make: {make}");
//! }
//! if let Ok((lat, long)) = exif.lat_long() {
//!     println!("Taken at {lat}, {long}");
//! }
//! println!("{}", exif.to_json().unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! [`Decoder`] controls unknown-tag handling, the HEIC scan bound, and
//! additional [`Parser`]s run after the built-in sub-IFD resolution:
//!
//! ```
//! use exif_io::{test_utils::*, ByteOrder, Decoder};
//!
//! let tiff = TiffBuilder::new(ByteOrder::BigEndian)
//!     .ifd(vec![Entry::ascii(0x010F, "Canon"), Entry::sub_ifd(0x8769, 0)])
//!     .sub_ifd(vec![Entry::short(0x9209, &[0x19])])
//!     .build();
//! let jpeg = wrap_jpeg(&tiff, Some("holiday"));
//!
//! let exif = Decoder::new()
//!     .max_heic_scan(1024 * 1024)
//!     .decode(jpeg.as_slice())?;
//! assert_eq!(exif.flash()?, "Auto, Fired");
//! assert_eq!(exif.comment(), Some("holiday"));
//! # Ok::<(), exif_io::Error>(())
//! ```

mod containers;
mod cursor;
mod error;
mod exif;
pub mod fields;
mod interpret;
pub mod thumbnail;
pub mod tiff;

pub use containers::{BmffIO, ContainerKind, JpegIO, DEFAULT_MAX_HEIC_SCAN};
pub use cursor::OffsetReader;
pub use error::{Error, PartialFailure, PartialResult, Result, SubIfd};
pub use exif::{Decoder, Exif, Parser, SubIfdParser, Walker};
pub use fields::{FieldName, FieldTable};
pub use thumbnail::{EmbeddedImage, EmbeddedThumbnail, ThumbnailFormat};
pub use tiff::{ByteOrder, Tag};

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::io::Read;

/// Decode Exif metadata with the default [`Decoder`]
pub fn decode<R: Read>(reader: R) -> Result<Exif> {
    Decoder::default().decode(reader)
}
