//! Error types for exif-io

use crate::{fields::FieldName, tiff::TiffError, Exif};
use std::{collections::HashMap, fmt, io};

/// Result type for exif-io operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sub-IFDs reached through pointer tags in the primary directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubIfd {
    Exif,
    Gps,
    Interoperability,
}

impl SubIfd {
    /// Description of the resolution stage, used as the message prefix
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Exif => "loading EXIF sub-IFD",
            Self::Gps => "loading GPS sub-IFD",
            Self::Interoperability => "loading Interoperability sub-IFD",
        }
    }
}

impl fmt::Display for SubIfd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage())
    }
}

/// Which sub-IFDs failed to resolve, and why
///
/// The primary directory decoded; the document stays queryable for every
/// tag that did load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialFailure {
    errors: HashMap<SubIfd, String>,
}

impl PartialFailure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure; a later failure for the same sub-IFD replaces it
    pub fn insert(&mut self, kind: SubIfd, message: impl Into<String>) {
        self.errors.insert(kind, message.into());
    }

    /// Fold another record into this one
    pub fn merge(&mut self, other: PartialFailure) {
        self.errors.extend(other.errors);
    }

    pub fn get(&self, kind: SubIfd) -> Option<&str> {
        self.errors.get(&kind).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Failed sub-IFDs, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (SubIfd, &str)> {
        self.errors.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn is_exif_error(&self) -> bool {
        self.errors.contains_key(&SubIfd::Exif)
    }

    pub fn is_gps_error(&self) -> bool {
        self.errors.contains_key(&SubIfd::Gps)
    }

    pub fn is_interoperability_error(&self) -> bool {
        self.errors.contains_key(&SubIfd::Interoperability)
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.errors.keys().collect();
        kinds.sort();
        let lines: Vec<String> = kinds
            .into_iter()
            .map(|k| format!("{}: {}", k.stage(), self.errors[k]))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

/// A usable document together with the sub-IFDs that failed
#[derive(Debug)]
pub struct PartialResult {
    exif: Box<Exif>,
    failures: PartialFailure,
}

impl PartialResult {
    pub(crate) fn new(exif: Exif, failures: PartialFailure) -> Self {
        Self {
            exif: Box::new(exif),
            failures,
        }
    }

    pub fn exif(&self) -> &Exif {
        &self.exif
    }

    pub fn failures(&self) -> &PartialFailure {
        &self.failures
    }

    pub fn into_inner(self) -> (Exif, PartialFailure) {
        (*self.exif, self.failures)
    }
}

impl fmt::Display for PartialResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.failures.fmt(f)
    }
}

/// Errors that can occur while decoding or querying EXIF data
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The JPEG APP1 segment does not start with `Exif\0\0`
    #[error("exif: failed to find exif intro marker")]
    IntroMarkerNotFound,

    /// A HEIC container carries no locatable Exif item
    #[error("exif: could not find exif item in heic file")]
    NoExifItem,

    /// Malformed box in a HEIC container
    #[error("exif: invalid box: {0}")]
    InvalidBox(String),

    /// TIFF structure could not be decoded
    #[error(transparent)]
    Tiff(#[from] TiffError),

    /// The TIFF stream held no directories
    #[error("exif: invalid exif data (no directories)")]
    InvalidExif,

    /// TIFF data could not be found or decoded; nothing usable was produced
    #[error("exif: decode failed ({0})")]
    Decode(#[source] Box<Error>),

    /// One or more sub-IFDs failed; the document is still usable
    #[error("{0}")]
    Partial(PartialResult),

    /// The requested field was not loaded
    #[error("exif: tag \"{0}\" is not present")]
    TagNotPresent(FieldName),

    /// A field is present but its value cannot be interpreted
    #[error("exif: malformed value: {0}")]
    Malformed(String),
}

impl Error {
    pub(crate) fn decode(cause: impl Into<Error>) -> Self {
        Self::Decode(Box::new(cause.into()))
    }

    pub(crate) fn malformed(cause: impl fmt::Display) -> Self {
        Self::Malformed(cause.to_string())
    }

    /// Whether the document is unusable
    ///
    /// Only a partial sub-IFD failure leaves a document behind.
    pub fn is_critical(&self) -> bool {
        !matches!(self, Self::Partial(_))
    }

    /// Whether this reports a field that simply is not there
    pub fn is_tag_not_present(&self) -> bool {
        matches!(self, Self::TagNotPresent(_))
    }

    /// Whether decoding failed because a tag value ran past the end of the data
    pub fn is_short_read_tag_value(&self) -> bool {
        match self {
            Self::Decode(cause) => cause.is_short_read_tag_value(),
            Self::Tiff(TiffError::ShortReadTagValue) => true,
            _ => false,
        }
    }

    /// Recover the document from a partial result; any other error is returned as is
    pub fn into_partial(self) -> std::result::Result<PartialResult, Error> {
        match self {
            Self::Partial(partial) => Ok(partial),
            other => Err(other),
        }
    }

    /// The sub-IFD failures, if this is a partial result
    pub fn partial_failure(&self) -> Option<&PartialFailure> {
        match self {
            Self::Partial(partial) => Some(partial.failures()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_display() {
        let mut failures = PartialFailure::new();
        failures.insert(SubIfd::Gps, "bad offset");
        failures.insert(SubIfd::Exif, "truncated");

        assert_eq!(
            failures.to_string(),
            "loading EXIF sub-IFD: truncated\nloading GPS sub-IFD: bad offset"
        );
        assert!(failures.is_gps_error());
        assert!(failures.is_exif_error());
        assert!(!failures.is_interoperability_error());
        assert_eq!(failures.get(SubIfd::Gps), Some("bad offset"));
    }

    #[test]
    fn test_classification() {
        let err = Error::decode(TiffError::ShortReadTagValue);
        assert!(err.is_critical());
        assert!(err.is_short_read_tag_value());
        assert!(!err.is_tag_not_present());

        let err = Error::TagNotPresent(crate::fields::FLASH);
        assert!(err.is_tag_not_present());
        assert_eq!(err.to_string(), "exif: tag \"Flash\" is not present");

        let err = Error::decode(Error::IntroMarkerNotFound);
        assert_eq!(
            err.to_string(),
            "exif: decode failed (exif: failed to find exif intro marker)"
        );
    }
}
