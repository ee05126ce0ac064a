//! The Exif document, the sub-IFD resolver and the decoder that ties
//! framing, TIFF decoding and resolution together

use crate::{
    containers::{self, ContainerKind, Payload, DEFAULT_MAX_HEIC_SCAN},
    cursor::OffsetReader,
    error::{Error, PartialFailure, PartialResult, Result, SubIfd},
    fields::{
        FieldName, FieldTable, EXIF_FIELDS, EXIF_IFD_POINTER, GPS_FIELDS, GPS_INFO_IFD_POINTER,
        INTEROPERABILITY_IFD_POINTER, INTEROP_FIELDS, THUMBNAIL_FIELDS,
    },
    tiff::{self, Directory, Tag, Tiff},
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::{
    collections::HashMap,
    fmt,
    io::{Cursor, Read, Seek, SeekFrom},
};

/// Named fields in the order they were first loaded
#[derive(Debug, Clone, Default)]
struct FieldMap {
    entries: Vec<(FieldName, Tag)>,
    index: HashMap<FieldName, usize>,
}

impl FieldMap {
    /// A repeated name replaces the earlier value but keeps its position
    fn insert(&mut self, name: FieldName, tag: Tag) {
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1 = tag,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, tag));
            }
        }
    }

    fn get(&self, name: &str) -> Option<&Tag> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }
}

/// Decoded Exif metadata
///
/// Holds the decoded TIFF structure, the raw TIFF bytes that offset-valued
/// fields index into, and every field resolved so far, keyed by name.
#[derive(Debug, Clone)]
pub struct Exif {
    tiff: Tiff,
    raw: Vec<u8>,
    comment: Option<String>,
    container: ContainerKind,
    fields: FieldMap,
}

impl Exif {
    /// A document with no fields loaded yet
    pub fn new(tiff: Tiff, raw: Vec<u8>) -> Self {
        Self {
            tiff,
            raw,
            comment: None,
            container: ContainerKind::Tiff,
            fields: FieldMap::default(),
        }
    }

    /// Name and store every tag of `dir` that `table` knows
    ///
    /// With `show_unknown`, tags missing from the table are stored as
    /// `UnknownTag_<hex id>` instead of being dropped.
    pub fn load_tags(&mut self, dir: &Directory, table: &FieldTable, show_unknown: bool) {
        for tag in &dir.tags {
            let name = match table.get(tag.id) {
                Some(name) => name.clone(),
                None if show_unknown => FieldName::unknown(tag.id),
                None => continue,
            };
            self.fields.insert(name, tag.clone());
        }
    }

    /// Store a single field, replacing any earlier value of the same name
    pub fn insert(&mut self, name: FieldName, tag: Tag) {
        self.fields.insert(name, tag);
    }

    /// Look up a field by name
    pub fn get(&self, name: impl AsRef<str>) -> Result<&Tag> {
        let name = name.as_ref();
        self.fields
            .get(name)
            .ok_or_else(|| Error::TagNotPresent(FieldName::new(name)))
    }

    /// Visit every field in load order, stopping at the first error
    pub fn walk<W: Walker + ?Sized>(&self, walker: &mut W) -> Result<()> {
        for (name, tag) in &self.fields.entries {
            walker.walk(name, tag)?;
        }
        Ok(())
    }

    /// Fields in load order
    pub fn fields(&self) -> impl Iterator<Item = (&FieldName, &Tag)> {
        self.fields.entries.iter().map(|(name, tag)| (name, tag))
    }

    pub fn len(&self) -> usize {
        self.fields.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.entries.is_empty()
    }

    /// Raw TIFF bytes; offsets in tag values are relative to the first byte
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn tiff(&self) -> &Tiff {
        &self.tiff
    }

    /// Text of the first JPEG COM segment, if there was one
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn container(&self) -> ContainerKind {
        self.container
    }

    /// Fields as a JSON object, in load order
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Exif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, tag) in self.fields() {
            writeln!(f, "{name}: {tag}")?;
        }
        Ok(())
    }
}

impl Serialize for Exif {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, tag) in self.fields() {
            map.serialize_entry(name, tag)?;
        }
        map.end()
    }
}

/// Visitor for [`Exif::walk`]
///
/// Implemented for closures taking `(&FieldName, &Tag)`.
pub trait Walker {
    fn walk(&mut self, name: &FieldName, tag: &Tag) -> Result<()>;
}

impl<F> Walker for F
where
    F: FnMut(&FieldName, &Tag) -> Result<()>,
{
    fn walk(&mut self, name: &FieldName, tag: &Tag) -> Result<()> {
        self(name, tag)
    }
}

/// Resolves additional fields into a freshly decoded document
///
/// Returning `Err` aborts decoding. Failures that leave the document usable
/// are reported through the returned [`PartialFailure`] instead.
pub trait Parser: Send + Sync {
    fn parse(&self, exif: &mut Exif) -> Result<PartialFailure>;
}

/// Loads the primary and thumbnail IFDs, then the EXIF, GPS and
/// Interoperability sub-IFDs their pointer tags refer to
#[derive(Debug, Clone, Copy, Default)]
pub struct SubIfdParser {
    show_unknown: bool,
}

impl SubIfdParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep tags missing from the field tables under `UnknownTag_` names
    pub fn show_unknown(mut self, show: bool) -> Self {
        self.show_unknown = show;
        self
    }

    fn load_sub_dir(
        &self,
        exif: &mut Exif,
        pointer: &FieldName,
        table: &FieldTable,
    ) -> std::result::Result<(), String> {
        // an absent or non-integer pointer means there is nothing to load
        let offset = match exif.get(pointer).map(|tag| tag.int(0)) {
            Ok(Ok(offset)) => offset,
            _ => return Ok(()),
        };
        let offset = u64::try_from(offset)
            .map_err(|_| format!("exif: seek to sub-IFD {pointer} failed: negative offset {offset}"))?;

        let mut reader = Cursor::new(exif.raw.as_slice());
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| format!("exif: seek to sub-IFD {pointer} failed: {e}"))?;
        let (dir, _) = tiff::decode_dir(&mut reader, exif.tiff.order)
            .map_err(|e| format!("exif: sub-IFD {pointer} decode failed: {e}"))?;

        exif.load_tags(&dir, table, self.show_unknown);
        Ok(())
    }
}

impl Parser for SubIfdParser {
    fn parse(&self, exif: &mut Exif) -> Result<PartialFailure> {
        let Some(primary) = exif.tiff.dirs.first().cloned() else {
            return Err(Error::InvalidExif);
        };
        exif.load_tags(&primary, &EXIF_FIELDS, self.show_unknown);
        if let Some(thumbnail) = exif.tiff.dirs.get(1).cloned() {
            exif.load_tags(&thumbnail, &THUMBNAIL_FIELDS, false);
        }

        // EXIF first: the Interoperability pointer usually lives in the EXIF sub-IFD
        let mut failures = PartialFailure::new();
        for (kind, pointer, table) in [
            (SubIfd::Exif, EXIF_IFD_POINTER, &EXIF_FIELDS),
            (SubIfd::Gps, GPS_INFO_IFD_POINTER, &GPS_FIELDS),
            (SubIfd::Interoperability, INTEROPERABILITY_IFD_POINTER, &INTEROP_FIELDS),
        ] {
            if let Err(message) = self.load_sub_dir(exif, &pointer, table) {
                tracing::debug!(%kind, %message, "exif: sub-IFD failed");
                failures.insert(kind, message);
            }
        }
        Ok(failures)
    }
}

/// Configurable Exif decoder
///
/// # Example
///
/// ```
/// use exif_io::{test_utils::*, ByteOrder, Decoder};
///
/// let tiff = TiffBuilder::new(ByteOrder::LittleEndian)
///     .ifd(vec![Entry::ascii(0x010F, "Canon"), Entry::short(0xC4A5, &[1])])
///     .build();
///
/// let exif = Decoder::new().show_unknown(true).decode(tiff.as_slice())?;
/// assert_eq!(exif.get("Make")?.string_val()?, "Canon");
/// assert!(exif.get("UnknownTag_c4a5").is_ok());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Decoder {
    show_unknown: bool,
    max_heic_scan: u64,
    sub_ifds: bool,
    parsers: Vec<Box<dyn Parser>>,
}

impl Decoder {
    /// A decoder that resolves the standard sub-IFDs
    pub fn new() -> Self {
        Self {
            show_unknown: false,
            max_heic_scan: DEFAULT_MAX_HEIC_SCAN,
            sub_ifds: true,
            parsers: Vec::new(),
        }
    }

    /// A decoder with no built-in resolution; only added parsers run
    pub fn bare() -> Self {
        Self {
            sub_ifds: false,
            ..Self::new()
        }
    }

    /// Keep tags missing from the field tables under `UnknownTag_` names
    pub fn show_unknown(mut self, show: bool) -> Self {
        self.show_unknown = show;
        self
    }

    /// Bound on how many bytes of a HEIC file are scanned for the Exif item
    pub fn max_heic_scan(mut self, bytes: u64) -> Self {
        self.max_heic_scan = bytes;
        self
    }

    /// Run `parser` after the built-in resolution, in the order added
    pub fn with_parser(mut self, parser: Box<dyn Parser>) -> Self {
        self.parsers.push(parser);
        self
    }

    /// Decode Exif metadata from a TIFF, JPEG or HEIC stream
    ///
    /// The stream is read forward only. Sub-IFD failures yield
    /// [`Error::Partial`], which still carries the document.
    pub fn decode<R: Read>(&self, reader: R) -> Result<Exif> {
        let framed = containers::frame(reader, self.max_heic_scan).map_err(Error::decode)?;

        let (tiff, raw) = match framed.payload {
            Payload::Stream(stream) => {
                let mut tee = OffsetReader::new(stream);
                let tiff = tiff::decode(&mut tee).map_err(Error::decode)?;
                (tiff, tee.into_seen())
            }
            Payload::Bytes(raw) => (tiff::decode(raw.as_slice()).map_err(Error::decode)?, raw),
        };
        tracing::debug!(
            container = %framed.kind,
            ifds = tiff.dirs.len(),
            bytes = raw.len(),
            "exif: decoded TIFF"
        );

        let mut exif = Exif {
            tiff,
            raw,
            comment: framed.comment,
            container: framed.kind,
            fields: FieldMap::default(),
        };

        let builtin = self
            .sub_ifds
            .then(|| SubIfdParser::new().show_unknown(self.show_unknown));
        let mut parsers: Vec<&dyn Parser> = Vec::with_capacity(self.parsers.len() + 1);
        if let Some(builtin) = &builtin {
            parsers.push(builtin);
        }
        for parser in &self.parsers {
            parsers.push(parser.as_ref());
        }

        let mut failures = PartialFailure::new();
        for (index, parser) in parsers.into_iter().enumerate() {
            match parser.parse(&mut exif) {
                Ok(partial) => failures.merge(partial),
                Err(e) => {
                    tracing::debug!(index, error = %e, "exif: parser failed");
                    return Err(e);
                }
            }
        }

        if failures.is_empty() {
            Ok(exif)
        } else {
            tracing::warn!(%failures, "exif: partial decode");
            Err(Error::Partial(PartialResult::new(exif, failures)))
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("show_unknown", &self.show_unknown)
            .field("max_heic_scan", &self.max_heic_scan)
            .field("sub_ifds", &self.sub_ifds)
            .field("parsers", &self.parsers.len())
            .finish()
    }
}
