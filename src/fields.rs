//! Field names and the tag tables that map IFD tag ids to them
//!
//! Each IFD kind (primary/EXIF, GPS, Interoperability, thumbnail) has its own
//! table. Unmapped ids are either dropped or, when unknown fields are shown,
//! named [`UNKNOWN_PREFIX`] followed by the id in hex.

use serde::{Serialize, Serializer};
use std::{borrow::Borrow, borrow::Cow, fmt};

/// Prefix given to fields whose tag id is not in the table
pub const UNKNOWN_PREFIX: &str = "UnknownTag_";

/// Name a tag is exposed under in an [`crate::Exif`] document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldName(Cow<'static, str>);

impl FieldName {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Name for a tag id missing from every table, e.g. `UnknownTag_c4a5`
    pub fn unknown(id: u16) -> Self {
        Self::new(format!("{UNKNOWN_PREFIX}{id:x}"))
    }

    pub fn is_unknown(&self) -> bool {
        self.0.starts_with(UNKNOWN_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FieldName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for FieldName {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for FieldName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Serialize for FieldName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Tag id to field name mapping for one kind of IFD
#[derive(Debug, Clone, Copy)]
pub struct FieldTable {
    entries: &'static [(u16, FieldName)],
}

impl FieldTable {
    pub fn get(&self, id: u16) -> Option<&'static FieldName> {
        self.entries
            .iter()
            .find(|(tag, _)| *tag == id)
            .map(|(_, name)| name)
    }

    /// Tag id a field is stored under, if this table names it
    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.entries
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &'static FieldName)> {
        self.entries.iter().map(|(id, name)| (*id, name))
    }
}

macro_rules! fields {
    ($($(#[$meta:meta])* $ident:ident = $name:literal;)*) => {
        $(
            $(#[$meta])*
            pub const $ident: FieldName = FieldName::from_static($name);
        )*
    };
}

// Primary IFD (TIFF baseline)
fields! {
    IMAGE_WIDTH = "ImageWidth";
    IMAGE_LENGTH = "ImageLength";
    BITS_PER_SAMPLE = "BitsPerSample";
    COMPRESSION = "Compression";
    PHOTOMETRIC_INTERPRETATION = "PhotometricInterpretation";
    IMAGE_DESCRIPTION = "ImageDescription";
    MAKE = "Make";
    MODEL = "Model";
    ORIENTATION = "Orientation";
    SAMPLES_PER_PIXEL = "SamplesPerPixel";
    X_RESOLUTION = "XResolution";
    Y_RESOLUTION = "YResolution";
    PLANAR_CONFIGURATION = "PlanarConfiguration";
    RESOLUTION_UNIT = "ResolutionUnit";
    SOFTWARE = "Software";
    DATE_TIME = "DateTime";
    ARTIST = "Artist";
    Y_CB_CR_SUB_SAMPLING = "YCbCrSubSampling";
    Y_CB_CR_POSITIONING = "YCbCrPositioning";
    COPYRIGHT = "Copyright";
    /// Strip offset of the full-size preview in raw files
    PREVIEW_IMAGE_START = "PreviewImageStart";
    PREVIEW_IMAGE_LENGTH = "PreviewImageLength";
    /// Embedded JPEG in raw files, stored in the primary IFD
    JPEG_FROM_RAW_START = "JpegFromRawStart";
    JPEG_FROM_RAW_LENGTH = "JpegFromRawLength";
}

// Sub-IFD pointers
fields! {
    EXIF_IFD_POINTER = "ExifIFDPointer";
    GPS_INFO_IFD_POINTER = "GPSInfoIFDPointer";
    INTEROPERABILITY_IFD_POINTER = "InteroperabilityIFDPointer";
}

// EXIF sub-IFD
fields! {
    EXPOSURE_TIME = "ExposureTime";
    F_NUMBER = "FNumber";
    EXPOSURE_PROGRAM = "ExposureProgram";
    SPECTRAL_SENSITIVITY = "SpectralSensitivity";
    ISO_SPEED_RATINGS = "ISOSpeedRatings";
    OECF = "OECF";
    TIME_ZONE_OFFSET = "TimeZoneOffset";
    EXIF_VERSION = "ExifVersion";
    DATE_TIME_ORIGINAL = "DateTimeOriginal";
    DATE_TIME_DIGITIZED = "DateTimeDigitized";
    OFFSET_TIME = "OffsetTime";
    OFFSET_TIME_ORIGINAL = "OffsetTimeOriginal";
    OFFSET_TIME_DIGITIZED = "OffsetTimeDigitized";
    COMPONENTS_CONFIGURATION = "ComponentsConfiguration";
    COMPRESSED_BITS_PER_PIXEL = "CompressedBitsPerPixel";
    SHUTTER_SPEED_VALUE = "ShutterSpeedValue";
    APERTURE_VALUE = "ApertureValue";
    BRIGHTNESS_VALUE = "BrightnessValue";
    EXPOSURE_BIAS_VALUE = "ExposureBiasValue";
    MAX_APERTURE_VALUE = "MaxApertureValue";
    SUBJECT_DISTANCE = "SubjectDistance";
    METERING_MODE = "MeteringMode";
    LIGHT_SOURCE = "LightSource";
    FLASH = "Flash";
    FOCAL_LENGTH = "FocalLength";
    SUBJECT_AREA = "SubjectArea";
    MAKER_NOTE = "MakerNote";
    USER_COMMENT = "UserComment";
    SUB_SEC_TIME = "SubSecTime";
    SUB_SEC_TIME_ORIGINAL = "SubSecTimeOriginal";
    SUB_SEC_TIME_DIGITIZED = "SubSecTimeDigitized";
    FLASHPIX_VERSION = "FlashpixVersion";
    COLOR_SPACE = "ColorSpace";
    PIXEL_X_DIMENSION = "PixelXDimension";
    PIXEL_Y_DIMENSION = "PixelYDimension";
    RELATED_SOUND_FILE = "RelatedSoundFile";
    FLASH_ENERGY = "FlashEnergy";
    SPATIAL_FREQUENCY_RESPONSE = "SpatialFrequencyResponse";
    FOCAL_PLANE_X_RESOLUTION = "FocalPlaneXResolution";
    FOCAL_PLANE_Y_RESOLUTION = "FocalPlaneYResolution";
    FOCAL_PLANE_RESOLUTION_UNIT = "FocalPlaneResolutionUnit";
    SUBJECT_LOCATION = "SubjectLocation";
    EXPOSURE_INDEX = "ExposureIndex";
    SENSING_METHOD = "SensingMethod";
    FILE_SOURCE = "FileSource";
    SCENE_TYPE = "SceneType";
    CFA_PATTERN = "CFAPattern";
    CUSTOM_RENDERED = "CustomRendered";
    EXPOSURE_MODE = "ExposureMode";
    WHITE_BALANCE = "WhiteBalance";
    DIGITAL_ZOOM_RATIO = "DigitalZoomRatio";
    FOCAL_LENGTH_IN_35MM_FILM = "FocalLengthIn35mmFilm";
    SCENE_CAPTURE_TYPE = "SceneCaptureType";
    GAIN_CONTROL = "GainControl";
    CONTRAST = "Contrast";
    SATURATION = "Saturation";
    SHARPNESS = "Sharpness";
    DEVICE_SETTING_DESCRIPTION = "DeviceSettingDescription";
    SUBJECT_DISTANCE_RANGE = "SubjectDistanceRange";
    IMAGE_UNIQUE_ID = "ImageUniqueID";
    LENS_MAKE = "LensMake";
    LENS_MODEL = "LensModel";
}

// Maker-specific fields surfaced by parsers outside the standard tables
fields! {
    /// Canon time info; element 1 is the time zone offset in minutes
    CANON_TIME_INFO = "Canon.TimeInfo";
}

// GPS sub-IFD
fields! {
    GPS_VERSION_ID = "GPSVersionID";
    GPS_LATITUDE_REF = "GPSLatitudeRef";
    GPS_LATITUDE = "GPSLatitude";
    GPS_LONGITUDE_REF = "GPSLongitudeRef";
    GPS_LONGITUDE = "GPSLongitude";
    GPS_ALTITUDE_REF = "GPSAltitudeRef";
    GPS_ALTITUDE = "GPSAltitude";
    GPS_TIME_STAMP = "GPSTimeStamp";
    GPS_SATELLITES = "GPSSatelites";
    GPS_STATUS = "GPSStatus";
    GPS_MEASURE_MODE = "GPSMeasureMode";
    GPS_DOP = "GPSDOP";
    GPS_SPEED_REF = "GPSSpeedRef";
    GPS_SPEED = "GPSSpeed";
    GPS_TRACK_REF = "GPSTrackRef";
    GPS_TRACK = "GPSTrack";
    GPS_IMG_DIRECTION_REF = "GPSImgDirectionRef";
    GPS_IMG_DIRECTION = "GPSImgDirection";
    GPS_MAP_DATUM = "GPSMapDatum";
    GPS_DEST_LATITUDE_REF = "GPSDestLatitudeRef";
    GPS_DEST_LATITUDE = "GPSDestLatitude";
    GPS_DEST_LONGITUDE_REF = "GPSDestLongitudeRef";
    GPS_DEST_LONGITUDE = "GPSDestLongitude";
    GPS_DEST_BEARING_REF = "GPSDestBearingRef";
    GPS_DEST_BEARING = "GPSDestBearing";
    GPS_DEST_DISTANCE_REF = "GPSDestDistanceRef";
    GPS_DEST_DISTANCE = "GPSDestDistance";
    GPS_PROCESSING_METHOD = "GPSProcessingMethod";
    GPS_AREA_INFORMATION = "GPSAreaInformation";
    GPS_DATE_STAMP = "GPSDateStamp";
    GPS_DIFFERENTIAL = "GPSDifferential";
    GPS_H_POSITIONING_ERROR = "GPSHPositioningError";
}

// Interoperability sub-IFD
fields! {
    INTEROPERABILITY_INDEX = "InteroperabilityIndex";
    INTEROPERABILITY_VERSION = "InteroperabilityVersion";
    RELATED_IMAGE_FILE_FORMAT = "RelatedImageFileFormat";
    RELATED_IMAGE_WIDTH = "RelatedImageWidth";
    RELATED_IMAGE_LENGTH = "RelatedImageLength";
}

// Thumbnail IFD (second IFD of the main chain)
fields! {
    THUMB_JPEG_INTERCHANGE_FORMAT = "ThumbJPEGInterchangeFormat";
    THUMB_JPEG_INTERCHANGE_FORMAT_LENGTH = "ThumbJPEGInterchangeFormatLength";
}

/// Primary IFD and EXIF sub-IFD; the two share one id space
pub static EXIF_FIELDS: FieldTable = FieldTable {
    entries: &[
        (0x0100, IMAGE_WIDTH),
        (0x0101, IMAGE_LENGTH),
        (0x0102, BITS_PER_SAMPLE),
        (0x0103, COMPRESSION),
        (0x0106, PHOTOMETRIC_INTERPRETATION),
        (0x010E, IMAGE_DESCRIPTION),
        (0x010F, MAKE),
        (0x0110, MODEL),
        (0x0111, PREVIEW_IMAGE_START),
        (0x0112, ORIENTATION),
        (0x0115, SAMPLES_PER_PIXEL),
        (0x0117, PREVIEW_IMAGE_LENGTH),
        (0x011A, X_RESOLUTION),
        (0x011B, Y_RESOLUTION),
        (0x011C, PLANAR_CONFIGURATION),
        (0x0128, RESOLUTION_UNIT),
        (0x0131, SOFTWARE),
        (0x0132, DATE_TIME),
        (0x013B, ARTIST),
        (0x0201, JPEG_FROM_RAW_START),
        (0x0202, JPEG_FROM_RAW_LENGTH),
        (0x0212, Y_CB_CR_SUB_SAMPLING),
        (0x0213, Y_CB_CR_POSITIONING),
        (0x8298, COPYRIGHT),
        (0x8769, EXIF_IFD_POINTER),
        (0x8825, GPS_INFO_IFD_POINTER),
        (0xA005, INTEROPERABILITY_IFD_POINTER),
        (0x829A, EXPOSURE_TIME),
        (0x829D, F_NUMBER),
        (0x8822, EXPOSURE_PROGRAM),
        (0x8824, SPECTRAL_SENSITIVITY),
        (0x8827, ISO_SPEED_RATINGS),
        (0x8828, OECF),
        (0x882A, TIME_ZONE_OFFSET),
        (0x9000, EXIF_VERSION),
        (0x9003, DATE_TIME_ORIGINAL),
        (0x9004, DATE_TIME_DIGITIZED),
        (0x9010, OFFSET_TIME),
        (0x9011, OFFSET_TIME_ORIGINAL),
        (0x9012, OFFSET_TIME_DIGITIZED),
        (0x9101, COMPONENTS_CONFIGURATION),
        (0x9102, COMPRESSED_BITS_PER_PIXEL),
        (0x9201, SHUTTER_SPEED_VALUE),
        (0x9202, APERTURE_VALUE),
        (0x9203, BRIGHTNESS_VALUE),
        (0x9204, EXPOSURE_BIAS_VALUE),
        (0x9205, MAX_APERTURE_VALUE),
        (0x9206, SUBJECT_DISTANCE),
        (0x9207, METERING_MODE),
        (0x9208, LIGHT_SOURCE),
        (0x9209, FLASH),
        (0x920A, FOCAL_LENGTH),
        (0x9214, SUBJECT_AREA),
        (0x927C, MAKER_NOTE),
        (0x9286, USER_COMMENT),
        (0x9290, SUB_SEC_TIME),
        (0x9291, SUB_SEC_TIME_ORIGINAL),
        (0x9292, SUB_SEC_TIME_DIGITIZED),
        (0xA000, FLASHPIX_VERSION),
        (0xA001, COLOR_SPACE),
        (0xA002, PIXEL_X_DIMENSION),
        (0xA003, PIXEL_Y_DIMENSION),
        (0xA004, RELATED_SOUND_FILE),
        (0xA20B, FLASH_ENERGY),
        (0xA20C, SPATIAL_FREQUENCY_RESPONSE),
        (0xA20E, FOCAL_PLANE_X_RESOLUTION),
        (0xA20F, FOCAL_PLANE_Y_RESOLUTION),
        (0xA210, FOCAL_PLANE_RESOLUTION_UNIT),
        (0xA214, SUBJECT_LOCATION),
        (0xA215, EXPOSURE_INDEX),
        (0xA217, SENSING_METHOD),
        (0xA300, FILE_SOURCE),
        (0xA301, SCENE_TYPE),
        (0xA302, CFA_PATTERN),
        (0xA401, CUSTOM_RENDERED),
        (0xA402, EXPOSURE_MODE),
        (0xA403, WHITE_BALANCE),
        (0xA404, DIGITAL_ZOOM_RATIO),
        (0xA405, FOCAL_LENGTH_IN_35MM_FILM),
        (0xA406, SCENE_CAPTURE_TYPE),
        (0xA407, GAIN_CONTROL),
        (0xA408, CONTRAST),
        (0xA409, SATURATION),
        (0xA40A, SHARPNESS),
        (0xA40B, DEVICE_SETTING_DESCRIPTION),
        (0xA40C, SUBJECT_DISTANCE_RANGE),
        (0xA420, IMAGE_UNIQUE_ID),
        (0xA433, LENS_MAKE),
        (0xA434, LENS_MODEL),
    ],
};

pub static GPS_FIELDS: FieldTable = FieldTable {
    entries: &[
        (0x0000, GPS_VERSION_ID),
        (0x0001, GPS_LATITUDE_REF),
        (0x0002, GPS_LATITUDE),
        (0x0003, GPS_LONGITUDE_REF),
        (0x0004, GPS_LONGITUDE),
        (0x0005, GPS_ALTITUDE_REF),
        (0x0006, GPS_ALTITUDE),
        (0x0007, GPS_TIME_STAMP),
        (0x0008, GPS_SATELLITES),
        (0x0009, GPS_STATUS),
        (0x000A, GPS_MEASURE_MODE),
        (0x000B, GPS_DOP),
        (0x000C, GPS_SPEED_REF),
        (0x000D, GPS_SPEED),
        (0x000E, GPS_TRACK_REF),
        (0x000F, GPS_TRACK),
        (0x0010, GPS_IMG_DIRECTION_REF),
        (0x0011, GPS_IMG_DIRECTION),
        (0x0012, GPS_MAP_DATUM),
        (0x0013, GPS_DEST_LATITUDE_REF),
        (0x0014, GPS_DEST_LATITUDE),
        (0x0015, GPS_DEST_LONGITUDE_REF),
        (0x0016, GPS_DEST_LONGITUDE),
        (0x0017, GPS_DEST_BEARING_REF),
        (0x0018, GPS_DEST_BEARING),
        (0x0019, GPS_DEST_DISTANCE_REF),
        (0x001A, GPS_DEST_DISTANCE),
        (0x001B, GPS_PROCESSING_METHOD),
        (0x001C, GPS_AREA_INFORMATION),
        (0x001D, GPS_DATE_STAMP),
        (0x001E, GPS_DIFFERENTIAL),
        (0x001F, GPS_H_POSITIONING_ERROR),
    ],
};

pub static INTEROP_FIELDS: FieldTable = FieldTable {
    entries: &[
        (0x0001, INTEROPERABILITY_INDEX),
        (0x0002, INTEROPERABILITY_VERSION),
        (0x1000, RELATED_IMAGE_FILE_FORMAT),
        (0x1001, RELATED_IMAGE_WIDTH),
        (0x1002, RELATED_IMAGE_LENGTH),
    ],
};

pub static THUMBNAIL_FIELDS: FieldTable = FieldTable {
    entries: &[
        (0x0201, THUMB_JPEG_INTERCHANGE_FORMAT),
        (0x0202, THUMB_JPEG_INTERCHANGE_FORMAT_LENGTH),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookup() {
        assert_eq!(EXIF_FIELDS.get(0x9209), Some(&FLASH));
        assert_eq!(EXIF_FIELDS.get(0x8769), Some(&EXIF_IFD_POINTER));
        assert_eq!(GPS_FIELDS.get(0x0002), Some(&GPS_LATITUDE));
        assert_eq!(GPS_FIELDS.id_of("GPSLongitude"), Some(0x0004));
        assert_eq!(INTEROP_FIELDS.get(0x0001), Some(&INTEROPERABILITY_INDEX));
        assert_eq!(THUMBNAIL_FIELDS.get(0x0201), Some(&THUMB_JPEG_INTERCHANGE_FORMAT));
        assert_eq!(GPS_FIELDS.get(0x9209), None);
    }

    #[test]
    fn test_tables_have_unique_ids() {
        for table in [&EXIF_FIELDS, &GPS_FIELDS, &INTEROP_FIELDS, &THUMBNAIL_FIELDS] {
            let mut ids: Vec<u16> = table.iter().map(|(id, _)| id).collect();
            let total = ids.len();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), total);
        }
    }

    #[test]
    fn test_unknown_name() {
        let name = FieldName::unknown(0xC4A5);
        assert_eq!(name.as_str(), "UnknownTag_c4a5");
        assert!(name.is_unknown());
        assert!(!FLASH.is_unknown());
    }

    #[test]
    fn test_owned_and_static_names_compare_equal() {
        assert_eq!(FieldName::new("Flash"), FLASH);
        assert_eq!(FieldName::from("Flash"), FLASH);
        assert_eq!(serde_json::to_string(&FLASH).unwrap(), "\"Flash\"");
    }
}
