//! Values derived from one or more fields: capture time, time zone,
//! coordinates and flash mode

use crate::{
    error::{Error, Result},
    fields::{
        CANON_TIME_INFO, DATE_TIME, DATE_TIME_ORIGINAL, FLASH, GPS_LATITUDE, GPS_LATITUDE_REF,
        GPS_LONGITUDE, GPS_LONGITUDE_REF, OFFSET_TIME, OFFSET_TIME_ORIGINAL, TIME_ZONE_OFFSET,
    },
    tiff::{Format, Tag},
    Exif,
};
use chrono::{DateTime, FixedOffset, Local, LocalResult, NaiveDateTime, Offset, TimeZone};

const EXIF_TIME_LAYOUT: &str = "%Y:%m:%d %H:%M:%S";

/// Flash field values and their descriptions
const FLASH_DESCRIPTIONS: &[(i64, &str)] = &[
    (0x00, "No Flash"),
    (0x01, "Fired"),
    (0x05, "Fired, Return not detected"),
    (0x07, "Fired, Return detected"),
    (0x08, "On, Did not fire"),
    (0x09, "On, Fired"),
    (0x0D, "On, Return not detected"),
    (0x0F, "On, Return detected"),
    (0x10, "Off, Did not fire"),
    (0x14, "Off, Did not fire, Return not detected"),
    (0x18, "Auto, Did not fire"),
    (0x19, "Auto, Fired"),
    (0x1D, "Auto, Fired, Return not detected"),
    (0x1F, "Auto, Fired, Return detected"),
    (0x20, "No flash function"),
    (0x30, "Off, No flash function"),
    (0x41, "Fired, Red-eye reduction"),
    (0x45, "Fired, Red-eye reduction, Return not detected"),
    (0x47, "Fired, Red-eye reduction, Return detected"),
    (0x49, "On, Red-eye reduction"),
    (0x4D, "On, Red-eye reduction, Return not detected"),
    (0x4F, "On, Red-eye reduction, Return detected"),
    (0x50, "Off, Red-eye reduction"),
    (0x58, "Auto, Did not fire, Red-eye reduction"),
    (0x59, "Auto, Fired, Red-eye reduction"),
    (0x5D, "Auto, Fired, Red-eye reduction, Return not detected"),
    (0x5F, "Auto, Fired, Red-eye reduction, Return detected"),
];

impl Exif {
    /// Capture time
    ///
    /// Prefers `DateTimeOriginal` over `DateTime`. An `OffsetTimeOriginal` or
    /// `OffsetTime` field supplies the offset; failing that, [`Exif::time_zone`];
    /// failing that, the local zone.
    pub fn date_time(&self) -> Result<DateTime<FixedOffset>> {
        let tag = self
            .get(DATE_TIME_ORIGINAL)
            .or_else(|_| self.get(DATE_TIME))?;
        let value = tag.string_val().map_err(Error::malformed)?;
        let date = value.trim_end_matches('\0');

        if let Ok(offset) = self
            .get(OFFSET_TIME_ORIGINAL)
            .or_else(|_| self.get(OFFSET_TIME))
        {
            let offset = offset.string_val().map_err(Error::malformed)?;
            let offset = match offset.trim_end_matches('\0') {
                "Z" => "+00:00",
                other => other,
            };
            let layout = format!("{EXIF_TIME_LAYOUT} %:z");
            return DateTime::parse_from_str(&format!("{date} {offset}"), &layout)
                .map_err(|e| Error::Malformed(format!("date/time {date:?} {offset:?}: {e}")));
        }

        let naive = NaiveDateTime::parse_from_str(date, EXIF_TIME_LAYOUT)
            .map_err(|e| Error::Malformed(format!("date/time {date:?}: {e}")))?;

        match self.time_zone() {
            Ok(zone) => zone
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| Error::Malformed(format!("date/time {date:?} not representable"))),
            Err(_) => in_local_zone(&naive)
                .ok_or_else(|| Error::Malformed(format!("date/time {date:?} not representable"))),
        }
    }

    /// Time zone recorded by the camera
    ///
    /// Reads `TimeZoneOffset` (whole hours; unsigned encodings of negative
    /// offsets are folded back), then `Canon.TimeInfo` (minutes, element 1).
    pub fn time_zone(&self) -> Result<FixedOffset> {
        if let Ok(tag) = self.get(TIME_ZONE_OFFSET) {
            let mut hours = tag.int(0).map_err(Error::malformed)?;
            if hours > 24 {
                hours -= 65536;
            }
            if hours < -24 {
                return Err(Error::Malformed(format!("invalid timezone offset {hours}")));
            }
            return offset_seconds(hours * 3600);
        }

        if let Ok(info) = self.get(CANON_TIME_INFO) {
            if info.count < 2 {
                return Err(Error::Malformed(
                    "Canon.TimeInfo does not contain timezone".into(),
                ));
            }
            let minutes = info.int(1).map_err(Error::malformed)?;
            return offset_seconds(minutes * 60);
        }

        Err(Error::TagNotPresent(TIME_ZONE_OFFSET))
    }

    /// Latitude and longitude in signed decimal degrees
    ///
    /// All four GPS position fields must be present. South latitudes and
    /// west longitudes come out negative.
    pub fn lat_long(&self) -> Result<(f64, f64)> {
        let long_tag = self.get(GPS_LONGITUDE)?;
        let ew_tag = self.get(GPS_LONGITUDE_REF)?;
        let lat_tag = self.get(GPS_LATITUDE)?;
        let ns_tag = self.get(GPS_LATITUDE_REF)?;

        let mut long = tag_degrees(long_tag)
            .map_err(|e| Error::Malformed(format!("cannot parse longitude: {e}")))?;
        let mut lat = tag_degrees(lat_tag)
            .map_err(|e| Error::Malformed(format!("cannot parse latitude: {e}")))?;

        if long.abs() > 180.0 {
            return Err(Error::Malformed(format!(
                "longitude outside allowed range: {long}"
            )));
        }
        if lat.abs() > 90.0 {
            return Err(Error::Malformed(format!(
                "latitude outside allowed range: {lat}"
            )));
        }

        let ew = ew_tag
            .string_val()
            .map_err(|e| Error::Malformed(format!("cannot parse longitude: {e}")))?;
        if ew == "W" {
            long = -long;
        }
        let ns = ns_tag
            .string_val()
            .map_err(|e| Error::Malformed(format!("cannot parse latitude: {e}")))?;
        if ns == "S" {
            lat = -lat;
        }
        Ok((lat, long))
    }

    /// Flash mode description; unmapped values give an empty string
    pub fn flash(&self) -> Result<&'static str> {
        let value = self.get(FLASH)?.int(0).map_err(Error::malformed)?;
        Ok(FLASH_DESCRIPTIONS
            .iter()
            .find(|(code, _)| *code == value)
            .map(|(_, text)| *text)
            .unwrap_or(""))
    }
}

/// Wall-clock time in the local zone
///
/// A time skipped by a DST change takes the offset in effect at the same
/// UTC reading, so it resolves to a real instant rather than failing.
fn in_local_zone(naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    let offset = match Local.offset_from_local_datetime(naive) {
        LocalResult::Single(offset) | LocalResult::Ambiguous(offset, _) => offset.fix(),
        LocalResult::None => Local.offset_from_utc_datetime(naive).fix(),
    };
    offset.from_local_datetime(naive).single()
}

fn offset_seconds(seconds: i64) -> Result<FixedOffset> {
    i32::try_from(seconds)
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::Malformed(format!("timezone offset {seconds}s out of range")))
}

/// Decimal degrees from a degrees/minutes/seconds tag
fn tag_degrees(tag: &Tag) -> std::result::Result<f64, String> {
    match tag.format() {
        // the usual case: up to three rationals
        Format::RatVal => {
            let mut parts = [0.0f64; 3];
            for (i, part) in parts.iter_mut().enumerate() {
                let (num, den) = tag.rat2(i).map_err(|e| e.to_string())?;
                if den == 0 {
                    return Err(format!("zero denominator in element {i}"));
                }
                *part = num as f64 / den as f64;
                if (tag.count as usize) < i + 2 {
                    break;
                }
            }
            Ok(parts[0] + parts[1] / 60.0 + parts[2] / 3600.0)
        }
        // seen in panoramas from some phones
        Format::StringVal => {
            let s = tag.string_val().map_err(|e| e.to_string())?;
            parse_degrees_string(&s)
        }
        _ => Err("malformed degrees tag".into()),
    }
}

/// Parse degrees written as text
///
/// Accepted forms, all meaning 52°50'34.0118":
/// - `52,00000,50,00000,34,01180` (comma as both decimal mark and separator)
/// - `52.0,50.0,34.01180`
/// - `52,50,34.01180`
///
/// `;` also separates. Minutes and seconds take the sign of the degrees.
pub(crate) fn parse_degrees_string(s: &str) -> std::result::Result<f64, String> {
    let parts: Vec<&str> = s
        .split(|c| c == ',' || c == ';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let (degrees, minutes, seconds) = match parts.as_slice() {
        [d, df, m, mf, sec, secf] => (
            parse_float(&format!("{d}.{df}"), s)?,
            parse_float(&format!("{m}.{mf}"), s)?,
            parse_float(&format!("{sec}.{secf}"), s)?,
        ),
        [d, m, sec] => (parse_float(d, s)?, parse_float(m, s)?, parse_float(sec, s)?),
        _ => return Err(format!("unknown coordinate format: {s}")),
    };

    let minutes = minutes.copysign(degrees);
    let seconds = seconds.copysign(degrees);
    Ok(degrees + minutes / 60.0 + seconds / 3600.0)
}

fn parse_float(text: &str, whole: &str) -> std::result::Result<f64, String> {
    text.parse::<f64>()
        .map_err(|_| format!("unknown coordinate format: {whole}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldName;
    use crate::test_utils::{Entry, TiffBuilder};
    use crate::tiff::{ByteOrder, DataType};
    use crate::Decoder;
    use chrono::Timelike;

    const EPSILON: f64 = 1e-9;

    fn decode(primary: Vec<Entry>, exif: Vec<Entry>, gps: Vec<Entry>) -> Exif {
        let mut ifd0 = primary;
        ifd0.push(Entry::sub_ifd(0x8769, 0));
        ifd0.push(Entry::sub_ifd(0x8825, 1));
        let data = TiffBuilder::new(ByteOrder::BigEndian)
            .ifd(ifd0)
            .sub_ifd(exif)
            .sub_ifd(gps)
            .build();
        Decoder::new().decode(data.as_slice()).unwrap()
    }

    fn gps(lat_ref: &str, lat: &[(u32, u32)], long_ref: &str, long: &[(u32, u32)]) -> Vec<Entry> {
        vec![
            Entry::ascii(0x0001, lat_ref),
            Entry::rational(0x0002, lat),
            Entry::ascii(0x0003, long_ref),
            Entry::rational(0x0004, long),
        ]
    }

    #[test]
    fn test_lat_long_hemispheres() {
        let north = decode(
            vec![],
            vec![],
            gps("N", &[(40, 1), (30, 1), (0, 1)], "E", &[(10, 1), (0, 1), (0, 1)]),
        );
        let (lat, long) = north.lat_long().unwrap();
        assert!((lat - 40.5).abs() < EPSILON);
        assert!((long - 10.0).abs() < EPSILON);

        let south = decode(
            vec![],
            vec![],
            gps("S", &[(40, 1), (30, 1), (0, 1)], "W", &[(10, 1), (15, 1), (0, 1)]),
        );
        let (lat, long) = south.lat_long().unwrap();
        assert!((lat + 40.5).abs() < EPSILON);
        assert!((long + 10.25).abs() < EPSILON);
    }

    #[test]
    fn test_lat_long_out_of_range() {
        let exif = decode(
            vec![],
            vec![],
            gps("N", &[(91, 1), (0, 1), (0, 1)], "E", &[(10, 1), (0, 1), (0, 1)]),
        );
        assert!(matches!(exif.lat_long(), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_lat_long_missing_field() {
        let exif = decode(vec![], vec![], vec![Entry::ascii(0x0001, "N")]);
        assert!(exif.lat_long().unwrap_err().is_tag_not_present());
    }

    #[test]
    fn test_degrees_string_forms() {
        let expected = 52.0 + 50.0 / 60.0 + 34.0118 / 3600.0;
        for s in ["52,00000,50,00000,34,01180", "52.0,50.0,34.01180", "52,50,34.01180", "52;50;34.01180"] {
            let v = parse_degrees_string(s).unwrap();
            assert!((v - expected).abs() < EPSILON, "{s}: {v}");
        }
        let v = parse_degrees_string("-52,50,34.01180").unwrap();
        assert!((v + expected).abs() < EPSILON);
        assert!(parse_degrees_string("52,50").is_err());
        assert!(parse_degrees_string("a,b,c").is_err());
    }

    #[test]
    fn test_string_coordinates() {
        let exif = decode(
            vec![],
            vec![],
            vec![
                Entry::ascii(0x0001, "N"),
                Entry::ascii(0x0002, "52,00000,50,00000,34,01180"),
                Entry::ascii(0x0003, "E"),
                Entry::ascii(0x0004, "4.0,0.0,0.0"),
            ],
        );
        let (lat, long) = exif.lat_long().unwrap();
        assert!((lat - (52.0 + 50.0 / 60.0 + 34.0118 / 3600.0)).abs() < EPSILON);
        assert!((long - 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_date_time_with_offset_field() {
        let exif = decode(
            vec![Entry::ascii(0x0132, "2001:01:01 00:00:00")],
            vec![
                Entry::ascii(0x9003, "2023:05:01 12:34:56"),
                Entry::ascii(0x9011, "+02:00"),
            ],
            vec![],
        );
        let dt = exif.date_time().unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(dt.to_rfc3339(), "2023-05-01T12:34:56+02:00");
    }

    #[test]
    fn test_date_time_falls_back_to_date_time_and_tz_field() {
        let exif = decode(
            vec![Entry::ascii(0x0132, "2020:02:29 23:59:58")],
            vec![Entry::sshort(0x882A, &[-5])],
            vec![],
        );
        let dt = exif.date_time().unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(dt.hour(), 23);
        assert_eq!(dt.to_rfc3339(), "2020-02-29T23:59:58-05:00");
    }

    #[test]
    fn test_date_time_trailing_nuls_and_local_fallback() {
        let exif = decode(
            vec![],
            vec![Entry::ascii(0x9003, "2019:07:04 08:00:00\0\0")],
            vec![],
        );
        let dt = exif.date_time().unwrap();
        assert_eq!(dt.naive_local().to_string(), "2019-07-04 08:00:00");
    }

    #[test]
    fn test_date_time_errors() {
        let exif = decode(vec![], vec![], vec![]);
        assert!(exif.date_time().unwrap_err().is_tag_not_present());

        let exif = decode(vec![Entry::ascii(0x0132, "yesterday")], vec![], vec![]);
        assert!(matches!(exif.date_time(), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_time_zone_sources() {
        // unsigned encoding of -3
        let exif = decode(vec![], vec![Entry::short(0x882A, &[65533])], vec![]);
        assert_eq!(exif.time_zone().unwrap().local_minus_utc(), -3 * 3600);

        let exif = decode(vec![], vec![Entry::sshort(0x882A, &[-30])], vec![]);
        assert!(matches!(exif.time_zone(), Err(Error::Malformed(_))));

        let mut exif = decode(vec![], vec![], vec![]);
        assert!(exif.time_zone().unwrap_err().is_tag_not_present());

        let mut info = Vec::new();
        for v in [0u32, 90, 0] {
            info.extend_from_slice(&v.to_be_bytes());
        }
        let tag = Tag::new(0x0035, DataType::Long, 3, ByteOrder::BigEndian, info);
        exif.insert(FieldName::from("Canon.TimeInfo"), tag);
        assert_eq!(exif.time_zone().unwrap().local_minus_utc(), 90 * 60);

        let short = Tag::new(0x0035, DataType::Long, 1, ByteOrder::BigEndian, vec![0; 4]);
        exif.insert(CANON_TIME_INFO, short);
        assert!(matches!(exif.time_zone(), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_flash() {
        let exif = decode(vec![], vec![Entry::short(0x9209, &[0x19])], vec![]);
        assert_eq!(exif.flash().unwrap(), "Auto, Fired");

        let exif = decode(vec![], vec![Entry::short(0x9209, &[0x7F])], vec![]);
        assert_eq!(exif.flash().unwrap(), "");

        let exif = decode(vec![], vec![], vec![]);
        assert!(exif.flash().unwrap_err().is_tag_not_present());
    }
}
