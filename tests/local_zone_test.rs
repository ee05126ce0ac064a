//! Local-zone fallback for capture times
//!
//! Kept in its own test binary: it sets `TZ` for the whole process.

use chrono::{TimeZone, Utc};
use exif_io::{test_utils::*, ByteOrder};

fn decode_date_time(value: &str) -> exif_io::Result<chrono::DateTime<chrono::FixedOffset>> {
    let tiff = TiffBuilder::new(ByteOrder::BigEndian)
        .ifd(vec![Entry::ascii(0x0132, value)])
        .build();
    exif_io::decode(tiff.as_slice())?.date_time()
}

#[test]
fn test_local_zone_dst_transitions() {
    // US Eastern rules as a POSIX string, so no tz database is needed
    std::env::set_var("TZ", "EST5EDT,M3.2.0,M11.1.0");

    // an ordinary winter time
    let dt = decode_date_time("2023:01:15 10:00:00").unwrap();
    assert_eq!(dt.to_rfc3339(), "2023-01-15T10:00:00-05:00");

    // 02:30 does not exist on the spring-forward day; it resolves with the
    // pre-transition offset, the same instant as 03:30 EDT
    let dt = decode_date_time("2023:03:12 02:30:00").unwrap();
    assert_eq!(dt, Utc.with_ymd_and_hms(2023, 3, 12, 7, 30, 0).unwrap());

    // 01:30 happens twice on the fall-back day; the earlier one wins
    let dt = decode_date_time("2023:11:05 01:30:00").unwrap();
    assert_eq!(dt.to_rfc3339(), "2023-11-05T01:30:00-04:00");
}
