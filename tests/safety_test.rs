//! Safety tests - hostile and truncated inputs
//!
//! These tests verify that limits are enforced and that malformed input
//! comes back as an error rather than a panic or a hang.
//! Comprehensive testing should be done with fuzzing (cargo-fuzz).

use exif_io::{
    test_utils::*,
    tiff::{TiffError, MAX_IFD_CHAIN, MAX_IFD_TAGS},
    ByteOrder, Decoder, Error, DEFAULT_MAX_HEIC_SCAN,
};

fn sample_tiff() -> Vec<u8> {
    TiffBuilder::new(ByteOrder::LittleEndian)
        .ifd(vec![
            Entry::ascii(0x010F, "Canon"),
            Entry::sub_ifd(0x8769, 0),
            Entry::sub_ifd(0x8825, 1),
        ])
        .sub_ifd(vec![
            Entry::ascii(0x9003, "2023:05:01 12:00:00"),
            Entry::short(0x9209, &[0x19]),
        ])
        .sub_ifd(vec![
            Entry::ascii(0x0001, "N"),
            Entry::rational(0x0002, &[(40, 1), (30, 1), (0, 1)]),
        ])
        .build()
}

fn is_decode_error(err: &Error, inner: impl Fn(&Error) -> bool) -> bool {
    matches!(err, Error::Decode(cause) if inner(&**cause))
}

#[test]
fn test_limits_are_reasonable() {
    assert!(MAX_IFD_TAGS > 100, "Allow reasonable tag counts");
    assert!(MAX_IFD_TAGS < 10000, "Prevent excessive tag counts");
    assert!(MAX_IFD_CHAIN >= 2, "Allow primary and thumbnail IFDs");
    assert_eq!(DEFAULT_MAX_HEIC_SCAN, 5 * 1024 * 1024);
}

#[test]
fn test_truncated_inputs_do_not_panic() {
    let tiff = sample_tiff();
    let inputs = [
        tiff.clone(),
        wrap_jpeg(&tiff, Some("comment")),
        HeicBuilder::new(&tiff).build(),
    ];
    for input in &inputs {
        for len in 0..input.len() {
            if let Err(e) = exif_io::decode(&input[..len]) {
                // a cut stream is either unusable or missing whole sub-IFDs
                let _ = e.is_critical();
            }
        }
    }
}

#[test]
fn test_short_header_is_critical() {
    for input in [&b""[..], &b"II*\0"[..], &b"\xFF\xD8\xFF\xE1"[..]] {
        let err = exif_io::decode(input).unwrap_err();
        assert!(err.is_critical());
        assert!(is_decode_error(&err, |cause| matches!(cause, Error::Io(_))));
    }
}

#[test]
fn test_garbage_is_critical() {
    let garbage: Vec<u8> = (0..4096u32).map(|i| (i * 7 + 3) as u8).collect();
    let err = exif_io::decode(garbage.as_slice()).unwrap_err();
    assert!(err.is_critical());

    let err = exif_io::decode(&b"GIF89a\x01\0\x01\0\0\0\0\0\0\0\0\0"[..]).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[test]
fn test_app1_without_exif_signature() {
    let jpeg = wrap_jpeg_raw_app1(b"http://ns.adobe.com/xap/1.0/\0<x:xmpmeta/>");
    let err = exif_io::decode(jpeg.as_slice()).unwrap_err();
    assert!(is_decode_error(&err, |cause| matches!(
        cause,
        Error::IntroMarkerNotFound
    )));
}

#[test]
fn test_heic_scan_limit() {
    let heic = HeicBuilder::new(&sample_tiff()).build();

    let err = Decoder::new()
        .max_heic_scan(32)
        .decode(heic.as_slice())
        .unwrap_err();
    assert!(err.is_critical());
    assert!(matches!(err, Error::Decode(_)));

    // the whole file fits: the item is found
    let exif = Decoder::new()
        .max_heic_scan(heic.len() as u64)
        .decode(heic.as_slice())
        .unwrap();
    assert_eq!(exif.get("Make").unwrap().string_val().unwrap(), "Canon");
}

#[test]
fn test_heic_without_exif_item() {
    let heic = HeicBuilder::new(&sample_tiff()).without_exif_item().build();
    let err = exif_io::decode(heic.as_slice()).unwrap_err();
    assert!(is_decode_error(&err, |cause| matches!(cause, Error::NoExifItem)));
}

#[test]
fn test_cyclic_ifd_chain_terminates() {
    // one IFD whose next-IFD offset points back at itself
    let mut tiff = b"II*\0\x08\0\0\0".to_vec();
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x010Fu16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&2u32.to_le_bytes());
    tiff.extend_from_slice(b"A\0\0\0");
    tiff.extend_from_slice(&8u32.to_le_bytes());

    let exif = exif_io::decode(tiff.as_slice()).unwrap();
    assert_eq!(exif.tiff().dirs.len(), 1);
    assert_eq!(exif.get("Make").unwrap().string_val().unwrap(), "A");
}

#[test]
fn test_value_past_end_is_short_read() {
    // ASCII value of 100 bytes stored at an offset beyond the stream
    let mut tiff = b"MM\0*\0\0\0\x08".to_vec();
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x010Fu16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&100u32.to_be_bytes());
    tiff.extend_from_slice(&1000u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let err = exif_io::decode(tiff.as_slice()).unwrap_err();
    assert!(err.is_critical());
    assert!(err.is_short_read_tag_value());
}

#[test]
fn test_excessive_entry_count() {
    let mut tiff = b"II*\0\x08\0\0\0".to_vec();
    tiff.extend_from_slice(&u16::MAX.to_le_bytes());
    tiff.extend_from_slice(&[0u8; 64]);

    let err = exif_io::decode(tiff.as_slice()).unwrap_err();
    assert!(is_decode_error(&err, |cause| matches!(
        cause,
        Error::Tiff(TiffError::TooManyEntries(_))
    )));
}

#[test]
fn test_no_directories() {
    let err = exif_io::decode(&b"II*\0\0\0\0\0\0\0\0\0\0\0\0\0"[..]).unwrap_err();
    assert!(matches!(err, Error::InvalidExif));
}

#[test]
fn test_sub_ifd_pointer_out_of_range_is_partial() {
    let tiff = TiffBuilder::new(ByteOrder::BigEndian)
        .ifd(vec![
            Entry::ascii(0x010F, "Canon"),
            Entry::long(0x8769, &[u32::MAX]),
        ])
        .build();
    let err = exif_io::decode(tiff.as_slice()).unwrap_err();
    assert!(!err.is_critical());
    assert!(err.partial_failure().unwrap().is_exif_error());
}

#[test]
fn test_embedded_range_overflow() {
    let tiff = TiffBuilder::new(ByteOrder::LittleEndian)
        .ifd(vec![
            Entry::long(0x0111, &[u32::MAX]),
            Entry::long(0x0117, &[u32::MAX]),
        ])
        .build();
    let exif = exif_io::decode(tiff.as_slice()).unwrap();
    assert!(matches!(exif.preview_image(), Err(Error::Malformed(_))));
}

#[test]
fn test_shared_value_region_is_bounded() {
    // 1000 UNDEFINED entries all pointing at one 60 KB block
    let entries = MAX_IFD_TAGS;
    let region = 60_000u32;
    let region_at = 8 + 2 + 12 * entries as u32 + 4;

    let mut tiff = b"II*\0\x08\0\0\0".to_vec();
    tiff.extend_from_slice(&entries.to_le_bytes());
    for _ in 0..entries {
        tiff.extend_from_slice(&0x927Cu16.to_le_bytes());
        tiff.extend_from_slice(&7u16.to_le_bytes());
        tiff.extend_from_slice(&region.to_le_bytes());
        tiff.extend_from_slice(&region_at.to_le_bytes());
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.resize(tiff.len() + region as usize, 0);

    let err = exif_io::decode(tiff.as_slice()).unwrap_err();
    assert!(err.is_critical());
    assert!(is_decode_error(&err, |cause| matches!(
        cause,
        Error::Tiff(TiffError::ValueBudgetExceeded { .. })
    )));
}
