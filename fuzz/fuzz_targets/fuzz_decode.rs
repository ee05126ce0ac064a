#![no_main]

use exif_io::{Decoder, EmbeddedImage};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decode any input (auto-detect container)
    // This should NEVER panic, only return errors
    let exif = match Decoder::new().show_unknown(true).decode(data) {
        Ok(exif) => exif,
        Err(e) => match e.into_partial() {
            Ok(partial) => partial.into_inner().0,
            Err(_) => return,
        },
    };

    // Derived values read arbitrary tag types - these should all be safe
    let _ = exif.date_time();
    let _ = exif.time_zone();
    let _ = exif.lat_long();
    let _ = exif.flash();
    for kind in [
        EmbeddedImage::Thumbnail,
        EmbeddedImage::Preview,
        EmbeddedImage::JpegFromRaw,
    ] {
        let _ = exif.embedded_thumbnail(kind);
    }
    let _ = exif.to_json();
    let _ = exif.to_string();
});
