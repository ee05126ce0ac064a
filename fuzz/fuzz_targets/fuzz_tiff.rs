#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Raw TIFF structure, bypassing container detection
    if let Ok(tiff) = exif_io::tiff::decode(data) {
        for dir in &tiff.dirs {
            for tag in &dir.tags {
                let _ = tag.to_string();
                let _ = tag.string_val();
                for i in 0..tag.count.min(16) as usize {
                    let _ = tag.int(i);
                    let _ = tag.rat2(i);
                    let _ = tag.float(i);
                }
            }
        }
    }
});
