//! Fuzz target for MAT-file parsing.
//!
//! Feeds arbitrary bytes to the MAT reader, checking for panics, crashes,
//! or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wider2voc::mat::MatFile;

fuzz_target!(|data: &[u8]| {
    // Cap input size to avoid excessive memory usage.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = MatFile::from_slice(data);
});
