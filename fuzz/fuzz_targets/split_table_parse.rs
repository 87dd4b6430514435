//! Fuzz target for split table extraction.
//!
//! Anything that parses as a MAT file is handed to the WIDER table reader.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use wider2voc::mat::MatFile;
use wider2voc::wider::{split_table_from_mat, Split};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(file) = MatFile::from_slice(data) {
        let _ = split_table_from_mat(&file, Split::Train, Path::new("fuzz.mat"));
    }
});
