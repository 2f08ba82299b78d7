#![no_main]
//! Arbitrary tool output, cut at an arbitrary point, must split into lines
//! without panicking, and every parsed percentage must stay within 0..=100.

use libfuzzer_sys::fuzz_target;
use stemsplit_core::tools::downloader::download_progress;
use stemsplit_core::{parse_percent, LineSplitter};

fuzz_target!(|data: &[u8]| {
    let Some((&cut, bytes)) = data.split_first() else {
        return;
    };
    let cut = (cut as usize).min(bytes.len());
    let (head, tail) = bytes.split_at(cut);

    let mut splitter = LineSplitter::new();
    let mut lines = splitter.push(head);
    lines.extend(splitter.push(tail));
    lines.extend(splitter.finish());

    for line in &lines {
        assert!(!line.contains('\n') && !line.contains('\r'));
        if let Some(pct) = parse_percent(line) {
            assert!(pct <= 100);
        }
        if let Some(pct) = download_progress(line) {
            assert!(pct <= 95);
        }
    }
});
