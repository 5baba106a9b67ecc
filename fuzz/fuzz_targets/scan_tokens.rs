#![no_main]

use libfuzzer_sys::fuzz_target;
use primeflow::{ItemSource, PipelineError, ReaderSource, TokenScanner};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut scanner = TokenScanner::new(data);
    let mut prev_pos = scanner.position();
    let mut scanned = Vec::new();

    while let Some(item) = scanner.next() {
        let curr_pos = scanner.position();
        if curr_pos <= prev_pos {
            panic!("token scanner: no forward progress");
        }
        if curr_pos > data.len() {
            panic!("token scanner: position exceeded input length");
        }
        if let Err(PipelineError::MalformedEntry { offset, .. }) = &item {
            if *offset < prev_pos || *offset >= curr_pos {
                panic!("token scanner: malformed offset outside token");
            }
        }
        prev_pos = curr_pos;
        scanned.push(item);
    }

    // Line-buffered reading must agree with scanning the whole buffer.
    let mut reader = ReaderSource::new(Cursor::new(data));
    let read: Vec<_> = std::iter::from_fn(|| reader.next_item()).collect();
    if read != scanned {
        panic!(
            "reader mismatch: scanned={} read={}",
            scanned.len(),
            read.len()
        );
    }
});
