#![no_main]

use hvac_unitary::output::Output;
use hvac_unitary::run_project;
use libfuzzer_sys::fuzz_target;
use std::io;
use std::io::{BufReader, Cursor, Write};

fuzz_target!(|data: &[u8]| {
    let _run = run_project(BufReader::new(Cursor::new(data)), CountingSink);
});

/// Discards everything written, but reports itself as a real output so that the report
/// writing is exercised too.
#[derive(Debug, Default)]
pub struct CountingSink;

impl Output for CountingSink {
    fn writer_for_location_key(&self, _location_key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }
}
