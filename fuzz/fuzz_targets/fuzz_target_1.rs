#![no_main]

use libfuzzer_sys::fuzz_target;
use ts2mpa::demultiplex::{CancellationToken, Demultiplex, DemuxOptions};

fuzz_target!(|data: &[u8]| {
    let mut demux = Demultiplex::new(DemuxOptions::default());
    let mut out = Vec::new();
    if let Ok(report) = demux.run(data, &mut out, &CancellationToken::new()) {
        assert_eq!(report.bytes_written, out.len() as u64);
    }
});
