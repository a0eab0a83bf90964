use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use ts2mpa::demultiplex::{CancellationToken, Demultiplex, DemuxOptions};
use ts2mpa::packet::Packet;

#[path = "../tests/common/mod.rs"]
mod common;

use common::{audio_frames, TsBuilder, AUDIO_PID, VIDEO_PID};

// roughly what a radio service looks like: mostly video and null packets, with audio PES
// packets of a few frames each
fn synthetic_stream() -> Vec<u8> {
    let es = audio_frames(4);
    let video = vec![0u8; 184 * 20];
    let mut ts = TsBuilder::new();
    for _ in 0..2_000 {
        ts.pes(VIDEO_PID, 0xe0, &video)
            .null_packet()
            .pes(AUDIO_PID, 0xc0, &es);
    }
    ts.build()
}

fn ts2mpa(c: &mut Criterion) {
    let buf = synthetic_stream();
    let mut group = c.benchmark_group("extract");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("run", |b| {
        b.iter(|| {
            let mut demux = Demultiplex::new(DemuxOptions::default());
            let report = demux
                .run(&buf[..], std::io::sink(), &CancellationToken::new())
                .unwrap();
            assert_eq!(report.packets as usize, buf.len() / Packet::SIZE);
        });
    });
    group.bench_function("push_packet", |b| {
        b.iter(|| {
            let mut demux = Demultiplex::new(DemuxOptions::default());
            let mut out = std::io::sink();
            for pk in buf.chunks_exact(Packet::SIZE) {
                let pk: &[u8; Packet::SIZE] = pk.try_into().unwrap();
                demux.push_packet(pk, &mut out).unwrap();
            }
        });
    });
    group.finish();
}

criterion_group!(benches, ts2mpa);
criterion_main!(benches);
