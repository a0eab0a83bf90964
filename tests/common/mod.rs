//! Synthetic transport streams for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

pub const AUDIO_PID: u16 = 0x44;
pub const VIDEO_PID: u16 = 0x100;
pub const NULL_PID: u16 = 0x1fff;

/// MPEG-1 Layer II, 128 kbps, 48 kHz, no padding; 384 bytes per frame
pub const FRAME_HEADER: [u8; 4] = [0xff, 0xfd, 0x84, 0x04];
pub const FRAME_SIZE: usize = 384;

/// `count` back-to-back audio frames.  The frame bodies never contain `0xff`, so the only
/// sync words in the result are the frame headers.
pub fn audio_frames(count: usize) -> Vec<u8> {
    let mut es = Vec::with_capacity(count * FRAME_SIZE);
    for _ in 0..count {
        es.extend_from_slice(&FRAME_HEADER);
        es.extend((FRAME_HEADER.len()..FRAME_SIZE).map(|i| (i % 251) as u8));
    }
    es
}

/// A PES packet with a PTS, wrapping the given elementary stream data
pub fn pes_packet(stream_id: u8, es: &[u8]) -> Vec<u8> {
    let len = 3 + 5 + es.len();
    let mut pes = vec![
        0x00,
        0x00,
        0x01,
        stream_id,
        (len >> 8) as u8,
        len as u8,
        0x80,
        0x80,
        0x05,
        0x21,
        0x00,
        0x07,
        0xd8,
        0x61,
    ];
    pes.extend_from_slice(es);
    pes
}

/// Builds a transport stream one 188-byte packet at a time, keeping a continuity counter per PID.
#[derive(Default)]
pub struct TsBuilder {
    packets: Vec<[u8; 188]>,
    counters: HashMap<u16, u8>,
}

impl TsBuilder {
    pub fn new() -> TsBuilder {
        TsBuilder::default()
    }

    /// Make the next packet on `pid` carry the given continuity counter value
    pub fn set_cc(&mut self, pid: u16, cc: u8) -> &mut Self {
        self.counters.insert(pid, cc & 0xf);
        self
    }

    /// Append one packet.  Payloads shorter than 184 bytes are padded with adaptation field
    /// stuffing.
    pub fn packet(&mut self, pid: u16, payload_start: bool, payload: &[u8]) -> &mut Self {
        assert!(!payload.is_empty() && payload.len() <= 184);
        let cc = self.counters.entry(pid).or_insert(0);
        let mut pk = [0xffu8; 188];
        pk[0] = 0x47;
        pk[1] = (if payload_start { 0x40 } else { 0 }) | (pid >> 8) as u8;
        pk[2] = pid as u8;
        let mut offset = 4;
        if payload.len() < 184 {
            pk[3] = 0b0011_0000 | *cc;
            let af_len = 183 - payload.len();
            pk[4] = af_len as u8;
            if af_len > 0 {
                pk[5] = 0;
            }
            offset += 1 + af_len;
        } else {
            pk[3] = 0b0001_0000 | *cc;
        }
        pk[offset..].copy_from_slice(payload);
        *cc = (*cc + 1) & 0xf;
        self.packets.push(pk);
        self
    }

    /// Append a whole PES packet, split across as many TS packets as needed
    pub fn pes(&mut self, pid: u16, stream_id: u8, es: &[u8]) -> &mut Self {
        let pes = pes_packet(stream_id, es);
        for (i, chunk) in pes.chunks(184).enumerate() {
            self.packet(pid, i == 0, chunk);
        }
        self
    }

    /// Like `pes()`, but with _PES_packet_length_ `0`, as used for unbounded PES packets
    pub fn unbounded_pes(&mut self, pid: u16, stream_id: u8, es: &[u8]) -> &mut Self {
        let mut pes = pes_packet(stream_id, es);
        pes[4] = 0;
        pes[5] = 0;
        for (i, chunk) in pes.chunks(184).enumerate() {
            self.packet(pid, i == 0, chunk);
        }
        self
    }

    pub fn null_packet(&mut self) -> &mut Self {
        self.packet(NULL_PID, false, &[0xff; 184])
    }

    /// Direct access to the packets built so far, for corrupting them
    pub fn packets_mut(&mut self) -> &mut Vec<[u8; 188]> {
        &mut self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn build(&self) -> Vec<u8> {
        self.packets.iter().flat_map(|pk| pk.iter().copied()).collect()
    }
}
