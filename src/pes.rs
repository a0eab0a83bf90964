//! Support for Packetised Elementary Stream syntax within Transport Stream packet payloads.
//!
//! Elementary streams are split into 'PES packets', which are then further split into the
//! payloads of transport stream packets.  [`PesHeader`](struct.PesHeader.html) decodes the
//! header found at the start of each PES packet, and
//! [`PesReassembler`](struct.PesReassembler.html) turns the sequence of TS payloads for a single
//! PID back into elementary stream byte ranges, stripped of all PES framing.

use crate::packet::Pid;
use log::{debug, info, warn};
use std::fmt;

/// Errors which may be encountered while processing PES data.
#[derive(Debug, PartialEq, Eq)]
pub enum PesError {
    /// There is not enough data in the buffer to hold the expected syntax element
    NotEnoughData {
        /// the number of bytes required to hold the requested syntax element
        requested: usize,
        /// the number of bytes actually remaining in the buffer
        available: usize,
    },
    /// The buffer does not start with the _packet_start_code_prefix_ `0x000001`
    BadStartCode(u32),
    /// The _stream_id_ is outside the MPEG audio range `0xC0`-`0xDF`
    NotAudio(u8),
    /// The two bits preceding _PES_scrambling_control_ did not have the value `0b10`
    BadCheckBits(u8),
    /// _PES_scrambling_control_ is non-zero
    Scrambled(u8),
}

impl fmt::Display for PesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PesError::NotEnoughData {
                requested,
                available,
            } => write!(
                f,
                "PES header needs {} bytes but only {} available",
                requested, available
            ),
            PesError::BadStartCode(code) => write!(
                f,
                "invalid packet_start_code_prefix 0x{:06x}, expected 0x000001",
                code
            ),
            PesError::NotAudio(id) => write!(f, "non-mpegaudio stream id 0x{:x}", id),
            PesError::BadCheckBits(bits) => {
                write!(f, "invalid PES extension sync code {:#b}, expected 0b10", bits)
            }
            PesError::Scrambled(sc) => write!(f, "PES payload is scrambled ({:#b})", sc),
        }
    }
}

/// Header at the start of every PES packet.
///
/// Only the fixed part of the header is decoded eagerly.  Of the optional fields counted by
/// _PES_header_data_length_, only the PTS is ever looked at; `payload()` skips over the rest.
pub struct PesHeader<'buf> {
    buf: &'buf [u8],
}
impl<'buf> PesHeader<'buf> {
    /// start code (3 bytes) + stream_id (1 byte) + PES_packet_length (2 bytes)
    const FIXED_HEADER_SIZE: usize = 6;
    /// the 3 byte flags + PES_header_data_length block which follows the fixed header
    const EXTENSION_SIZE: usize = 3;
    /// Elementary stream data begins this many bytes from the PES start, plus the value of
    /// `header_data_length()`
    pub const PAYLOAD_OFFSET: usize = Self::FIXED_HEADER_SIZE + Self::EXTENSION_SIZE;
    /// PTS values count ticks of a 90kHz clock
    pub const PTS_TIMEBASE: u64 = 90_000;

    /// Wraps the given slice in a `PesHeader`.
    ///
    /// Returns `Err(PesError::NotEnoughData)` if the buffer is too small to hold the 9 byte PES
    /// header, or `Err(PesError::BadStartCode)` if the 'start code prefix' is missing.
    pub fn from_bytes(buf: &'buf [u8]) -> Result<PesHeader<'buf>, PesError> {
        if buf.len() < Self::PAYLOAD_OFFSET {
            return Err(PesError::NotEnoughData {
                requested: Self::PAYLOAD_OFFSET,
                available: buf.len(),
            });
        }
        let header = PesHeader { buf };
        let start_code = header.start_code();
        if start_code != 1 {
            return Err(PesError::BadStartCode(start_code));
        }
        Ok(header)
    }

    /// Like `from_bytes()`, but additionally requires that the header describes an unscrambled
    /// MPEG audio stream, and that the declared header data fits within the buffer.
    pub fn audio_from_bytes(buf: &'buf [u8]) -> Result<PesHeader<'buf>, PesError> {
        let header = PesHeader::from_bytes(buf)?;
        header.validate_audio()?;
        Ok(header)
    }

    /// Checks that this header introduces MPEG audio data which this crate is able to extract.
    pub fn validate_audio(&self) -> Result<(), PesError> {
        if !Self::is_mpeg_audio(self.stream_id()) {
            return Err(PesError::NotAudio(self.stream_id()));
        }
        if self.check_bits() != 0b10 {
            return Err(PesError::BadCheckBits(self.check_bits()));
        }
        if self.scrambling_control() != 0 {
            return Err(PesError::Scrambled(self.scrambling_control()));
        }
        self.payload().map(|_| ())
    }

    /// true for _stream_id_ values in the range `0xC0`-`0xDF`, which are assigned to
    /// ISO/IEC 13818-3 and ISO/IEC 11172-3 audio streams
    pub fn is_mpeg_audio(stream_id: u8) -> bool {
        (0xc0..=0xdf).contains(&stream_id)
    }

    /// The 24-bit _packet_start_code_prefix_, which must be `0x000001`
    pub fn start_code(&self) -> u32 {
        u32::from(self.buf[0]) << 16 | u32::from(self.buf[1]) << 8 | u32::from(self.buf[2])
    }

    /// Indicator of the type of stream per _ISO/IEC 13818-1_, _Table 2-18_.
    pub fn stream_id(&self) -> u8 {
        self.buf[3]
    }

    /// The number of bytes in the PES packet following this field.  The value `0` means
    /// 'unbounded'.
    pub fn pes_packet_length(&self) -> u16 {
        u16::from(self.buf[4]) << 8 | u16::from(self.buf[5])
    }

    /// The two marker bits at the start of the flags, expected to be `0b10`
    pub fn check_bits(&self) -> u8 {
        self.buf[6] >> 6
    }
    /// _PES_scrambling_control_; `0` means not scrambled
    pub fn scrambling_control(&self) -> u8 {
        self.buf[6] >> 4 & 0b11
    }
    /// value 1 indicates higher priority and 0 indicates lower priority
    pub fn pes_priority(&self) -> bool {
        self.buf[6] & 0b1000 != 0
    }
    /// if `true`, an audio frame starts immediately at the beginning of the PES payload
    pub fn data_alignment_indicator(&self) -> bool {
        self.buf[6] & 0b100 != 0
    }
    /// if `true`, the material is protected by copyright
    pub fn copyright(&self) -> bool {
        self.buf[6] & 0b10 != 0
    }
    /// if `true` the content is original, otherwise a copy
    pub fn original_or_copy(&self) -> bool {
        self.buf[6] & 0b1 != 0
    }
    /// _PTS_DTS_flags_: `0b10` PTS only, `0b11` both, `0b00` neither
    pub fn pts_dts_flags(&self) -> u8 {
        self.buf[7] >> 6
    }
    /// _PES_header_data_length_, the number of bytes of optional fields (and stuffing) which
    /// precede the payload
    pub fn header_data_length(&self) -> usize {
        self.buf[8] as usize
    }

    /// The Presentation Time Stamp, in units of `PTS_TIMEBASE`.
    ///
    /// `None` unless _PTS_DTS_flags_ announces a PTS, the 5 PTS bytes lie within the header data,
    /// and all three of its marker bits are set.
    pub fn pts(&self) -> Option<u64> {
        const PTS_SIZE: usize = 5;
        if self.pts_dts_flags() & 0b10 == 0 || self.header_data_length() < PTS_SIZE {
            return None;
        }
        let b = self.buf.get(Self::PAYLOAD_OFFSET..Self::PAYLOAD_OFFSET + PTS_SIZE)?;
        // 3, 15 and 15 bit groups of the 33-bit value, each followed by a marker bit
        if b[0] & b[2] & b[4] & 1 == 0 {
            return None;
        }
        let high = u64::from(b[0] >> 1 & 0b111);
        let mid = u64::from(b[1]) << 7 | u64::from(b[2] >> 1);
        let low = u64::from(b[3]) << 7 | u64::from(b[4] >> 1);
        Some(high << 30 | mid << 15 | low)
    }

    /// The elementary stream bytes in this buffer, following the header and its optional
    /// fields.
    pub fn payload(&self) -> Result<&'buf [u8], PesError> {
        let start = Self::PAYLOAD_OFFSET + self.header_data_length();
        if start > self.buf.len() {
            Err(PesError::NotEnoughData {
                requested: start,
                available: self.buf.len(),
            })
        } else {
            Ok(&self.buf[start..])
        }
    }
}

impl<'buf> fmt::Debug for PesHeader<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PesHeader")
            .field("stream_id", &format_args!("{:#x}", self.stream_id()))
            .field("pes_packet_length", &self.pes_packet_length())
            .field("pes_priority", &self.pes_priority())
            .field("data_alignment_indicator", &self.data_alignment_indicator())
            .field("copyright", &self.copyright())
            .field("original_or_copy", &self.original_or_copy())
            .field("header_data_length", &self.header_data_length())
            .field("pts", &self.pts())
            .finish()
    }
}

/// Recovers elementary stream bytes from the successive TS payloads of a single PID.
///
/// The first valid MPEG audio stream id seen is locked in (unless one was supplied up front),
/// and PES packets for any other stream id are ignored from then on.  The reassembler tracks
/// how many bytes of the current PES packet are still expected, so that trailing bytes of a TS
/// payload beyond the end of the PES packet are not passed on.  A PES packet declaring length
/// `0` is unbounded: its payloads are passed on whole until the next payload start.
#[derive(Debug)]
pub struct PesReassembler {
    stream_id: Option<u8>,
    remaining: Option<usize>,
}

impl Default for PesReassembler {
    fn default() -> PesReassembler {
        PesReassembler::new(None)
    }
}

impl PesReassembler {
    /// Create a reassembler, optionally already locked to the given stream id.
    pub fn new(stream_id: Option<u8>) -> PesReassembler {
        PesReassembler {
            stream_id,
            remaining: Some(0),
        }
    }

    /// The stream id being extracted, once known
    pub fn stream_id(&self) -> Option<u8> {
        self.stream_id
    }

    /// The number of elementary stream bytes still expected in the current PES packet, or
    /// `None` if the current PES packet is unbounded
    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    /// Process the payload of one TS packet from the tracked PID, returning the elementary
    /// stream bytes it carries (if any).
    pub fn push<'a>(
        &mut self,
        pid: Pid,
        payload_start: bool,
        payload: &'a [u8],
    ) -> Option<&'a [u8]> {
        let es = if payload_start {
            self.begin_packet(pid, payload)?
        } else {
            self.continue_packet(payload)?
        };
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(es.len());
        }
        if es.is_empty() {
            None
        } else {
            Some(es)
        }
    }

    fn begin_packet<'a>(&mut self, pid: Pid, payload: &'a [u8]) -> Option<&'a [u8]> {
        let header = match PesHeader::audio_from_bytes(payload) {
            Ok(header) => header,
            Err(e) => {
                warn!("Invalid PES header (pid: {}): {}", pid, e);
                self.remaining = Some(0);
                return None;
            }
        };
        let stream_id = header.stream_id();
        match self.stream_id {
            None => {
                info!(
                    "Found valid PES audio packet (pid: {}, stream id: 0x{:x}, length: {})",
                    pid,
                    stream_id,
                    header.pes_packet_length()
                );
                self.stream_id = Some(stream_id);
            }
            Some(locked) if locked != stream_id => {
                warn!(
                    "Ignoring additional audio stream id 0x{:x} (pid: {})",
                    stream_id, pid
                );
                self.remaining = Some(0);
                return None;
            }
            Some(_) => (),
        }
        if let Some(pts) = header.pts() {
            debug!(
                "pid {}: PES packet PTS {:.3}s",
                pid,
                pts as f64 / PesHeader::PTS_TIMEBASE as f64
            );
        }
        self.remaining = match header.pes_packet_length() {
            0 => None,
            len => Some(usize::from(len).saturating_sub(2 + header.header_data_length())),
        };
        header.payload().ok()
    }

    fn continue_packet<'a>(&mut self, payload: &'a [u8]) -> Option<&'a [u8]> {
        // nothing to reassemble until the start of a PES packet has been seen
        self.stream_id?;
        match self.remaining {
            Some(remaining) => Some(&payload[..payload.len().min(remaining)]),
            None => Some(payload),
        }
    }
}
