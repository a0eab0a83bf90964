//! Parser for the 4-byte header at the start of every MPEG-1, MPEG-2 and MPEG-2.5 audio frame
//! (Layers I, II and III).
//!
//! [`FrameInfo::from_bytes()`](struct.FrameInfo.html#method.from_bytes) decodes a header and
//! derives the size of the frame it introduces.  The [`FrameParser`](trait.FrameParser.html)
//! trait is the seam through which the frame synchroniser asks "does a frame start here?".

use std::fmt;

/// Problems found while decoding an MPEG audio frame header
#[derive(Debug, PartialEq, Eq)]
pub enum FrameHeaderError {
    /// Fewer than 4 bytes available
    NotEnoughData(usize),
    /// The first 11 bits were not all `1`
    BadSyncWord(u16),
    /// The version bits have the reserved value `0b01`
    ReservedVersion,
    /// The layer bits have the reserved value `0b00`
    ReservedLayer,
    /// Bitrate index `0` (free format) or `15` (forbidden)
    BadBitrate(u8),
    /// Sample rate index `3`
    ReservedSampleRate,
    /// Emphasis value `0b10`
    ReservedEmphasis,
}

/// Version of the MPEG audio standard the frame conforms to
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MpegVersion {
    /// ISO/IEC 11172-3
    Mpeg1,
    /// ISO/IEC 13818-3 low sample rate extension
    Mpeg2,
    /// Unofficial 'MPEG-2.5' extension to even lower sample rates
    Mpeg25,
}

/// MPEG audio coding layer
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Layer {
    /// Layer I
    I,
    /// Layer II
    II,
    /// Layer III
    III,
}

/// Channel arrangement of the frame
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[allow(missing_docs)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

/// De-emphasis to be applied on playback
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Emphasis {
    /// no emphasis
    None,
    /// 50/15 microseconds
    FiftyFifteen,
    /// CCITT J.17
    CcittJ17,
}

// kbps, indexed by the 4-bit bitrate_index (index 0 is 'free format')
const BITRATE_V1_L1: [u16; 15] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
];
const BITRATE_V1_L2: [u16; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
];
const BITRATE_V1_L3: [u16; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const BITRATE_V2_L1: [u16; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
];
const BITRATE_V2_L23: [u16; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

const SAMPLE_RATE_V1: [u32; 3] = [44100, 48000, 32000];

/// The decoded fields of an MPEG audio frame header, plus values derived from them.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FrameInfo {
    /// MPEG version
    pub version: MpegVersion,
    /// coding layer
    pub layer: Layer,
    /// true if a 16-bit CRC follows the header
    pub has_crc: bool,
    /// bitrate in kbit/s
    pub bitrate: u16,
    /// sample rate in Hz
    pub sample_rate: u32,
    /// true if the frame carries an extra padding slot
    pub padding: bool,
    /// the header's private bit
    pub private: bool,
    /// channel arrangement
    pub channel_mode: ChannelMode,
    /// joint-stereo mode extension bits
    pub mode_extension: u8,
    /// copyright flag
    pub copyright: bool,
    /// original/copy flag
    pub original: bool,
    /// de-emphasis
    pub emphasis: Emphasis,
    /// number of PCM samples (per channel) the frame decodes to
    pub samples_per_frame: u32,
    /// total frame size in bytes, including this header
    pub frame_size: usize,
}

impl FrameInfo {
    /// Size of an MPEG audio frame header
    pub const HEADER_SIZE: usize = 4;

    /// Decode the frame header at the start of `buf`.
    ///
    /// Free-format streams (bitrate index `0`) are rejected, since their frame size cannot be
    /// derived from the header alone.
    pub fn from_bytes(buf: &[u8]) -> Result<FrameInfo, FrameHeaderError> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(FrameHeaderError::NotEnoughData(buf.len()));
        }
        let sync = u16::from(buf[0]) << 3 | u16::from(buf[1] >> 5);
        if sync != 0x7ff {
            return Err(FrameHeaderError::BadSyncWord(sync));
        }
        let version = match buf[1] >> 3 & 0b11 {
            0b00 => MpegVersion::Mpeg25,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return Err(FrameHeaderError::ReservedVersion),
        };
        let layer = match buf[1] >> 1 & 0b11 {
            0b01 => Layer::III,
            0b10 => Layer::II,
            0b11 => Layer::I,
            _ => return Err(FrameHeaderError::ReservedLayer),
        };
        let has_crc = buf[1] & 1 == 0;

        let bitrate_index = buf[2] >> 4;
        if bitrate_index == 0 || bitrate_index == 0b1111 {
            return Err(FrameHeaderError::BadBitrate(bitrate_index));
        }
        let table = match (version, layer) {
            (MpegVersion::Mpeg1, Layer::I) => &BITRATE_V1_L1,
            (MpegVersion::Mpeg1, Layer::II) => &BITRATE_V1_L2,
            (MpegVersion::Mpeg1, Layer::III) => &BITRATE_V1_L3,
            (_, Layer::I) => &BITRATE_V2_L1,
            (_, _) => &BITRATE_V2_L23,
        };
        let bitrate = table[bitrate_index as usize];

        let sample_rate_index = (buf[2] >> 2 & 0b11) as usize;
        if sample_rate_index == 3 {
            return Err(FrameHeaderError::ReservedSampleRate);
        }
        let sample_rate = match version {
            MpegVersion::Mpeg1 => SAMPLE_RATE_V1[sample_rate_index],
            MpegVersion::Mpeg2 => SAMPLE_RATE_V1[sample_rate_index] / 2,
            MpegVersion::Mpeg25 => SAMPLE_RATE_V1[sample_rate_index] / 4,
        };
        let padding = buf[2] & 0b10 != 0;
        let private = buf[2] & 0b1 != 0;

        let channel_mode = match buf[3] >> 6 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };
        let mode_extension = buf[3] >> 4 & 0b11;
        let copyright = buf[3] & 0b1000 != 0;
        let original = buf[3] & 0b100 != 0;
        let emphasis = match buf[3] & 0b11 {
            0b00 => Emphasis::None,
            0b01 => Emphasis::FiftyFifteen,
            0b11 => Emphasis::CcittJ17,
            _ => return Err(FrameHeaderError::ReservedEmphasis),
        };

        let samples_per_frame = match (version, layer) {
            (_, Layer::I) => 384,
            (_, Layer::II) | (MpegVersion::Mpeg1, Layer::III) => 1152,
            (_, Layer::III) => 576,
        };
        let bits_per_second = u32::from(bitrate) * 1000;
        let pad = u32::from(padding);
        let frame_size = match layer {
            Layer::I => (12 * bits_per_second / sample_rate + pad) * 4,
            _ => samples_per_frame / 8 * bits_per_second / sample_rate + pad,
        };

        Ok(FrameInfo {
            version,
            layer,
            has_crc,
            bitrate,
            sample_rate,
            padding,
            private,
            channel_mode,
            mode_extension,
            copyright,
            original,
            emphasis,
            samples_per_frame,
            frame_size: frame_size as usize,
        })
    }

    /// Playback duration of the frame, in seconds
    pub fn duration(&self) -> f64 {
        f64::from(self.samples_per_frame) / f64::from(self.sample_rate)
    }
}

impl fmt::Display for MpegVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MpegVersion::Mpeg1 => "MPEG-1",
            MpegVersion::Mpeg2 => "MPEG-2",
            MpegVersion::Mpeg25 => "MPEG-2.5",
        })
    }
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Layer {:?}, {} kbps, {} Hz, {:?}",
            self.version, self.layer, self.bitrate, self.sample_rate, self.channel_mode
        )?;
        if self.has_crc {
            f.write_str(", CRC")?;
        }
        if self.copyright {
            f.write_str(", copyright")?;
        }
        if self.original {
            f.write_str(", original")?;
        }
        if self.emphasis != Emphasis::None {
            write!(f, ", emphasis {:?}", self.emphasis)?;
        }
        write!(f, ", framesize {} bytes", self.frame_size)
    }
}

/// Recognises the start of an audio frame.
///
/// The frame synchroniser calls `parse_frame()` at successive byte offsets of the elementary
/// stream until a frame is found.
pub trait FrameParser {
    /// Returns details of the frame starting at `buf[0]`, or `None` if no valid frame header is
    /// present there.
    fn parse_frame(&self, buf: &[u8]) -> Option<FrameInfo>;
}

/// The default `FrameParser`, accepting any valid MPEG audio frame header.
#[derive(Debug, Default, Clone, Copy)]
pub struct MpaHeaderParser;

impl FrameParser for MpaHeaderParser {
    fn parse_frame(&self, buf: &[u8]) -> Option<FrameInfo> {
        FrameInfo::from_bytes(buf).ok()
    }
}
