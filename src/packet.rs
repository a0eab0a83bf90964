//! A [`Packet`](./struct.Packet.html) view over a single 188 byte MPEG Transport Stream packet,
//! plus the small value types (`Pid`, `ContinuityCounter`, ...) that its header fields decode to.

use log::warn;
use std::cmp::Ordering;
use std::fmt;

/// the different values indicating whether a `Packet`'s `payload()` method will return `Some`
/// or `None`.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AdaptationControl {
    /// This value is used if the transport stream packet `adaptation_control` field uses the value
    /// `0b00`, which is not defined by ISO/IEC 13818-1.
    Reserved,
    /// indicates that this packet contains a payload, but not an adaptation field
    PayloadOnly,
    /// indicates that this packet contains an adaptation field, but not a payload
    AdaptationFieldOnly,
    /// indicates that this packet contains both an adaptation field and a payload
    AdaptationFieldAndPayload,
}

impl AdaptationControl {
    #[inline(always)]
    fn from(val: u8) -> AdaptationControl {
        match val & 0b11 {
            0 => AdaptationControl::Reserved,
            1 => AdaptationControl::PayloadOnly,
            2 => AdaptationControl::AdaptationFieldOnly,
            _ => AdaptationControl::AdaptationFieldAndPayload,
        }
    }

    /// True if this AdaptationControl variant indicates that the packet will have a payload
    #[inline(always)]
    pub fn has_payload(self) -> bool {
        match self {
            AdaptationControl::Reserved | AdaptationControl::AdaptationFieldOnly => false,
            AdaptationControl::PayloadOnly | AdaptationControl::AdaptationFieldAndPayload => true,
        }
    }
}

/// Indicates content scrambling in use, if any.
///
/// Actual content scrambling schemes, indicated through the `u8` value in the `Undefined`
/// variant, are not defined by ISO/IEC 13818-1.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TransportScramblingControl {
    /// The stream is not scrambled.
    NotScrambled,
    /// The stream is scrambled using a scheme not defined by ISO/IEC 13818-1.
    Undefined(u8),
}

impl TransportScramblingControl {
    fn from(val: u8) -> TransportScramblingControl {
        match val & 0b11 {
            0 => TransportScramblingControl::NotScrambled,
            v => TransportScramblingControl::Undefined(v),
        }
    }

    /// `true` for any value other than `NotScrambled`
    pub fn is_scrambled(self) -> bool {
        self != TransportScramblingControl::NotScrambled
    }
}

/// A counter value used within a transport stream to detect discontinuities in a sequence of
/// packets.
///
/// See [`Packet.continuity_counter()`](struct.Packet.html#method.continuity_counter)
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ContinuityCounter {
    val: u8,
}

impl From<u8> for ContinuityCounter {
    #[inline]
    fn from(count: u8) -> ContinuityCounter {
        ContinuityCounter::new(count)
    }
}

impl ContinuityCounter {
    /// Panics if the given value is greater than 15.
    #[inline]
    pub fn new(count: u8) -> ContinuityCounter {
        assert!(count < 0b10000);
        ContinuityCounter { val: count }
    }

    /// Returns this counter's value, which will be between 0 and 15 inclusive.
    #[inline]
    pub fn count(self) -> u8 {
        self.val
    }

    /// The counter value expected to follow this one.  The maximum counter value is 15, after
    /// which the counter 'wraps around':
    ///
    /// ```rust
    /// # use ts2mpa::packet::ContinuityCounter;
    /// assert_eq!(ContinuityCounter::new(15).next(), ContinuityCounter::new(0));
    /// ```
    #[inline]
    pub fn next(self) -> ContinuityCounter {
        ContinuityCounter {
            val: (self.val + 1) & 0b1111,
        }
    }

    /// true iff the given `ContinuityCounter` value follows this one.
    #[inline]
    pub fn follows(self, other: ContinuityCounter) -> bool {
        other.next() == self
    }
}

/// A Packet Identifier value, between `0x0000` and `0x1fff`.
///
/// PID values identify a particular sub-stream within the overall Transport Stream.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Pid(u16);
impl Pid {
    /// The largest possible PID value, `0x1fff`.
    pub const MAX_VALUE: u16 = 0x1fff;

    /// PID `0x1fff`, reserved for 'null' packets which pad out the transport stream and never
    /// carry anything of interest.
    pub const STUFFING: Pid = Pid::new(0x1fff);

    /// Panics if the given value is greater than `Pid::MAX_VALUE`.
    pub const fn new(pid: u16) -> Pid {
        assert!(pid <= 0x1fff);
        Pid(pid)
    }

    /// true for the null-packet PID, `0x1fff`
    pub fn is_stuffing(self) -> bool {
        self == Pid::STUFFING
    }
}
impl TryFrom<u16> for Pid {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Pid::MAX_VALUE {
            Ok(Pid(value))
        } else {
            Err(())
        }
    }
}
impl From<Pid> for u16 {
    #[inline]
    fn from(pid: Pid) -> Self {
        pid.0
    }
}
impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "Pid({:04x})", self.0)
    }
}
impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// Problems which prevent a byte slice being viewed as a transport stream `Packet`
#[derive(Debug, PartialEq, Eq)]
pub enum PacketError {
    /// The given buffer is smaller than `Packet::SIZE`
    ShortBuffer {
        /// the number of bytes required
        requested: usize,
        /// the number of bytes actually given
        available: usize,
    },
    /// The first byte of the buffer is not `Packet::SYNC_BYTE`, meaning the reader has lost
    /// packet alignment (or the data is not a transport stream at all)
    BadSyncByte(u8),
}

/// A transport stream `Packet` is a wrapper around a byte slice which allows the bytes to be
/// interpreted as a packet structure per _ISO/IEC 13818-1, Section 2.4.3.3_.
pub struct Packet<'buf> {
    buf: &'buf [u8],
}

const FIXED_HEADER_SIZE: usize = 4;
// when AF present, a 1-byte 'length' field precedes the content,
const ADAPTATION_FIELD_OFFSET: usize = FIXED_HEADER_SIZE + 1;

impl<'buf> Packet<'buf> {
    /// The value `0x47`, which must appear in the first byte of every transport stream packet.
    pub const SYNC_BYTE: u8 = 0x47;

    /// The fixed 188 byte size of a transport stream packet.
    pub const SIZE: usize = 188;

    /// returns `true` if the given value is a valid synchronisation byte, the value
    /// `Packet::SYNC_BYTE` (0x47), which must appear at the start of every transport stream
    /// packet.
    #[inline(always)]
    pub fn is_sync_byte(b: u8) -> bool {
        b == Self::SYNC_BYTE
    }

    /// Wraps the first `Packet::SIZE` bytes of the given buffer.
    ///
    /// Fails with `PacketError::ShortBuffer` if fewer than 188 bytes are given, or with
    /// `PacketError::BadSyncByte` if the first byte is not `0x47`.  All header accessors are
    /// infallible once a `Packet` exists.
    #[inline(always)]
    pub fn from_bytes(buf: &'buf [u8]) -> Result<Packet<'buf>, PacketError> {
        if buf.len() < Self::SIZE {
            return Err(PacketError::ShortBuffer {
                requested: Self::SIZE,
                available: buf.len(),
            });
        }
        if !Packet::is_sync_byte(buf[0]) {
            return Err(PacketError::BadSyncByte(buf[0]));
        }
        Ok(Packet {
            buf: &buf[..Self::SIZE],
        })
    }

    /// *May* have been set if some previous processing of this TS data detected at least
    /// 1 uncorrectable bit error in this TS packet.
    #[inline]
    pub fn transport_error_indicator(&self) -> bool {
        self.buf[1] & 0b1000_0000 != 0
    }

    /// a structure larger than a single packet payload needs to be split across multiple packets,
    /// `payload_unit_start_indicator()` indicates if this packet payload contains the start of
    /// the structure.  If `false`, this packet's payload is a continuation of a structure which
    /// began in an earlier packet within the transport stream.
    #[inline]
    pub fn payload_unit_start_indicator(&self) -> bool {
        self.buf[1] & 0b0100_0000 != 0
    }

    /// When `true`, this TS packet has higher priority than other packets of the same PID.
    pub fn transport_priority(&self) -> bool {
        self.buf[1] & 0b0010_0000 != 0
    }

    /// The sub-stream to which a particular packet belongs is indicated by this Packet Identifier
    /// value.
    #[inline]
    pub fn pid(&self) -> Pid {
        Pid(u16::from(self.buf[1] & 0b0001_1111) << 8 | u16::from(self.buf[2]))
    }

    /// Value of the _transport_scrambling_control_ field.
    pub fn transport_scrambling_control(&self) -> TransportScramblingControl {
        TransportScramblingControl::from(self.buf[3] >> 6)
    }

    /// The returned enum value indicates if `payload()` may return something.
    #[inline]
    pub fn adaptation_control(&self) -> AdaptationControl {
        AdaptationControl::from(self.buf[3] >> 4)
    }

    /// Each packet with a given `pid()` value within a transport stream should have a continuity
    /// counter value which increases by 1 from the last counter value seen.
    #[inline]
    pub fn continuity_counter(&self) -> ContinuityCounter {
        ContinuityCounter::new(self.buf[3] & 0b0000_1111)
    }

    /// The value of the _adaptation_field_length_ byte.  Only meaningful when
    /// `adaptation_control()` indicates that an adaptation field is present.
    pub fn adaptation_field_length(&self) -> usize {
        self.buf[4] as usize
    }

    /// The data contained within the packet, not including the packet headers or any
    /// adaptation field.
    ///
    /// `None` is returned if `adaptation_control()` indicates that no payload is present, or if
    /// the adaptation field length leaves no room for any payload bytes.  If `Some` payload is
    /// returned, it is guaranteed not to be an empty slice.
    #[inline(always)]
    pub fn payload(&self) -> Option<&'buf [u8]> {
        match self.adaptation_control() {
            AdaptationControl::Reserved | AdaptationControl::AdaptationFieldOnly => None,
            AdaptationControl::PayloadOnly | AdaptationControl::AdaptationFieldAndPayload => {
                self.mk_payload()
            }
        }
    }

    #[inline]
    fn mk_payload(&self) -> Option<&'buf [u8]> {
        let offset = self.content_offset();
        let len = self.buf.len();
        match offset.cmp(&len) {
            Ordering::Equal => {
                warn!("{:?}: no payload data present", self.pid());
                None
            }
            Ordering::Greater => {
                warn!(
                    "{:?}: adaptation_field_length {} too large",
                    self.pid(),
                    self.adaptation_field_length()
                );
                None
            }
            Ordering::Less => Some(&self.buf[offset..]),
        }
    }

    /// borrow a reference to the underlying buffer of this packet
    pub fn buffer(&self) -> &'buf [u8] {
        self.buf
    }

    #[inline]
    fn content_offset(&self) -> usize {
        match self.adaptation_control() {
            AdaptationControl::Reserved | AdaptationControl::PayloadOnly => FIXED_HEADER_SIZE,
            AdaptationControl::AdaptationFieldOnly
            | AdaptationControl::AdaptationFieldAndPayload => {
                ADAPTATION_FIELD_OFFSET + self.adaptation_field_length()
            }
        }
    }
}

impl<'buf> fmt::Debug for Packet<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("pid", &self.pid())
            .field("transport_error_indicator", &self.transport_error_indicator())
            .field(
                "payload_unit_start_indicator",
                &self.payload_unit_start_indicator(),
            )
            .field("transport_scrambling_control", &self.transport_scrambling_control())
            .field("adaptation_control", &self.adaptation_control())
            .field("continuity_counter", &self.continuity_counter().count())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use crate::packet::*;
    use assert_matches::assert_matches;
    use hex_literal::hex;

    #[test]
    fn pid() {
        assert!(Pid::try_from(0x2000).is_err());
        assert_eq!(Pid::try_from(0x1fff), Ok(Pid::STUFFING));
        assert!(Pid::new(0x1fff).is_stuffing());
        assert_eq!(format!("{}", Pid::new(436)), "436");
    }

    #[test]
    fn zero_len() {
        let buf = [0u8; 0];
        assert_matches!(
            Packet::from_bytes(&buf[..]),
            Err(PacketError::ShortBuffer {
                requested: 188,
                available: 0
            })
        );
    }

    #[test]
    fn bad_sync_byte() {
        let buf = [0u8; Packet::SIZE];
        assert_matches!(
            Packet::from_bytes(&buf[..]),
            Err(PacketError::BadSyncByte(0))
        );
    }

    #[test]
    fn longer_buffer_is_truncated() {
        let mut buf = [0u8; Packet::SIZE + 10];
        buf[0] = Packet::SYNC_BYTE;
        buf[3] = 0b0001_0000;
        let pk = Packet::from_bytes(&buf[..]).unwrap();
        assert_eq!(pk.buffer().len(), Packet::SIZE);
        assert_eq!(pk.payload().unwrap().len(), Packet::SIZE - 4);
    }

    #[test]
    fn test_xmas_tree() {
        let mut buf = [0xffu8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[4] = 28; // adaptation_field_length
        let pk = Packet::from_bytes(&buf[..]).unwrap();
        assert_eq!(u16::from(pk.pid()), 0b1111111111111u16);
        assert!(pk.transport_error_indicator());
        assert!(pk.payload_unit_start_indicator());
        assert!(pk.transport_priority());
        assert_eq!(
            pk.transport_scrambling_control(),
            TransportScramblingControl::Undefined(3)
        );
        assert!(pk.transport_scrambling_control().is_scrambled());
        assert_eq!(
            pk.adaptation_control(),
            AdaptationControl::AdaptationFieldAndPayload
        );
        assert_eq!(pk.continuity_counter().count(), 0b1111);
        assert_eq!(pk.adaptation_field_length(), 28);
        assert_eq!(pk.payload().unwrap().len(), Packet::SIZE - 5 - 28);
    }

    #[test]
    fn all_clear() {
        let mut buf = [0u8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[1] = 0x01;
        buf[2] = 0xb4;
        buf[3] = 0b0001_0111;
        let pk = Packet::from_bytes(&buf[..]).unwrap();
        assert_eq!(pk.pid(), Pid::new(436));
        assert!(!pk.transport_error_indicator());
        assert!(!pk.payload_unit_start_indicator());
        assert!(!pk.transport_priority());
        assert_eq!(
            pk.transport_scrambling_control(),
            TransportScramblingControl::NotScrambled
        );
        assert_eq!(pk.adaptation_control(), AdaptationControl::PayloadOnly);
        assert_eq!(pk.continuity_counter().count(), 7);
        assert_eq!(pk.payload(), Some(&buf[4..]));
    }

    #[test]
    fn audio_pes_start() {
        // adaptation field with PCR, then the start of an MPEG audio PES packet
        let head = hex!("4741B435 07 50 00007B0C7E00 000001C0 0F8C 8080 05 210007D861 FFFD8404");
        let mut buf = [0xaau8; Packet::SIZE];
        buf[..head.len()].copy_from_slice(&head);
        let pk = Packet::from_bytes(&buf[..]).unwrap();
        assert_eq!(pk.pid(), Pid::new(0x1b4));
        assert!(pk.payload_unit_start_indicator());
        assert_eq!(pk.continuity_counter().count(), 5);
        assert_eq!(pk.adaptation_field_length(), 7);
        let payload = pk.payload().unwrap();
        assert_eq!(payload.len(), Packet::SIZE - 12);
        assert_eq!(&payload[..4], &hex!("000001C0"));
    }

    #[test]
    fn adaptation_field_only() {
        let mut buf = [0u8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[3] = 0b0010_0000;
        buf[4] = 183;
        let pk = Packet::from_bytes(&buf[..]).unwrap();
        assert_eq!(pk.adaptation_control(), AdaptationControl::AdaptationFieldOnly);
        assert!(!pk.adaptation_control().has_payload());
        assert!(pk.payload().is_none());
    }

    #[test]
    fn reserved_adaptation_control() {
        let mut buf = [0u8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        let pk = Packet::from_bytes(&buf[..]).unwrap();
        assert_eq!(pk.adaptation_control(), AdaptationControl::Reserved);
        assert!(pk.payload().is_none());
    }

    #[test]
    fn adaptation_field_fills_packet() {
        let mut buf = [0u8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[3] = 0b0011_0000;
        buf[4] = 183;
        let pk = Packet::from_bytes(&buf[..]).unwrap();
        assert!(pk.payload().is_none());
        buf[4] = 200;
        let pk = Packet::from_bytes(&buf[..]).unwrap();
        assert!(pk.payload().is_none());
        buf[4] = 182;
        let pk = Packet::from_bytes(&buf[..]).unwrap();
        assert_eq!(pk.payload().map(|p| p.len()), Some(1));
    }

    #[test]
    fn continuity_counter_wraps() {
        let a = ContinuityCounter::new(0);
        let b = ContinuityCounter::new(15);
        assert!(a.follows(b));
        assert!(!b.follows(a));
        assert_eq!(ContinuityCounter::from(3).next().count(), 4);
    }

    #[test]
    #[should_panic]
    fn continuity_counter_too_large() {
        ContinuityCounter::new(16);
    }
}
