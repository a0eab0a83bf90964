//! The packet-read loop which ties the other modules together: selecting the PID which carries
//! audio, checking continuity, reassembling PES payloads, synchronising on audio frames and
//! writing the result out.
//!
//! ```rust,no_run
//! use std::fs::File;
//! use ts2mpa::demultiplex::{CancellationToken, Demultiplex, DemuxOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = File::open("radio.ts")?;
//! let output = File::create("radio.mp2")?;
//! let mut demux = Demultiplex::new(DemuxOptions::default());
//! let report = demux.run(input, output, &CancellationToken::new())?;
//! eprintln!("Total written: {} bytes", report.bytes_written);
//! # Ok(())
//! # }
//! ```

use crate::continuity::ContinuityCheck;
use crate::mpa::{FrameInfo, FrameParser, MpaHeaderParser};
use crate::packet::{Packet, PacketError, Pid};
use crate::pes::{PesHeader, PesReassembler};
use crate::sync::FrameSynchronizer;
use log::{debug, error, info, trace, warn};
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run options, fixed for the lifetime of a `Demultiplex`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DemuxOptions {
    /// Extract from this PID, rather than the first PID found to carry MPEG audio PES data
    pub pid: Option<Pid>,
    /// Extract this PES stream id, rather than the first one seen on the selected PID
    pub stream_id: Option<u8>,
}

/// A flag which may be raised from elsewhere (a signal handler, for instance) to ask a running
/// `Demultiplex::run()` to stop.  The flag is checked once per packet.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token which is not yet cancelled
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }
    /// Request that processing stops; affects every clone of this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
    /// `true` once `cancel()` has been called on this token or any of its clones
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Chooses the single PID from which audio will be extracted.
///
/// Unless configured up front, the PID of the first payload-start packet holding a valid,
/// unscrambled MPEG audio PES header is chosen.  Once chosen, the selection never changes.
#[derive(Debug, Default)]
pub struct PidSelector {
    pid: Option<Pid>,
}

impl PidSelector {
    /// Create a selector, with the PID already chosen if `pid` is `Some`
    pub fn new(pid: Option<Pid>) -> PidSelector {
        PidSelector { pid }
    }

    /// The selected PID, if any
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// Consider the given packet (whose payload is `payload`) as a candidate, returning the
    /// selected PID, if there now is one.
    pub fn offer(&mut self, pk: &Packet<'_>, payload: &[u8]) -> Option<Pid> {
        if self.pid.is_some() {
            return self.pid;
        }
        let pid = pk.pid();
        if !pk.payload_unit_start_indicator() || pid.is_stuffing() {
            return None;
        }
        match PesHeader::audio_from_bytes(payload) {
            Ok(header) => {
                info!("Selected pid {} (stream id: 0x{:x})", pid, header.stream_id());
                self.pid = Some(pid);
            }
            Err(e) => debug!("pid {} not selected: {}", pid, e),
        }
        self.pid
    }
}

/// Why a run came to an end
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StopReason {
    /// All input was consumed
    EndOfInput,
    /// A packet did not start with the TS sync byte.  No attempt is made to find the next packet
    /// boundary, so the rest of the input is left unprocessed.
    LostSync,
    /// The `CancellationToken` was raised
    Cancelled,
}

/// Statistics produced at the end of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// why processing stopped
    pub reason: StopReason,
    /// number of TS packets read (not counting a packet with a bad sync byte)
    pub packets: u64,
    /// number of elementary stream bytes written to the output
    pub bytes_written: u64,
    /// number of continuity errors which interrupted output
    pub discontinuities: u64,
    /// the audio frame header most recently synchronised on
    pub frame: Option<FrameInfo>,
}

/// Failures which stop processing altogether
#[derive(Debug)]
pub enum DemuxError {
    /// Reading the transport stream or writing the elementary stream failed
    Io(io::Error),
}

impl fmt::Display for DemuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemuxError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl StdError for DemuxError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DemuxError::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for DemuxError {
    fn from(err: io::Error) -> Self {
        DemuxError::Io(err)
    }
}

/// Reads whole TS packets from an underlying `io::Read`.
pub struct PacketReader<R> {
    inner: R,
}

impl<R: io::Read> PacketReader<R> {
    /// Wrap the given reader
    pub fn new(inner: R) -> PacketReader<R> {
        PacketReader { inner }
    }

    /// Fill `buf` with the next packet, returning `Ok(false)` at end of input.  An incomplete
    /// packet at the very end of the input is discarded.
    pub fn read_packet(&mut self, buf: &mut [u8; Packet::SIZE]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        if filled == Packet::SIZE {
            Ok(true)
        } else {
            if filled > 0 {
                warn!("Ignoring {} trailing bytes at end of input", filled);
            }
            Ok(false)
        }
    }
}

/// All mutable state of a run, owned by `Demultiplex` and updated once per packet.
#[derive(Debug)]
pub struct DemuxState {
    selector: PidSelector,
    continuity: ContinuityCheck,
    reassembler: PesReassembler,
    sync: FrameSynchronizer,
    packets: u64,
    bytes_written: u64,
    discontinuities: u64,
}

impl DemuxState {
    fn new(options: &DemuxOptions) -> DemuxState {
        DemuxState {
            selector: PidSelector::new(options.pid),
            continuity: ContinuityCheck::new(),
            reassembler: PesReassembler::new(options.stream_id),
            sync: FrameSynchronizer::new(),
            packets: 0,
            bytes_written: 0,
            discontinuities: 0,
        }
    }

    /// The PID audio is being extracted from, once chosen
    pub fn pid(&self) -> Option<Pid> {
        self.selector.pid()
    }
    /// The PES stream id being extracted, once chosen
    pub fn stream_id(&self) -> Option<u8> {
        self.reassembler.stream_id()
    }
    /// `true` while elementary stream data is being written out
    pub fn is_synced(&self) -> bool {
        self.sync.is_synced()
    }
    /// Number of elementary stream bytes still expected in the current PES packet, or `None`
    /// while the current PES packet is unbounded
    pub fn pes_remaining(&self) -> Option<usize> {
        self.reassembler.remaining()
    }
    /// Number of TS packets processed
    pub fn packets(&self) -> u64 {
        self.packets
    }
    /// Number of bytes written to the output
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
    /// Number of continuity errors found while synchronised.  Gaps before the first frame
    /// header is found, or while already searching for one, are not counted.
    pub fn discontinuities(&self) -> u64 {
        self.discontinuities
    }
    /// The most recently synchronised audio frame header
    pub fn frame(&self) -> Option<&FrameInfo> {
        self.sync.frame()
    }
}

/// Extracts a single MPEG audio elementary stream from transport stream packets.
pub struct Demultiplex<P: FrameParser = MpaHeaderParser> {
    state: DemuxState,
    parser: P,
}

impl Demultiplex<MpaHeaderParser> {
    /// Create a demultiplexer which synchronises on any valid MPEG audio frame header
    pub fn new(options: DemuxOptions) -> Demultiplex<MpaHeaderParser> {
        Demultiplex::with_parser(options, MpaHeaderParser)
    }
}

impl<P: FrameParser> Demultiplex<P> {
    /// Create a demultiplexer which uses the given `FrameParser` to find audio frames
    pub fn with_parser(options: DemuxOptions, parser: P) -> Demultiplex<P> {
        Demultiplex {
            state: DemuxState::new(&options),
            parser,
        }
    }

    /// Inspect the state of the demultiplexer
    pub fn state(&self) -> &DemuxState {
        &self.state
    }

    /// Process packets from `input` until it is exhausted, sync is lost, or `cancel` is raised,
    /// writing extracted audio to `output`.
    ///
    /// Output is flushed before returning, whatever the `StopReason`.
    pub fn run<R, W>(
        &mut self,
        input: R,
        output: W,
        cancel: &CancellationToken,
    ) -> Result<Report, DemuxError>
    where
        R: io::Read,
        W: io::Write,
    {
        let mut reader = PacketReader::new(io::BufReader::new(input));
        let mut out = io::BufWriter::new(output);
        let mut buf = [0u8; Packet::SIZE];
        let reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if !reader.read_packet(&mut buf)? {
                break StopReason::EndOfInput;
            }
            if let Some(reason) = self.push_packet(&buf, &mut out)? {
                break reason;
            }
        };
        io::Write::flush(&mut out)?;
        Ok(self.report(reason))
    }

    /// Statistics as of now
    pub fn report(&self, reason: StopReason) -> Report {
        Report {
            reason,
            packets: self.state.packets,
            bytes_written: self.state.bytes_written,
            discontinuities: self.state.discontinuities,
            frame: self.state.sync.frame().cloned(),
        }
    }

    /// Process a single TS packet, writing any audio data it yields to `out`.
    ///
    /// Returns `Ok(Some(StopReason::LostSync))` if the packet does not begin with the sync byte,
    /// in which case nothing else about the packet is examined.
    pub fn push_packet<W: io::Write>(
        &mut self,
        buf: &[u8; Packet::SIZE],
        out: &mut W,
    ) -> Result<Option<StopReason>, DemuxError> {
        let pk = match Packet::from_bytes(&buf[..]) {
            Ok(pk) => pk,
            Err(PacketError::BadSyncByte(b)) => {
                error!(
                    "Lost synchronisation (found {:#04x} after {} packets), aborting",
                    b, self.state.packets
                );
                return Ok(Some(StopReason::LostSync));
            }
            Err(e) => {
                error!("Bad packet: {:?}", e);
                return Ok(Some(StopReason::LostSync));
            }
        };
        self.state.packets += 1;
        trace!("Packets processed: {}", self.state.packets);

        let pid = pk.pid();
        if pid.is_stuffing() {
            return Ok(None);
        }
        let tracked = self.state.selector.pid();
        if tracked.map_or(true, |t| t == pid) {
            if pk.transport_error_indicator() {
                warn!("Transport error in PID {}", pid);
                self.state.sync.lose_sync();
                return Ok(None);
            }
            if pk.transport_scrambling_control().is_scrambled() {
                warn!("PID {} is scrambled", pid);
                return Ok(None);
            }
        }
        let payload = match pk.payload() {
            Some(payload) => payload,
            None => return Ok(None),
        };
        if tracked.is_none() {
            self.state.selector.offer(&pk, payload);
        }
        if self.state.selector.pid() != Some(pid) {
            return Ok(None);
        }

        if let Err(d) = self.state.continuity.check(pk.continuity_counter()) {
            if self.state.sync.is_synced() {
                warn!(
                    "TS continuity error (pid: {}, expected {}, got {})",
                    pid,
                    d.expected.count(),
                    d.actual.count()
                );
                self.state.discontinuities += 1;
                self.state.sync.lose_sync();
            } else {
                debug!("pid {}: continuity counter reset to {}", pid, d.actual.count());
            }
        }

        let es = match self
            .state
            .reassembler
            .push(pid, pk.payload_unit_start_indicator(), payload)
        {
            Some(es) => es,
            None => return Ok(None),
        };
        if let Some(data) = self.state.sync.push(&self.parser, es) {
            out.write_all(data)?;
            self.state.bytes_written += data.len() as u64;
        }
        Ok(None)
    }
}
