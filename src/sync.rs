//! Locating the first audio frame header within the reassembled elementary stream, and gating
//! output until one has been found.

use crate::mpa::{FrameInfo, FrameParser};
use log::{debug, info};

/// Scans elementary stream data for an audio frame header, and passes data through once one has
/// been found.
///
/// Synchronisation persists until `lose_sync()` is called (on a continuity error, for example),
/// after which scanning resumes with the next data pushed.
#[derive(Debug)]
pub struct FrameSynchronizer {
    synced: bool,
    never_synced: bool,
    frame: Option<FrameInfo>,
}

impl Default for FrameSynchronizer {
    fn default() -> FrameSynchronizer {
        FrameSynchronizer {
            synced: false,
            never_synced: true,
            frame: None,
        }
    }
}

impl FrameSynchronizer {
    /// Create a synchroniser which has not yet found any frame
    pub fn new() -> FrameSynchronizer {
        FrameSynchronizer::default()
    }

    /// `true` while data is being passed through
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// `true` if a frame header has been found at any point so far
    pub fn has_synced(&self) -> bool {
        !self.never_synced
    }

    /// The header of the frame at which synchronisation was most recently (re)acquired
    pub fn frame(&self) -> Option<&FrameInfo> {
        self.frame.as_ref()
    }

    /// Stop passing data through until another frame header is found
    pub fn lose_sync(&mut self) {
        self.synced = false;
    }

    /// Returns the part of `es` which should be written out: nothing while still searching for a
    /// frame header, everything from the header onwards once it is found.
    pub fn push<'a, P: FrameParser + ?Sized>(
        &mut self,
        parser: &P,
        es: &'a [u8],
    ) -> Option<&'a [u8]> {
        let mut offset = 0;
        while !self.synced && es.len() - offset >= FrameInfo::HEADER_SIZE {
            match parser.parse_frame(&es[offset..]) {
                Some(frame) => {
                    if self.never_synced {
                        info!("Found MPEG audio frame: {}", frame);
                        self.never_synced = false;
                    } else {
                        info!("Regained sync");
                    }
                    debug!("frame header found after skipping {} bytes", offset);
                    self.frame = Some(frame);
                    self.synced = true;
                }
                None => offset += 1,
            }
        }
        if self.synced && offset < es.len() {
            Some(&es[offset..])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mpa::MpaHeaderParser;

    const HEADER: [u8; 4] = [0xff, 0xfd, 0x84, 0x04];

    #[test]
    fn skips_to_first_header() {
        let mut sync = FrameSynchronizer::new();
        let mut es = vec![0x00, 0x12, 0xff, 0x00];
        es.extend_from_slice(&HEADER);
        es.extend_from_slice(b"audio");
        assert_eq!(sync.push(&MpaHeaderParser, &es[..]), Some(&es[4..]));
        assert!(sync.is_synced());
        assert!(sync.has_synced());
        assert_eq!(sync.frame().map(|f| f.frame_size), Some(384));
    }

    #[test]
    fn passes_everything_once_synced() {
        let mut sync = FrameSynchronizer::new();
        assert!(sync.push(&MpaHeaderParser, &HEADER[..]).is_some());
        assert_eq!(sync.push(&MpaHeaderParser, b"xyz"), Some(&b"xyz"[..]));
        assert_eq!(sync.push(&MpaHeaderParser, b""), None);
    }

    #[test]
    fn short_data_dropped_while_searching() {
        let mut sync = FrameSynchronizer::new();
        // a header split across two pushes is not found
        assert_eq!(sync.push(&MpaHeaderParser, &HEADER[..2]), None);
        assert_eq!(sync.push(&MpaHeaderParser, &HEADER[2..]), None);
        assert!(!sync.is_synced());
        assert!(!sync.has_synced());
    }

    #[test]
    fn regain_after_loss() {
        let mut sync = FrameSynchronizer::new();
        assert!(sync.push(&MpaHeaderParser, &HEADER[..]).is_some());
        sync.lose_sync();
        assert!(!sync.is_synced());
        assert_eq!(sync.push(&MpaHeaderParser, b"garbage"), None);
        let mut es = b"gap".to_vec();
        es.extend_from_slice(&HEADER);
        assert_eq!(sync.push(&MpaHeaderParser, &es[..]), Some(&HEADER[..]));
        assert!(sync.is_synced());
        assert!(sync.has_synced());
    }

    struct MarkerParser;
    impl FrameParser for MarkerParser {
        fn parse_frame(&self, buf: &[u8]) -> Option<FrameInfo> {
            if buf.starts_with(b"SYNC") {
                FrameInfo::from_bytes(&HEADER[..]).ok()
            } else {
                None
            }
        }
    }

    #[test]
    fn custom_parser() {
        let mut sync = FrameSynchronizer::new();
        assert_eq!(sync.push(&MarkerParser, b"..SYNC.."), Some(&b"SYNC.."[..]));
    }
}
