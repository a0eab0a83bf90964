//! Extraction of an MPEG audio elementary stream (MPEG-1/2 Layer I, II or III) from an MPEG2
//! Transport Stream, per the _ISO/IEC 13818-1_ and _ISO/IEC 11172-3_ standards.
//!
//! # Design principals
//!
//!  * *Avoid copying and allocating* if possible.  Packets, PES headers and audio frame headers
//!    are all parsed by borrowing slices of the underlying byte buffer, and the elementary stream
//!    bytes written out are sub-slices of the packet just read.
//!  * *No PSI*.  The PAT and PMT are never consulted.  The audio PID is either given up front, or
//!    found by sniffing packet payloads for a PES header with an MPEG audio stream id.
//!  * *Stop on structural damage, warn on everything else*.  Transport errors, scrambling,
//!    continuity gaps and bad PES headers are logged (via the `log` crate) and skipped.  Only a
//!    missing TS sync byte ends processing early, since nothing attempts to re-find the packet
//!    boundaries.
//!
//! The `demultiplex` module ties the other pieces together; most users will only need
//! `demultiplex::Demultiplex`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible, missing_docs)]

pub mod continuity;
pub mod demultiplex;
pub mod mpa;
pub mod packet;
pub mod pes;
pub mod sync;
