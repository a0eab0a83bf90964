//! Detection of lost or repeated packets using the 4-bit _continuity_counter_ of the tracked PID.

use crate::packet::ContinuityCounter;

/// A gap (or repeat) in the sequence of continuity counter values
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Discontinuity {
    /// the counter value which should have appeared next
    pub expected: ContinuityCounter,
    /// the counter value that was actually found in the packet
    pub actual: ContinuityCounter,
}

/// Tracks the expected continuity counter value for a single PID.
///
/// Initially no value is expected, so the first packet seen never produces a `Discontinuity`.
/// After any packet, the expected value becomes the one following the counter just observed,
/// whether or not that observation matched.
#[derive(Debug, Default)]
pub struct ContinuityCheck {
    expected: Option<ContinuityCounter>,
}

impl ContinuityCheck {
    /// Create a check which has not yet seen any packets
    pub fn new() -> ContinuityCheck {
        ContinuityCheck::default()
    }

    /// The counter value the next packet should carry, if any packet has been seen yet
    pub fn expected(&self) -> Option<ContinuityCounter> {
        self.expected
    }

    /// Record the counter of the latest packet, reporting a `Discontinuity` if it was not the
    /// expected value.
    pub fn check(&mut self, actual: ContinuityCounter) -> Result<(), Discontinuity> {
        let result = match self.expected {
            Some(expected) if expected != actual => Err(Discontinuity { expected, actual }),
            _ => Ok(()),
        };
        self.expected = Some(actual.next());
        result
    }
}
