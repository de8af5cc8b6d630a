//! The termination status of a thread group or thread.

use crate::signal::SigNum;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TermStatus {
    Exited(u8),
    Killed(SigNum),
    /// Killed by a signal whose default action dumps core.
    Dumped(SigNum),
}

impl TermStatus {
    /// Return as a 32-bit integer encoded as specified in wait(2) man page.
    pub fn as_u32(&self) -> u32 {
        match *self {
            TermStatus::Exited(status) => (status as u32) << 8,
            TermStatus::Killed(signum) => signum.as_u8() as u32,
            TermStatus::Dumped(signum) => (signum.as_u8() as u32) | 0x80,
        }
    }

    /// The signal that ended the thread, if any.
    pub fn signal(&self) -> Option<SigNum> {
        match *self {
            TermStatus::Exited(_) => None,
            TermStatus::Killed(signum) | TermStatus::Dumped(signum) => Some(signum),
        }
    }
}
