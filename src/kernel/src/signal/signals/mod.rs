//! Signals generated from various sources.
mod kernel;
mod user;

pub use self::kernel::KernelSignal;
pub use self::user::{UserSignal, UserSignalKind};

use super::constants::SigCode;
use super::SigNum;
use crate::prelude::*;

pub trait Signal: Send + Sync + Debug {
    /// Returns the number of the signal.
    fn num(&self) -> SigNum;

    /// Returns the details of the signal.
    fn to_info(&self) -> SigInfo;
}

/// The details of a delivered signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigInfo {
    pub signo: SigNum,
    pub code: SigCode,
    /// The sender's thread group
    pub pid: pid_t,
    /// The sender's real user ID
    pub uid: u32,
    /// Exit code or signal number of a child, for SIGCHLD
    pub status: i32,
    pub value: usize,
}

impl SigInfo {
    pub fn new(signo: SigNum, code: SigCode) -> Self {
        Self {
            signo,
            code,
            pid: 0,
            uid: 0,
            status: 0,
            value: 0,
        }
    }
}
