use std::fmt;

use super::constants::*;
use crate::prelude::*;

/// A valid signal number, 1 to 64 (inclusive).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SigNum {
    num: u8,
}

impl SigNum {
    pub fn from_u8(num: u8) -> Result<SigNum> {
        if num < MIN_STD_SIG_NUM || num > MAX_RT_SIG_NUM {
            return_errno!(EINVAL, "not a valid signal number");
        }
        Ok(unsafe { Self::from_u8_unchecked(num) })
    }

    /// # Safety
    ///
    /// `num` must be within 1 to 64.
    pub const unsafe fn from_u8_unchecked(num: u8) -> SigNum {
        SigNum { num }
    }

    pub fn as_u8(&self) -> u8 {
        self.num
    }

    pub fn is_std(&self) -> bool {
        self.num <= MAX_STD_SIG_NUM
    }

    pub fn is_real_time(&self) -> bool {
        self.num >= MIN_RT_SIG_NUM
    }

    /// SIGKILL and SIGSTOP can be neither blocked, caught nor ignored.
    pub fn is_unblockable(&self) -> bool {
        *self == SIGKILL || *self == SIGSTOP
    }

    /// Signals whose default action stops the process.
    pub fn is_stop(&self) -> bool {
        matches!(*self, SIGSTOP | SIGTSTP | SIGTTIN | SIGTTOU)
    }

    pub fn name(&self) -> Option<&'static str> {
        std_signum_name(self.num)
    }
}

impl fmt::Debug for SigNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "SIGRT{}", self.num - MIN_RT_SIG_NUM),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range() {
        assert!(SigNum::from_u8(0).is_err());
        assert!(SigNum::from_u8(65).is_err());
        assert_eq!(SigNum::from_u8(9).unwrap(), SIGKILL);
        assert!(SigNum::from_u8(64).unwrap().is_real_time());
        assert!(SigNum::from_u8(31).unwrap().is_std());
    }

    #[test]
    fn names() {
        assert_eq!(format!("{:?}", SIGCHLD), "SIGCHLD");
        assert_eq!(format!("{:?}", SigNum::from_u8(34).unwrap()), "SIGRT2");
        assert!(SIGTSTP.is_stop() && !SIGCONT.is_stop());
        assert!(SIGSTOP.is_unblockable() && !SIGTERM.is_unblockable());
    }
}
