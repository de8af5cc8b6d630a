use super::constants::*;
use super::{SigNum, SigSet};
use crate::prelude::*;

/// What a thread group does upon a signal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SigAction {
    Dfl, // Default action
    Ign, // Ignore this signal
    User {
        // User-given handler
        handler_addr: usize,
        flags: SigActionFlags,
        restorer_addr: usize,
        mask: SigSet,
    },
}

impl Default for SigAction {
    fn default() -> Self {
        SigAction::Dfl
    }
}

impl SigAction {
    /// A user handler. SIGKILL and SIGSTOP are silently dropped from the mask.
    pub fn user(handler_addr: usize, flags: SigActionFlags, mask: SigSet) -> Self {
        if handler_addr == 0 {
            return SigAction::Dfl;
        }
        SigAction::User {
            handler_addr,
            flags,
            restorer_addr: 0,
            mask: mask & !SigSet::unblockable(),
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, SigAction::User { .. })
    }
}

bitflags! {
    pub struct SigActionFlags: u32 {
        const SA_NOCLDSTOP  = 1;
        const SA_NOCLDWAIT  = 2;
        const SA_SIGINFO    = 4;
        const SA_ONSTACK    = 0x08000000;
        const SA_RESTART    = 0x10000000;
        const SA_NODEFER    = 0x40000000;
        const SA_RESETHAND  = 0x80000000;
        const SA_RESTORER   = 0x04000000;
    }
}

impl SigActionFlags {
    pub fn from_u32(bits: u32) -> Result<SigActionFlags> {
        let flags =
            Self::from_bits(bits).ok_or_else(|| errno!(EINVAL, "invalid sigaction flags"))?;
        if flags.contains(SigActionFlags::SA_ONSTACK) {
            warn!("SA_ONSTACK is not supported");
        }
        Ok(flags)
    }

    pub fn to_u32(&self) -> u32 {
        self.bits()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SigDefaultAction {
    Term, // Terminate the thread group.
    Ign,  // Ignore the signal.
    Core, // Terminate the thread group, reported as a core dump.
    Stop, // Stop the thread group.
    Cont, // Continue the thread group if it is stopped.
}

impl SigDefaultAction {
    pub fn from_signum(num: SigNum) -> SigDefaultAction {
        match num {
            SIGABRT | SIGBUS | SIGFPE | SIGILL | SIGQUIT | SIGSEGV | SIGSYS | SIGTRAP
            | SIGXCPU | SIGXFSZ => SigDefaultAction::Core,
            SIGCHLD | SIGURG | SIGWINCH => SigDefaultAction::Ign,
            SIGCONT => SigDefaultAction::Cont,
            SIGSTOP | SIGTSTP | SIGTTIN | SIGTTOU => SigDefaultAction::Stop,
            _ => SigDefaultAction::Term,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_mask_drops_unblockable() {
        let mask = SigSet::from(SIGKILL) + SIGUSR2;
        match SigAction::user(0x1000, SigActionFlags::empty(), mask) {
            SigAction::User { mask, .. } => {
                assert!(!mask.contains(SIGKILL));
                assert!(mask.contains(SIGUSR2));
            }
            other => panic!("unexpected action {:?}", other),
        }
        assert_eq!(
            SigAction::user(0, SigActionFlags::empty(), mask),
            SigAction::Dfl
        );
    }

    #[test]
    fn default_actions() {
        assert_eq!(SigDefaultAction::from_signum(SIGSEGV), SigDefaultAction::Core);
        assert_eq!(SigDefaultAction::from_signum(SIGTSTP), SigDefaultAction::Stop);
        assert_eq!(SigDefaultAction::from_signum(SIGCHLD), SigDefaultAction::Ign);
        assert_eq!(SigDefaultAction::from_signum(SIGTERM), SigDefaultAction::Term);
        let rt = SigNum::from_u8(40).unwrap();
        assert_eq!(SigDefaultAction::from_signum(rt), SigDefaultAction::Term);
        assert!(SigActionFlags::from_u32(0x20).is_err());
    }
}
