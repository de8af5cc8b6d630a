use std::fmt;

use super::constants::*;
use super::{SigAction, SigNum};
use crate::prelude::*;

/// The signal dispositions of a thread group, one action per signal.
#[derive(Copy, Clone)]
pub struct SigDispositions {
    map: [SigAction; NSIG],
}

impl SigDispositions {
    pub fn new() -> Self {
        Self {
            map: [Default::default(); NSIG],
        }
    }

    pub fn get(&self, num: SigNum) -> SigAction {
        self.map[Self::num_to_idx(num)]
    }

    /// Change the action of a signal.
    ///
    /// The actions of SIGKILL and SIGSTOP are fixed to the default.
    pub fn set(&mut self, num: SigNum, sa: SigAction) -> Result<()> {
        if num.is_unblockable() && sa != SigAction::Dfl {
            return_errno!(EINVAL, "the action of SIGKILL or SIGSTOP cannot be changed");
        }
        self.map[Self::num_to_idx(num)] = sa;
        Ok(())
    }

    pub fn set_default(&mut self, num: SigNum) {
        self.map[Self::num_to_idx(num)] = SigAction::Dfl;
    }

    pub fn iter(&self) -> impl Iterator<Item = (SigNum, &SigAction)> + '_ {
        self.map
            .iter()
            .enumerate()
            .map(|(idx, action)| (Self::idx_to_num(idx), action))
    }

    /// Reset user handlers to the default, keeping ignored signals ignored.
    ///
    /// This is what a new program image sees.
    pub fn inherit(&mut self) {
        for action in self.map.iter_mut() {
            if action.is_user() {
                *action = SigAction::Dfl;
            }
        }
    }

    fn num_to_idx(num: SigNum) -> usize {
        (num.as_u8() - MIN_STD_SIG_NUM) as usize
    }

    fn idx_to_num(idx: usize) -> SigNum {
        unsafe { SigNum::from_u8_unchecked(idx as u8 + MIN_STD_SIG_NUM) }
    }
}

impl Default for SigDispositions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SigDispositions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigDispositions (only non-default is shown) ")?;
        let non_default = self.iter().filter(|(_, action)| **action != SigAction::Dfl);
        f.debug_map().entries(non_default).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{SigActionFlags, SigSet};
    use super::*;

    #[test]
    fn kill_and_stop_are_fixed() {
        let mut dispos = SigDispositions::new();
        assert_eq!(dispos.set(SIGKILL, SigAction::Ign).unwrap_err().errno(), EINVAL);
        assert_eq!(dispos.set(SIGSTOP, SigAction::Ign).unwrap_err().errno(), EINVAL);
        dispos.set(SIGKILL, SigAction::Dfl).unwrap();
        assert_eq!(dispos.get(SIGKILL), SigAction::Dfl);
    }

    #[test]
    fn inherit_resets_handlers() {
        let mut dispos = SigDispositions::new();
        let handler = SigAction::user(0x4000, SigActionFlags::empty(), SigSet::new_empty());
        dispos.set(SIGUSR1, handler).unwrap();
        dispos.set(SIGPIPE, SigAction::Ign).unwrap();
        dispos.inherit();
        assert_eq!(dispos.get(SIGUSR1), SigAction::Dfl);
        assert_eq!(dispos.get(SIGPIPE), SigAction::Ign);
        assert_eq!(dispos.iter().count(), NSIG);
    }
}
