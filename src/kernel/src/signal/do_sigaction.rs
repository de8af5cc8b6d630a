use super::{SigAction, SigDefaultAction, SigNum, SigSet};
use crate::kernel::Kernel;
use crate::prelude::*;

impl Kernel {
    /// Get and optionally change the action of a signal for the caller's
    /// thread group. Returns the old action.
    ///
    /// The actions of SIGKILL and SIGSTOP cannot be changed. Setting a
    /// signal to be ignored discards its pending instances.
    pub fn sigaction(&self, signum: SigNum, new_sa: Option<SigAction>) -> Result<SigAction> {
        debug!("sigaction: signum = {:?}, new_sa = {:?}", signum, new_sa);
        if signum.is_unblockable() && new_sa.is_some() {
            return_errno!(EINVAL, "the actions of SIGKILL and SIGSTOP cannot be changed");
        }

        let group = self.current_tgroup()?;
        let old_sa = {
            let mut sig_dispositions = group.sig_dispositions().lock();
            let old_sa = sig_dispositions.get(signum);
            if let Some(new_sa) = new_sa {
                sig_dispositions.set(signum, new_sa)?;
            }
            old_sa
        };

        let ignored = match new_sa {
            Some(SigAction::Ign) => true,
            Some(SigAction::Dfl) => {
                SigDefaultAction::from_signum(signum) == SigDefaultAction::Ign
            }
            _ => false,
        };
        if ignored {
            for thread in group.threads() {
                thread.sig_queues().lock().discard(SigSet::from(signum));
            }
        }
        Ok(old_sa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::constants::*;
    use crate::signal::SigActionFlags;
    use crate::test_util::*;

    #[test]
    fn install_and_restore() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let handler = SigAction::user(0x4000, SigActionFlags::SA_RESTART, SigSet::new_empty());
            assert_eq!(kernel.sigaction(SIGINT, Some(handler)).unwrap(), SigAction::Dfl);
            assert_eq!(kernel.sigaction(SIGINT, Some(SigAction::Dfl)).unwrap(), handler);
            assert_eq!(kernel.sigaction(SIGKILL, None).unwrap(), SigAction::Dfl);

            let err = kernel.sigaction(SIGKILL, Some(SigAction::Ign)).unwrap_err();
            assert_eq!(err.errno(), EINVAL);
            let err = kernel.sigaction(SIGSTOP, Some(handler)).unwrap_err();
            assert_eq!(err.errno(), EINVAL);
        });
        kernel.shutdown();
    }

    #[test]
    fn children_inherit_dispositions() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            kernel.sigaction(SIGHUP, Some(SigAction::Ign)).unwrap();
            let parent = kernel.current_tgroup().unwrap();
            let child = kernel.tgroup_create(Some(&parent)).unwrap();
            assert_eq!(child.sig_dispositions().lock().get(SIGHUP), SigAction::Ign);
            assert_eq!(child.sid(), parent.sid());
        });
        kernel.shutdown();
    }
}
