use super::SigSet;
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::current;

impl Kernel {
    /// Get and optionally change the signal mask of the current thread.
    /// Returns the old mask.
    ///
    /// Blocking SIGKILL or SIGSTOP fails with `EINVAL`.
    pub fn sigprocmask(&self, op_and_set: Option<(MaskOp, SigSet)>) -> Result<SigSet> {
        debug!("sigprocmask: op_and_set = {:?}", op_and_set);
        if let Some((op, set)) = op_and_set {
            if op != MaskOp::Unblock && set.intersects(SigSet::unblockable()) {
                return_errno!(EINVAL, "SIGKILL and SIGSTOP cannot be blocked");
            }
        }

        let thread = current::get();
        let mut sig_mask = thread.sig_mask().lock();
        let old_mask = *sig_mask;
        if let Some((op, set)) = op_and_set {
            match op {
                MaskOp::Block => {
                    *sig_mask |= set;
                }
                MaskOp::Unblock => {
                    *sig_mask &= !set;
                }
                MaskOp::SetMask => {
                    *sig_mask = set;
                }
            };
        }
        Ok(old_mask)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum MaskOp {
    Block = 0,
    Unblock = 1,
    SetMask = 2,
}

impl MaskOp {
    pub fn from_u32(raw: u32) -> Result<MaskOp> {
        let op = match raw {
            0 => MaskOp::Block,
            1 => MaskOp::Unblock,
            2 => MaskOp::SetMask,
            _ => return_errno!(EINVAL, "invalid mask op"),
        };
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::constants::*;
    use crate::signal::{SigAction, SigActionFlags};
    use crate::test_util::*;

    #[test]
    fn mask_round_trip() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let set = SigSet::from(SIGUSR1) + SIGINT;
            let old = kernel.sigprocmask(Some((MaskOp::Block, set))).unwrap();
            assert!(old.empty());
            assert_eq!(kernel.sigprocmask(None).unwrap(), set);

            let unblock = SigSet::from(SIGINT);
            kernel.sigprocmask(Some((MaskOp::Unblock, unblock))).unwrap();
            assert_eq!(kernel.sigprocmask(None).unwrap(), SigSet::from(SIGUSR1));

            let prev = kernel.sigprocmask(Some((MaskOp::SetMask, old))).unwrap();
            assert_eq!(prev, SigSet::from(SIGUSR1));
            assert_eq!(kernel.sigprocmask(None).unwrap(), old);
        });
        kernel.shutdown();
    }

    #[test]
    fn unblocking_releases_a_pending_signal() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let (pid, tid) = (kernel.getpid().unwrap(), kernel.gettid());
            let handler = SigAction::user(0x1000, SigActionFlags::empty(), SigSet::new_empty());
            kernel.sigaction(SIGUSR1, Some(handler)).unwrap();

            kernel.tgkill(pid, tid, SIGUSR1.as_u8()).unwrap();
            let set = SigSet::from(SIGUSR1);
            assert!(kernel.sigpending().empty());
            kernel.sigprocmask(Some((MaskOp::Block, set))).unwrap();
            assert!(kernel.signal_dispatch().is_none());
            assert_eq!(kernel.sigpending(), set);

            kernel.sigprocmask(Some((MaskOp::Unblock, set))).unwrap();
            let frame = kernel.signal_dispatch().unwrap();
            assert_eq!(frame.info.signo, SIGUSR1);
            assert!(current::get().sig_queues().lock().is_empty());
            kernel.sigreturn(&frame);
        });
        kernel.shutdown();
    }

    #[test]
    fn kill_and_stop_stay_unblocked() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            for op in [MaskOp::Block, MaskOp::SetMask] {
                let err = kernel
                    .sigprocmask(Some((op, SigSet::from(SIGKILL) + SIGUSR1)))
                    .unwrap_err();
                assert_eq!(err.errno(), EINVAL);
                let err = kernel.sigprocmask(Some((op, SigSet::from(SIGSTOP)))).unwrap_err();
                assert_eq!(err.errno(), EINVAL);
            }
            assert!(kernel.sigprocmask(None).unwrap().empty());
            kernel
                .sigprocmask(Some((MaskOp::Unblock, SigSet::new_full())))
                .unwrap();
            kernel
                .sigprocmask(Some((MaskOp::Block, SigSet::new_full() & !SigSet::unblockable())))
                .unwrap();
            assert!(!kernel.sigprocmask(None).unwrap().intersects(SigSet::unblockable()));
        });
        kernel.shutdown();
    }

    #[test]
    fn raw_ops() {
        assert_eq!(MaskOp::from_u32(2).unwrap(), MaskOp::SetMask);
        assert_eq!(MaskOp::from_u32(3).unwrap_err().errno(), EINVAL);
    }
}
