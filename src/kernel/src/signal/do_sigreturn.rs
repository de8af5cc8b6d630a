use super::{SigAction, SigActionFlags, SigDefaultAction, SigInfo, SigNum, SigSet, Signal};
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::{current, JobReport, TermStatus, ThreadFlags, ThreadGroupRef};

/// What the arch layer needs to run a user signal handler.
///
/// The arch layer builds the user stack frame from it and keeps it until
/// the handler returns through `Kernel::sigreturn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalFrame {
    pub info: SigInfo,
    pub handler_addr: usize,
    pub restorer_addr: usize,
    pub flags: SigActionFlags,
    /// The signal mask before the handler, restored by `sigreturn`
    pub saved_mask: SigSet,
}

impl Kernel {
    /// The checks a thread goes through on its way back to user mode.
    ///
    /// In order: honor a pending reschedule, exit if killed, park while
    /// stopped or suspended, then deliver signals. Returns a frame when a
    /// user handler is to be run.
    pub fn return_to_user(&self) -> Option<SignalFrame> {
        loop {
            self.preempt_point();
            let thread = current::get();
            let flags = thread.flags();
            if flags.contains(ThreadFlags::KILLED) {
                self.thread_exit(TermStatus::Exited(0));
            }
            if flags.intersects(ThreadFlags::STOPPED | ThreadFlags::SUSPENDED) {
                self.enter_stopped();
                continue;
            }
            return self.signal_dispatch();
        }
    }

    /// Deliver the pending signals of the current thread that it does not
    /// block, lowest signal number first.
    ///
    /// Default actions are carried out here; fatal ones do not return.
    /// Stops in the middle of the loop until the group is continued.
    /// Delivery ends at the first signal with a user handler, whose frame is
    /// returned.
    pub fn signal_dispatch(&self) -> Option<SignalFrame> {
        let thread = current::get();
        let group = thread.tgroup()?;
        loop {
            let signal = {
                let mask = *thread.sig_mask().lock();
                thread.sig_queues().lock().dequeue_unblocked(mask)?
            };
            let signum = signal.num();
            let action = group.sig_dispositions().lock().get(signum);
            debug!("signal_dispatch: signal = {:?}, action = {:?}", signal, action);

            match action {
                SigAction::Ign => continue,
                SigAction::Dfl => self.default_action(&group, signum),
                SigAction::User {
                    handler_addr,
                    flags,
                    restorer_addr,
                    mask,
                } => {
                    let frame =
                        self.enter_handler(&group, signal, handler_addr, flags, restorer_addr, mask);
                    return Some(frame);
                }
            }
        }
    }

    /// Return from a user signal handler.
    pub fn sigreturn(&self, frame: &SignalFrame) {
        debug!("sigreturn: signal = {:?}", frame.info.signo);
        let thread = current::get();
        *thread.sig_mask().lock() = frame.saved_mask & !SigSet::unblockable();
    }

    fn default_action(&self, group: &ThreadGroupRef, signum: SigNum) {
        match SigDefaultAction::from_signum(signum) {
            // Continuing happened when the signal was sent
            SigDefaultAction::Ign | SigDefaultAction::Cont => {}
            SigDefaultAction::Term => self.exit_group(TermStatus::Killed(signum)),
            SigDefaultAction::Core => self.exit_group(TermStatus::Dumped(signum)),
            SigDefaultAction::Stop => {
                if let Err(e) = self.tgroup_stop(group, signum) {
                    warn!("failed to stop thread group {}: {}", group.pid(), e);
                }
                if let Some(parent) = group.parent() {
                    self.notify_parent_of_job(&parent, group.pid(), JobReport::Stopped(signum));
                }
                self.enter_stopped();
                if current::get().inner().is_killed() {
                    self.thread_exit(TermStatus::Exited(0));
                }
            }
        }
    }

    fn enter_handler(
        &self,
        group: &ThreadGroupRef,
        signal: Box<dyn Signal>,
        handler_addr: usize,
        flags: SigActionFlags,
        restorer_addr: usize,
        mask: SigSet,
    ) -> SignalFrame {
        let signum = signal.num();
        let saved_mask = {
            let thread = current::get();
            let mut sig_mask = thread.sig_mask().lock();
            let saved_mask = *sig_mask;
            let mut new_mask = saved_mask | mask;
            if !flags.contains(SigActionFlags::SA_NODEFER) {
                new_mask += signum;
            }
            *sig_mask = new_mask & !SigSet::unblockable();
            saved_mask
        };
        if flags.contains(SigActionFlags::SA_RESETHAND) {
            group.sig_dispositions().lock().set_default(signum);
        }
        SignalFrame {
            info: signal.to_info(),
            handler_addr,
            restorer_addr,
            flags,
            saved_mask,
        }
    }
}
