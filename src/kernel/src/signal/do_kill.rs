use super::constants::*;
use super::signals::{UserSignal, UserSignalKind};
use super::{SigAction, SigDefaultAction, SigNum, SigSet, Signal};
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::{TermStatus, ThreadFlags, ThreadGroupRef, ThreadRef, ThreadState, WakeReason};

impl Kernel {
    /// Queue a signal on a thread.
    ///
    /// Fails with `ESRCH` if the thread is dead, and with `EAGAIN` if it is
    /// stopped and the signal is neither SIGKILL nor SIGCONT. SIGKILL kills
    /// the thread and SIGCONT continues its group, before anything else.
    /// A signal that the thread blocks or ignores is then dropped, unless a
    /// `sigtimedwait` of the thread waits for it.
    pub fn thread_sigqueue(&self, thread: &ThreadRef, signal: Box<dyn Signal>) -> Result<()> {
        let signum = signal.num();
        {
            let inner = thread.inner();
            if inner.state().is_dead() {
                return_errno!(ESRCH, "the thread has exited");
            }
            let stopped = inner.state() == ThreadState::Stopped
                || inner.flags().contains(ThreadFlags::STOPPED);
            if stopped && signum != SIGKILL && signum != SIGCONT {
                return_errno!(EAGAIN, "the thread is stopped");
            }
        }
        debug!("thread_sigqueue: tid = {}, signal = {:?}", thread.tid(), signal);

        // Side effects at generation time
        if signum == SIGKILL {
            return self.thread_kill(thread, SIGKILL);
        }
        if signum == SIGCONT {
            thread.sig_queues().lock().discard(stop_signals());
            if let Some(group) = thread.tgroup() {
                self.tgroup_continue(&group)?;
            }
        } else if signum.is_stop() {
            thread.sig_queues().lock().discard(SigSet::from(SIGCONT));
        }

        let blocked = thread.sig_mask().lock().contains(signum);
        let ignored = self.is_ignored(thread, signum);
        {
            let mut sig_queues = thread.sig_queues().lock();
            let waited = sig_queues.waited().contains(signum);
            if !waited && (blocked || ignored) {
                trace!("{:?} to thread {} dropped", signum, thread.tid());
                return Ok(());
            }
            sig_queues.enqueue(signal);
        }
        self.interrupt(thread, WakeReason::Interrupted, None)?;
        Ok(())
    }

    /// Queue a signal on a thread group.
    ///
    /// SIGKILL kills every member and makes the group exit with it. Other
    /// signals go to one member: the main thread unless it blocks the
    /// signal, else the first member that does not block it or waits for
    /// it. Fails with `ESRCH` if every member is dead.
    pub fn tgroup_sigqueue(&self, group: &ThreadGroupRef, signal: Box<dyn Signal>) -> Result<()> {
        let signum = signal.num();
        let members: Vec<ThreadRef> = group
            .threads()
            .into_iter()
            .filter(|thread| !thread.state().is_dead())
            .collect();
        if members.is_empty() {
            return_errno!(ESRCH, "the thread group has exited");
        }

        if signum == SIGKILL {
            group.inner().set_exit_status(TermStatus::Killed(SIGKILL));
            for thread in members.iter() {
                self.thread_kill(thread, SIGKILL)?;
            }
            return Ok(());
        }

        let accepts = |thread: &ThreadRef| {
            !thread.sig_mask().lock().contains(signum)
                || thread.sig_queues().lock().waited().contains(signum)
        };
        let target = members
            .iter()
            .filter(|thread| thread.is_main())
            .chain(members.iter())
            .find(|thread| accepts(thread))
            .or_else(|| members.iter().find(|thread| thread.is_main()))
            .unwrap_or(&members[0])
            .clone();
        self.thread_sigqueue(&target, signal)
    }

    /// Send a signal to thread groups, as kill(2).
    ///
    /// `pid > 0` is that group, `0` is the caller's process group, `-1` is
    /// every group but the first one and the caller's, and below `-1` is
    /// the process group `-pid`. Signal 0 only checks that the targets
    /// exist and may be signaled. Fails with `EPERM` if no target may be
    /// signaled, and with `ESRCH` if there is no target.
    pub fn kill(&self, pid: i32, sig: u8) -> Result<()> {
        let signum = match sig {
            0 => None,
            sig => Some(SigNum::from_u8(sig)?),
        };
        debug!("kill: pid = {}, signum = {:?}", pid, signum);
        let caller = self.current_tgroup()?;
        let targets: Vec<ThreadGroupRef> = match pid {
            pid if pid > 0 => vec![self.tgroups.lock().get(pid as pid_t)?],
            0 => self.pgrp_get(caller.pgid())?.members(),
            -1 => self
                .tgroups
                .lock()
                .values()
                .into_iter()
                .filter(|group| group.pid() != 1 && group.pid() != caller.pid())
                .collect(),
            pid => self
                .pgrp_get(pid.unsigned_abs())
                .map_err(|_| errno!(ESRCH, "no such process group"))?
                .members(),
        };
        if targets.is_empty() {
            return_errno!(ESRCH, "no process to signal");
        }

        let credentials = caller.credentials();
        let permitted: Vec<ThreadGroupRef> = targets
            .into_iter()
            .filter(|group| credentials.can_signal(&group.credentials()))
            .collect();
        if permitted.is_empty() {
            return_errno!(EPERM, "not allowed to signal the process");
        }
        let signum = match signum {
            Some(signum) => signum,
            None => return Ok(()),
        };
        for group in permitted {
            if group.is_zombie() {
                continue;
            }
            let signal = UserSignal::new(signum, UserSignalKind::Kill, caller.pid(), credentials.uid);
            if let Err(e) = self.tgroup_sigqueue(&group, Box::new(signal)) {
                debug!("{:?} to thread group {} failed: {}", signum, group.pid(), e);
            }
        }
        Ok(())
    }

    /// Send a signal to the thread `tid` of the group `tgid`.
    pub fn tgkill(&self, tgid: pid_t, tid: pid_t, sig: u8) -> Result<()> {
        let signum = match sig {
            0 => None,
            sig => Some(SigNum::from_u8(sig)?),
        };
        debug!("tgkill: tgid = {}, tid = {}, signum = {:?}", tgid, tid, signum);
        let thread = self.threads.lock().get(tid)?;
        let group = thread
            .tgroup()
            .filter(|group| group.pid() == tgid)
            .ok_or_else(|| errno!(ESRCH, "the thread is not in the thread group"))?;

        let caller = self.current_tgroup()?;
        let credentials = caller.credentials();
        if !credentials.can_signal(&group.credentials()) {
            return_errno!(EPERM, "not allowed to signal the thread");
        }
        let signum = match signum {
            Some(signum) => signum,
            None => return Ok(()),
        };
        let signal = UserSignal::new(signum, UserSignalKind::Tkill, caller.pid(), credentials.uid);
        self.thread_sigqueue(&thread, Box::new(signal))
    }

    fn is_ignored(&self, thread: &ThreadRef, signum: SigNum) -> bool {
        let action = match thread.tgroup() {
            Some(group) => group.sig_dispositions().lock().get(signum),
            None => return false,
        };
        match action {
            SigAction::Ign => true,
            SigAction::Dfl => SigDefaultAction::from_signum(signum) == SigDefaultAction::Ign,
            SigAction::User { .. } => false,
        }
    }
}

fn stop_signals() -> SigSet {
    SigSet::from(SIGSTOP) + SIGTSTP + SIGTTIN + SIGTTOU
}
