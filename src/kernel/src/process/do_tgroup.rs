//! Job control and member lookup for thread groups.
//!
//! Stopping and suspending are cooperative: they flag the members and wake
//! the interruptible sleepers, and each member parks itself in STOPPED at
//! its next return to user (`Kernel::return_to_user`).

use super::{current, JobReport, JobState, ThreadFlags, ThreadGroupRef, ThreadRef};
use super::{ThreadSelector, ThreadState, WakeReason};
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::signal::constants::{ChildCode, SIGCHLD, SIGCONT};
use crate::signal::{KernelSignal, SigAction, SigActionFlags, SigNum};

impl Kernel {
    /// Find a member of a thread group.
    pub fn tgroup_get_thread(
        &self,
        group: &ThreadGroupRef,
        selector: ThreadSelector,
    ) -> Result<ThreadRef> {
        let group_inner = group.inner();
        let threads = group_inner.threads();
        let found = match selector {
            ThreadSelector::Tid(tid) => threads.iter().find(|thread| thread.tid() == tid),
            ThreadSelector::InState(state) => {
                threads.iter().find(|thread| thread.state() == state)
            }
            ThreadSelector::Any => threads
                .iter()
                .find(|thread| thread.is_main())
                .or_else(|| threads.front()),
        };
        found
            .cloned()
            .ok_or_else(|| errno!(ESRCH, "no matching thread in the group"))
    }

    /// Suspend every other member of the caller's group.
    pub fn tgroup_suspend(&self, group: &ThreadGroupRef) -> Result<()> {
        let me = current::try_get().map(|thread| thread.tid());
        let victims = self.flag_members(group, ThreadFlags::SUSPENDED, me);
        self.interrupt_all(&victims)
    }

    /// Stop every member of a group on behalf of `signum`.
    pub fn tgroup_stop(&self, group: &ThreadGroupRef, signum: SigNum) -> Result<()> {
        {
            let mut group_inner = group.inner();
            group_inner.set_job(JobState::Stopped(signum));
            group_inner.set_report(Some(JobReport::Stopped(signum)));
        }
        debug!("thread group {} stopped by {:?}", group.pid(), signum);
        let victims = self.flag_members(group, ThreadFlags::STOPPED, None);
        self.interrupt_all(&victims)
    }

    /// Undo `tgroup_stop` and `tgroup_suspend`.
    ///
    /// Members in STOPPED go back to the run queues. Returns whether the
    /// group was stopped.
    pub fn tgroup_continue(&self, group: &ThreadGroupRef) -> Result<bool> {
        let was_stopped = {
            let mut group_inner = group.inner();
            let was_stopped = group_inner.job() != JobState::Running;
            if was_stopped {
                group_inner.set_job(JobState::Running);
                group_inner.set_report(Some(JobReport::Continued));
            }
            was_stopped
        };
        for thread in group.threads() {
            let mut inner = thread.inner();
            inner
                .flags
                .remove(ThreadFlags::STOPPED | ThreadFlags::SUSPENDED);
            if inner.state() == ThreadState::Stopped {
                self.sched_park(&thread, &mut inner)?;
            }
        }
        if was_stopped {
            debug!("thread group {} continued", group.pid());
            if let Some(parent) = group.parent() {
                self.notify_parent_of_job(&parent, group.pid(), JobReport::Continued);
            }
        }
        Ok(was_stopped)
    }

    /// Park the current thread in STOPPED while it is flagged stopped or
    /// suspended. Returns early if it is killed.
    pub(crate) fn enter_stopped(&self) {
        let thread = current::get();
        let mut inner = thread.inner();
        while inner
            .flags()
            .intersects(ThreadFlags::STOPPED | ThreadFlags::SUSPENDED)
            && !inner.is_killed()
        {
            inner.set_state(ThreadState::Stopped);
            inner = self.sched(&thread, inner);
        }
    }

    /// Tell the parent that a child stopped or continued, unless the
    /// parent asked not to hear about it.
    pub(crate) fn notify_parent_of_job(
        &self,
        parent: &ThreadGroupRef,
        pid: pid_t,
        report: JobReport,
    ) {
        let no_cldstop = match parent.sig_dispositions().lock().get(SIGCHLD) {
            SigAction::User { flags, .. } => {
                flags.contains(SigActionFlags::SA_NOCLDSTOP)
            }
            _ => false,
        };
        if no_cldstop {
            // Waiters still learn about it through waitpid
            let parent_inner = parent.inner();
            let _ = parent.child_cond().broadcast(self);
            drop(parent_inner);
            return;
        }
        let (code, signum) = match report {
            JobReport::Stopped(signum) => (ChildCode::Stopped, signum),
            JobReport::Continued => (ChildCode::Continued, SIGCONT),
        };
        let signal = KernelSignal::child(pid, code, signum.as_u8() as i32);
        self.notify_parent(parent, signal);
    }

    fn flag_members(
        &self,
        group: &ThreadGroupRef,
        flag: ThreadFlags,
        except: Option<pid_t>,
    ) -> Vec<ThreadRef> {
        let group_inner = group.inner();
        group_inner
            .threads()
            .iter()
            .filter(|thread| Some(thread.tid()) != except)
            .filter(|thread| {
                let mut inner = thread.inner();
                if inner.state().is_dead() {
                    return false;
                }
                inner.flags.insert(flag);
                true
            })
            .cloned()
            .collect()
    }

    fn interrupt_all(&self, threads: &[ThreadRef]) -> Result<()> {
        for thread in threads {
            self.interrupt(thread, WakeReason::Interrupted, None)?;
        }
        Ok(())
    }
}
