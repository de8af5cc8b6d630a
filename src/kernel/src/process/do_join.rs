use super::{current, TermStatus, ThreadFlags, ThreadRef, ThreadState};
use crate::kernel::Kernel;
use crate::prelude::*;

impl Kernel {
    /// Wait for the thread `tid` to exit, free it and return its status.
    ///
    /// Fails with `EDEADLK` when joining oneself, `ESRCH` when there is no
    /// such thread, `EINVAL` when it is detached, and `EINTR` when the wait
    /// is interrupted.
    pub fn thread_join(&self, tid: pid_t) -> Result<TermStatus> {
        if tid == current::get().tid() {
            return_errno!(EDEADLK, "a thread cannot join itself");
        }
        let thread = self.threads.lock().get(tid)?;
        {
            let inner = thread.inner();
            if inner.state() == ThreadState::Terminated {
                return_errno!(ESRCH, "the thread has been reaped");
            }
            if inner.flags().contains(ThreadFlags::DETACHED) {
                return_errno!(EINVAL, "the thread is detached");
            }
        }
        self.wait_zombie(&thread)?;
        self.thread_reap(&thread)
    }

    /// Let the zombie sweep free the thread once it exits.
    pub fn thread_detach(&self, tid: pid_t) -> Result<()> {
        let thread = self.threads.lock().get(tid)?;
        let mut inner = thread.inner();
        if inner.state() == ThreadState::Terminated {
            return_errno!(ESRCH, "the thread has been reaped");
        }
        if inner.flags().contains(ThreadFlags::DETACHED) {
            return_errno!(EINVAL, "the thread is already detached");
        }
        inner.flags.insert(ThreadFlags::DETACHED);
        Ok(())
    }

    /// Sleep until `thread` is on the zombie queue.
    pub(crate) fn wait_zombie(&self, thread: &ThreadRef) -> Result<()> {
        let mut zombies = self.sched.zombies.lock();
        while !zombies.contains(thread) {
            if thread.state() == ThreadState::Terminated {
                return_errno!(ESRCH, "the thread was reaped by someone else");
            }
            let (guard, res) = thread.exit_cond().wait(self, zombies);
            zombies = guard;
            res?;
        }
        Ok(())
    }

    /// Free a zombie thread: take it off the zombie queue and out of its
    /// group and the thread table.
    ///
    /// Fails with `ESRCH` if the thread is not a zombie, e.g., because it
    /// has been reaped already.
    pub fn thread_reap(&self, thread: &ThreadRef) -> Result<TermStatus> {
        let status = {
            let mut zombies = self.sched.zombies.lock();
            if !zombies.remove(thread) {
                return_errno!(ESRCH, "not a zombie");
            }
            let mut inner = thread.inner();
            inner.set_state(ThreadState::Terminated);
            inner.term_status.unwrap_or(TermStatus::Exited(0))
        };

        if let Some(group) = thread.tgroup() {
            let mut group_inner = group.inner();
            let was_main = {
                let mut inner = thread.inner();
                group_inner.remove_thread(thread, &mut inner)
            };
            match was_main {
                Ok(true) => {
                    group_inner.elect_main(None, None);
                }
                Ok(false) => {}
                Err(e) => warn!("reaped thread {} was not a member: {}", thread.tid(), e),
            }
        }
        if let Err(e) = self.threads.lock().del(thread.tid()) {
            warn!("reaped thread {} was not in the table: {}", thread.tid(), e);
        }
        self.tids.lock().free(thread.tid());
        debug!("thread {} reaped: {:?}", thread.tid(), status);
        Ok(status)
    }
}
