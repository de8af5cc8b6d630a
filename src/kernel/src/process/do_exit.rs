use super::{current, GroupStatus, KillTarget, TermStatus, ThreadFlags, ThreadGroupRef};
use super::{ThreadRef, ThreadState};
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::signal::constants::ChildCode;
use crate::signal::KernelSignal;

impl Kernel {
    /// Terminate the current thread.
    ///
    /// A killed thread exits with the kill signal, and a member of a group
    /// that is exiting as a whole exits with the group's status, whatever
    /// `status` says.
    pub fn thread_exit(&self, status: TermStatus) -> ! {
        let thread = current::get();
        let status = {
            let inner = thread.inner();
            match inner.kill_signal {
                Some(signum) if inner.is_killed() => TermStatus::Killed(signum),
                _ => status,
            }
        };
        let status = match thread.tgroup() {
            Some(group) => self.tgroup_exit_thread(&group, &thread, status),
            None => status,
        };
        current::clear();

        let mut inner = thread.inner();
        inner.term_status = Some(status);
        inner.set_state(ThreadState::Zombie);
        info!("thread {} exits: {:?}", thread.tid(), status);
        let cpu = match inner.cpu {
            Some(cpu) => cpu,
            None => panic!("thread {} exits off any CPU", thread.tid()),
        };
        // The dispatch loop takes the lock over and queues us as a zombie
        SpinLockGuard::relinquish(inner);
        let cpu_ctx = self.arch().cpu_context(cpu);
        self.arch().retire(&*cpu_ctx, cpu)
    }

    /// Terminate every thread of the current thread group.
    pub fn exit_group(&self, status: TermStatus) -> ! {
        if let Some(group) = current::get().tgroup() {
            let status = group.inner().set_exit_status(status);
            debug!("thread group {} exits as a whole: {:?}", group.pid(), status);
            if let Err(e) =
                self.tgroup_kill_thread(&group, KillTarget::All, ThreadFlags::empty(), false)
            {
                warn!("failed to kill the other threads: {}", e);
            }
        }
        self.thread_exit(status)
    }

    /// Account for a member that is becoming a zombie. Returns the status
    /// the member exits with.
    ///
    /// The caller must hold no thread lock.
    pub(crate) fn tgroup_exit_thread(
        &self,
        group: &ThreadGroupRef,
        thread: &ThreadRef,
        status: TermStatus,
    ) -> TermStatus {
        let (status, group_exit) = {
            let mut group_inner = group.inner();
            let status = group_inner.exit_status().unwrap_or(status);
            if thread.is_main() {
                group_inner.elect_main(Some(thread.tid()), None);
            }
            let group_exit = group_inner
                .thread_exited(status)
                .map(|group_status| (group_status, group_inner.parent()));
            (status, group_exit)
        };
        if let Some((group_status, parent)) = group_exit {
            self.tgroup_became_zombie(group, parent, group_status);
        }
        status
    }

    fn tgroup_became_zombie(
        &self,
        group: &ThreadGroupRef,
        parent: Option<ThreadGroupRef>,
        status: TermStatus,
    ) {
        info!("thread group {} exits: {:?}", group.pid(), status);
        self.tgroup_orphan_children(group);
        match parent {
            Some(parent) => {
                let code = match status {
                    TermStatus::Exited(_) => ChildCode::Exited,
                    TermStatus::Killed(_) => ChildCode::Killed,
                    TermStatus::Dumped(_) => ChildCode::Dumped,
                };
                let signal = KernelSignal::child(group.pid(), code, status.as_u32() as i32);
                self.notify_parent(&parent, signal);
            }
            // Nobody will wait for it
            None => self.tgroup_release(group),
        }
    }

    // Children of an exited group have no parent. The ones that are zombies
    // already are released at once; the others release themselves on exit.
    fn tgroup_orphan_children(&self, group: &ThreadGroupRef) {
        let zombies: Vec<ThreadGroupRef> = {
            let mut group_inner = group.inner();
            group_inner
                .take_children()
                .into_iter()
                .filter(|child| {
                    let mut child_inner = child.inner();
                    child_inner.set_parent(Weak::new());
                    matches!(child_inner.status(), GroupStatus::Zombie(_))
                })
                .collect()
        };
        for child in zombies {
            self.tgroup_release(&child);
        }
    }

    /// Send SIGCHLD to a parent and wake its `waitpid` callers.
    pub(crate) fn notify_parent(&self, parent: &ThreadGroupRef, signal: KernelSignal) {
        if let Err(e) = self.tgroup_sigqueue(parent, Box::new(signal)) {
            debug!("SIGCHLD to {} not delivered: {}", parent.pid(), e);
        }
        // Under the parent's lock, so that a waiter between its check and its
        // sleep cannot miss the broadcast
        let parent_inner = parent.inner();
        if let Err(e) = parent.child_cond().broadcast(self) {
            warn!("failed to wake the waiters of {}: {}", parent.pid(), e);
        }
        drop(parent_inner);
    }

    /// Forget a thread group for good.
    ///
    /// Its members become detached so that the zombie sweep frees those
    /// that are not zombies yet; the zombie ones are reaped right away.
    pub(crate) fn tgroup_release(&self, group: &ThreadGroupRef) {
        let members: Vec<ThreadRef> = {
            let group_inner = group.inner();
            for thread in group_inner.threads().iter() {
                thread.inner().flags.insert(ThreadFlags::DETACHED);
            }
            group_inner.threads().iter().cloned().collect()
        };
        self.tgroup_unlink(group);
        debug!("thread group {} released", group.pid());
        for thread in members {
            if let Err(e) = self.thread_reap(&thread) {
                trace!("thread {} left for the sweep: {}", thread.tid(), e);
            }
        }
    }
}
