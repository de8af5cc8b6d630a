use super::cpu_set::CpuSet;
use super::RunEntry;
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::{current, ThreadInner, ThreadRef, ThreadState};

impl Kernel {
    /// `tid == 0` means the current thread.
    pub fn sched_getaffinity(&self, tid: pid_t) -> Result<CpuSet> {
        debug!("sched_getaffinity: tid = {}", tid);
        let thread = self.thread_by_tid(tid)?;
        let affinity = thread.inner().affinity().clone();
        Ok(affinity)
    }

    /// Restrict a thread to a set of CPUs. `tid == 0` means the current
    /// thread.
    ///
    /// Fails with `EINVAL` if the set admits no online CPU. A thread running
    /// elsewhere moves at its next preemption point.
    pub fn sched_setaffinity(&self, tid: pid_t, new_affinity: CpuSet) -> Result<()> {
        debug!("sched_setaffinity: tid = {}, new_affinity = {:?}", tid, new_affinity);
        if !new_affinity.iter().any(|cpu| cpu < self.sched.ncpus()) {
            return_errno!(EINVAL, "the affinity admits no online CPU");
        }
        let thread = self.thread_by_tid(tid)?;
        let mut inner = thread.inner();
        if inner.state().is_dead() {
            return_errno!(ESRCH, "the thread has exited");
        }
        inner.affinity = new_affinity;
        self.sched_requeue(&thread, &inner);
        if let (ThreadState::Running, Some(cpu)) = (inner.state(), inner.cpu()) {
            if !inner.affinity().contains(cpu) {
                self.sched.cpu(cpu).request_resched();
            }
        }
        Ok(())
    }

    /// The CPU the current thread runs on.
    pub fn getcpu(&self) -> Result<usize> {
        current::get()
            .inner()
            .cpu()
            .ok_or_else(|| errno!(EINVAL, "not running on a CPU"))
    }

    /// Move a ready thread to the run queue entry its level and affinity
    /// call for. Other threads pick up the change when next parked.
    pub(crate) fn sched_requeue(&self, thread: &ThreadRef, inner: &ThreadInner) {
        if inner.state() != ThreadState::Ready {
            return;
        }
        let mut runqueues = self.sched.runqueues.lock();
        let enqueued_at = match runqueues.remove(thread) {
            Some(entry) => entry.enqueued_at,
            None => return,
        };
        runqueues.enqueue(RunEntry {
            item: thread.clone(),
            level: inner.level(),
            affinity: inner.affinity().clone(),
            enqueued_at,
        });
        drop(runqueues);
        self.kick_for(inner.affinity());
    }

    fn thread_by_tid(&self, tid: pid_t) -> Result<ThreadRef> {
        if tid == 0 {
            Ok(current::get())
        } else {
            self.threads.lock().get(tid)
        }
    }
}
