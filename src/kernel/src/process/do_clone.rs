use std::panic::{self, AssertUnwindSafe};

use super::{current, TermStatus, Thread, ThreadAttrs, ThreadFlags, ThreadGroupRef, ThreadRef};
use super::ThreadState;
use crate::arch::Retired;
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::sched::{CpuSet, NiceValue, Priority};
use crate::signal::constants::{SIGABRT, SIGKILL};

/// The body of a kernel thread. Its return value is the exit code.
pub type ThreadEntry = Box<dyn FnOnce(&Arc<Kernel>) -> i32 + Send>;

impl Kernel {
    /// Create a thread in `group`. The thread stays an embryo until
    /// `thread_start`.
    ///
    /// Attributes missing from `attrs` are inherited from the calling
    /// thread, if any. Fails with `EAGAIN` when the thread limit is reached
    /// and with `ESRCH` when the group has exited; nothing is left behind
    /// on failure.
    pub fn thread_create<F>(
        &self,
        group: &ThreadGroupRef,
        attrs: ThreadAttrs,
        entry: F,
    ) -> Result<ThreadRef>
    where
        F: FnOnce(&Arc<Kernel>) -> i32 + Send + 'static,
    {
        if self.threads.lock().len() >= self.config().thread.max_threads {
            return_errno!(EAGAIN, "too many threads");
        }
        let tid = self.tids.lock().alloc()?;
        let res = self.new_thread(tid, group, &attrs, Box::new(entry));
        if res.is_err() {
            self.tids.lock().free(tid);
        }
        res
    }

    fn new_thread(
        &self,
        tid: pid_t,
        group: &ThreadGroupRef,
        attrs: &ThreadAttrs,
        entry: ThreadEntry,
    ) -> Result<ThreadRef> {
        let (prio, nice, affinity) = self.initial_sched_attrs(attrs);
        let name = if attrs.name().is_empty() {
            format!("thread-{}", tid)
        } else {
            attrs.name().to_string()
        };
        let thread = Arc::new(Thread::new(
            tid,
            name,
            Arc::downgrade(group),
            prio,
            nice,
            affinity,
            attrs.sig_mask(),
        ));

        let ctx = {
            let kernel = self.weak_self();
            let this = thread.clone();
            self.arch().fork(
                thread.name(),
                Box::new(move || thread_trampoline(kernel, this, entry)),
            )?
        };
        thread.set_context(ctx);

        if let Err(e) = self.threads.lock().add(tid, thread.clone()) {
            self.arch().discard(&**thread.context());
            return Err(e);
        }
        let joined = {
            let mut group_inner = group.inner();
            let mut inner = thread.inner();
            group_inner.add_thread(&thread, &mut inner).and_then(|()| {
                if attrs.detached() {
                    inner.flags.insert(ThreadFlags::DETACHED);
                }
                self.sched.embryos.lock().enqueue(thread.clone(), false)
            })
        };
        if let Err(e) = joined {
            let _ = self.threads.lock().del(tid);
            self.arch().discard(&**thread.context());
            return Err(e);
        }

        info!(
            "thread {} ({}) created in thread group {}",
            tid,
            thread.name(),
            group.pid()
        );
        Ok(thread)
    }

    fn initial_sched_attrs(&self, attrs: &ThreadAttrs) -> (Priority, NiceValue, CpuSet) {
        let creator = current::try_get().map(|thread| {
            let inner = thread.inner();
            (inner.priority(), inner.nice, inner.affinity().clone())
        });
        let (prio, nice) = match (attrs.priority(), attrs.nice()) {
            (Some(prio), _) => (prio, NiceValue::default()),
            (None, Some(nice)) => (Priority::from(nice), nice),
            (None, None) => match creator.as_ref() {
                Some((prio, nice, _)) => (*prio, *nice),
                None => (
                    Priority::new(self.config().thread.default_priority),
                    NiceValue::default(),
                ),
            },
        };
        let ncpus = self.sched.ncpus();
        let affinity = match (attrs.affinity(), creator) {
            (Some(affinity), _) => affinity.clone(),
            (None, Some((_, _, affinity))) if affinity.ncpus() == ncpus => affinity,
            _ => CpuSet::new_full(ncpus),
        };
        (prio, nice, affinity)
    }

    /// Admit an embryo to the run queues.
    pub fn thread_start(&self, thread: &ThreadRef) -> Result<()> {
        let mut inner = thread.inner();
        if inner.state() != ThreadState::Embryo {
            return_errno!(EINVAL, "the thread has already started");
        }
        self.sched_park(thread, &mut inner)
    }

    /// Create and start a thread.
    pub fn thread_spawn<F>(
        &self,
        group: &ThreadGroupRef,
        attrs: ThreadAttrs,
        entry: F,
    ) -> Result<ThreadRef>
    where
        F: FnOnce(&Arc<Kernel>) -> i32 + Send + 'static,
    {
        let thread = self.thread_create(group, attrs, entry)?;
        if let Err(e) = self.thread_start(&thread) {
            // The embryo dies without running and is freed at once
            self.thread_kill(&thread, SIGKILL)?;
            let _ = self.thread_reap(&thread);
            return Err(e);
        }
        Ok(thread)
    }
}

fn thread_trampoline(kernel: Weak<Kernel>, thread: ThreadRef, entry: ThreadEntry) {
    // The dispatch loop handed over our lock
    let killed = unsafe { thread.inner_lock().adopt() }.is_killed();
    let kernel = match kernel.upgrade() {
        Some(kernel) => kernel,
        None => panic!("thread {} dispatched after shutdown", thread.tid()),
    };
    let tid = thread.tid();
    current::set(thread);
    if killed {
        debug!("thread {} was killed before it started", tid);
        kernel.thread_exit(TermStatus::Exited(0));
    }
    trace!("thread {} starts", tid);

    let status = match panic::catch_unwind(AssertUnwindSafe(|| entry(&kernel))) {
        Ok(code) => TermStatus::Exited(code as u8),
        Err(payload) => {
            if payload.is::<Retired>() {
                panic::resume_unwind(payload);
            }
            error!("thread {} panicked", tid);
            TermStatus::Dumped(SIGABRT)
        }
    };
    kernel.thread_exit(status)
}
