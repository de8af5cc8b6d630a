//! Sleeping on and waking from sleep queues.
//!
//! Lock order: the caller's lock, then the sleep queue, then the thread.

use crate::events::SleepQueue;
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::{current, SleepKind, ThreadRef, ThreadState, WakeReason};

impl Kernel {
    /// Sleep on `queue` until woken.
    ///
    /// Returns `EINTR` if the thread is killed, or if an interruptible sleep
    /// is interrupted by a signal or a stop request.
    pub fn sched_sleep(&self, queue: &SleepQueue, kind: SleepKind) -> Result<()> {
        self.sleep_on::<()>(queue, kind, None, None).1
    }

    /// Like `sched_sleep`, but release `guard` once the thread is on the
    /// queue and re-acquire the lock after waking, whatever the outcome.
    pub fn sched_sleep_with<'a, T: ?Sized>(
        &self,
        queue: &SleepQueue,
        kind: SleepKind,
        guard: SpinLockGuard<'a, T>,
    ) -> (SpinLockGuard<'a, T>, Result<()>) {
        match self.sleep_on(queue, kind, Some(guard), None) {
            (Some(guard), res) => (guard, res),
            (None, _) => unreachable!("the caller lock is always re-acquired"),
        }
    }

    /// Sleep on `queue` for at most `jiffies` ticks. Fails with `ETIMEDOUT`
    /// when the time runs out. A timeout too far away to be reached never
    /// fires.
    pub fn sched_sleep_timeout(
        &self,
        queue: &SleepQueue,
        kind: SleepKind,
        jiffies: u64,
    ) -> Result<()> {
        let deadline = self.sched.deadline_after(jiffies);
        self.sleep_on::<()>(queue, kind, None, deadline).1
    }

    /// Sleep for `jiffies` ticks.
    pub fn sched_sleep_jiffies(&self, jiffies: u64) -> Result<()> {
        let deadline = self.sched.deadline_after(jiffies);
        // A wakeup of the jiffies queue is only a hint to recheck
        while deadline.map_or(true, |deadline| self.sched.jiffies() < deadline) {
            self.sched_sleep(&self.sched.jiffies_queue, SleepKind::Interruptible)?;
        }
        Ok(())
    }

    /// Sleep for at least `ms` milliseconds.
    pub fn sched_sleep_ms(&self, ms: u64) -> Result<()> {
        self.sched_sleep_jiffies(self.ms_to_jiffies(ms))
    }

    fn sleep_on<'a, T: ?Sized>(
        &self,
        queue: &SleepQueue,
        kind: SleepKind,
        guard: Option<SpinLockGuard<'a, T>>,
        deadline: Option<u64>,
    ) -> (Option<SpinLockGuard<'a, T>>, Result<()>) {
        let thread = current::get();
        let mut queued = queue.lock();
        let mut inner = thread.inner();
        if inner.is_killed() {
            return (guard, Err(errno!(EINTR, "killed before sleeping")));
        }
        if kind == SleepKind::Interruptible && thread.has_pending_signal() {
            return (guard, Err(errno!(EINTR, "a signal is pending")));
        }
        if let Err(e) = queued.enqueue(thread.clone(), true) {
            panic!("thread {} sleeps twice on one queue: {}", thread.tid(), e);
        }
        inner.set_state(ThreadState::Sleeping(kind));
        inner.sleeping_on = Some(queue.clone());
        inner.wake_reason = WakeReason::Normal;
        inner.sleep_seq += 1;
        let seq = inner.sleep_seq;
        if let Some(deadline) = deadline {
            self.sched
                .timeouts
                .lock()
                .add(deadline, Arc::downgrade(&thread), seq);
        }
        drop(queued);
        let relock = guard.map(SpinLockGuard::unlock);

        let mut inner = self.sched(&thread, inner);

        if deadline.is_some() {
            self.sched.timeouts.lock().remove(thread.tid(), seq);
        }
        let res = if inner.is_killed() {
            Err(errno!(EINTR, "killed while sleeping"))
        } else {
            match inner.wake_reason {
                WakeReason::Normal => Ok(()),
                WakeReason::Interrupted => Err(errno!(EINTR, "interrupted while sleeping")),
                WakeReason::Timeout => Err(errno!(ETIMEDOUT, "the sleep timed out")),
            }
        };
        inner.wake_reason = WakeReason::Normal;
        drop(inner);
        (relock.map(|lock| lock.lock()), res)
    }

    /// Wake the thread at the head of `queue`.
    ///
    /// If the thread cannot be put on the run queues, it goes back to the
    /// head of the queue, still sleeping, and the error is returned.
    pub fn sched_wake1(&self, queue: &SleepQueue) -> Result<Option<ThreadRef>> {
        let mut queued = queue.lock();
        let thread = match queued.dequeue() {
            Some(thread) => thread,
            None => return Ok(None),
        };
        let mut inner = thread.inner();
        debug_assert!(inner.state().is_sleeping());
        inner.sleeping_on = None;
        if let Err(e) = self.sched_park(&thread, &mut inner) {
            inner.sleeping_on = Some(queue.clone());
            drop(inner);
            queued.enqueue_head(thread);
            return Err(e);
        }
        drop(inner);
        Ok(Some(thread))
    }

    /// Wake every thread on `queue`, in FIFO order. Returns the number woken.
    pub fn sched_wakeall(&self, queue: &SleepQueue) -> Result<usize> {
        let mut nr_woken = 0;
        while self.sched_wake1(queue)?.is_some() {
            nr_woken += 1;
        }
        Ok(nr_woken)
    }

    /// Pull a sleeping thread off its sleep queue before it is woken.
    ///
    /// Kills and signals interrupt interruptible sleeps only; a timeout
    /// ends either kind. With `seq`, only the sleep numbered `seq` is
    /// interrupted. Returns whether the thread was woken.
    pub(crate) fn interrupt(
        &self,
        thread: &ThreadRef,
        reason: WakeReason,
        seq: Option<u64>,
    ) -> Result<bool> {
        let queue = {
            let inner = thread.inner();
            if !Self::can_interrupt(&inner, reason, seq) {
                return Ok(false);
            }
            match inner.sleeping_on.clone() {
                Some(queue) => queue,
                None => return Ok(false),
            }
        };

        let mut queued = queue.lock();
        let mut inner = thread.inner();
        // The thread may have been woken and gone to sleep elsewhere meanwhile
        let same_sleep = inner
            .sleeping_on
            .as_ref()
            .map_or(false, |sleeping_on| sleeping_on.same_as(&queue));
        if !same_sleep || !Self::can_interrupt(&inner, reason, seq) {
            return Ok(false);
        }
        queued.remove(thread);
        inner.sleeping_on = None;
        inner.wake_reason = reason;
        if let Err(e) = self.sched_park(thread, &mut inner) {
            inner.sleeping_on = Some(queue.clone());
            inner.wake_reason = WakeReason::Normal;
            queued.enqueue_head(thread.clone());
            return Err(e);
        }
        trace!("thread {} interrupted ({:?})", thread.tid(), reason);
        Ok(true)
    }

    fn can_interrupt(
        inner: &crate::process::ThreadInner,
        reason: WakeReason,
        seq: Option<u64>,
    ) -> bool {
        let state = inner.state();
        let kind_ok = match reason {
            WakeReason::Timeout => state.is_sleeping(),
            _ => state.is_interruptible(),
        };
        kind_ok && seq.map_or(true, |seq| seq == inner.sleep_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{TermStatus, ThreadAttrs};
    use crate::signal::constants::SIGKILL;
    use crate::test_util::*;

    // Spawn a member of the caller's group that sleeps on `queue` and
    // records how the sleep ended.
    fn spawn_sleeper(
        kernel: &Kernel,
        queue: &SleepQueue,
        kind: SleepKind,
        timeout: Option<u64>,
    ) -> (ThreadRef, Arc<SpinLock<Option<Result<()>>>>) {
        let group = kernel.current_tgroup().unwrap();
        let outcome = Arc::new(SpinLock::new(None));
        let (queue, slot) = (queue.clone(), outcome.clone());
        let thread = kernel
            .thread_spawn(&group, ThreadAttrs::default(), move |kernel| {
                let res = match timeout {
                    Some(jiffies) => kernel.sched_sleep_timeout(&queue, kind, jiffies),
                    None => kernel.sched_sleep(&queue, kind),
                };
                *slot.lock() = Some(res);
                0
            })
            .unwrap();
        (thread, outcome)
    }

    #[test]
    fn wake_in_fifo_order() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let queue = SleepQueue::new();
            let mut tids = Vec::new();
            for _ in 0..3 {
                let (thread, _) = spawn_sleeper(kernel, &queue, SleepKind::Uninterruptible, None);
                tids.push(thread.tid());
            }
            while queue.len() < 3 {
                kernel.sched_yield().unwrap();
            }
            assert_eq!(queue.tids(), tids);
            for &tid in tids.iter() {
                let woken = kernel.sched_wake1(&queue).unwrap().unwrap();
                assert_eq!(woken.tid(), tid);
                assert_eq!(woken.state(), ThreadState::Ready);
            }
            assert!(kernel.sched_wake1(&queue).unwrap().is_none());
            for tid in tids {
                assert_eq!(kernel.thread_join(tid).unwrap(), TermStatus::Exited(0));
            }
        });
        kernel.shutdown();
    }

    #[test]
    fn kill_while_sleeping() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let queue = SleepQueue::new();
            let (thread, outcome) =
                spawn_sleeper(kernel, &queue, SleepKind::Interruptible, None);
            while queue.is_empty() {
                kernel.sched_yield().unwrap();
            }
            kernel.thread_kill(&thread, SIGKILL).unwrap();
            assert!(queue.is_empty());

            let status = kernel.thread_join(thread.tid()).unwrap();
            assert_eq!(status, TermStatus::Killed(SIGKILL));
            let res = outcome.lock().take().unwrap();
            assert_eq!(res.unwrap_err().errno(), EINTR);
        });
        kernel.shutdown();
    }

    #[test]
    fn uninterruptible_sleep_outlives_a_kill() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let queue = SleepQueue::new();
            let (thread, outcome) =
                spawn_sleeper(kernel, &queue, SleepKind::Uninterruptible, None);
            while queue.is_empty() {
                kernel.sched_yield().unwrap();
            }
            kernel.thread_kill(&thread, SIGKILL).unwrap();
            assert_eq!(queue.len(), 1);
            assert_eq!(
                thread.state(),
                ThreadState::Sleeping(SleepKind::Uninterruptible)
            );

            kernel.sched_wakeall(&queue).unwrap();
            let status = kernel.thread_join(thread.tid()).unwrap();
            assert_eq!(status, TermStatus::Killed(SIGKILL));
            // Killed by the time it looked at the wakeup
            let res = outcome.lock().take().unwrap();
            assert_eq!(res.unwrap_err().errno(), EINTR);
        });
        kernel.shutdown();
    }

    #[test]
    fn sleep_times_out() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let queue = SleepQueue::new();
            let (thread, outcome) =
                spawn_sleeper(kernel, &queue, SleepKind::Interruptible, Some(3));
            tick_until(kernel, || outcome.lock().is_some());
            let res = outcome.lock().take().unwrap();
            assert_eq!(res.unwrap_err().errno(), ETIMEDOUT);
            assert!(queue.is_empty());
            assert!(kernel.scheduler().timeouts.lock().len() == 0);
            kernel.thread_join(thread.tid()).unwrap();
        });
        kernel.shutdown();
    }

    #[test]
    fn far_timeout_never_fires() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            kernel.jiffies_update();
            let queue = SleepQueue::new();
            let (thread, outcome) =
                spawn_sleeper(kernel, &queue, SleepKind::Interruptible, Some(u64::MAX));
            while queue.is_empty() {
                kernel.sched_yield().unwrap();
            }
            assert_eq!(kernel.scheduler().timeouts.lock().len(), 0);
            for _ in 0..5 {
                kernel.jiffies_update();
            }
            assert!(outcome.lock().is_none());

            kernel.sched_wake1(&queue).unwrap().unwrap();
            kernel.thread_join(thread.tid()).unwrap();
            assert!(outcome.lock().take().unwrap().is_ok());
        });
        kernel.shutdown();
    }

    #[test]
    fn sleep_for_jiffies() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let group = kernel.current_tgroup().unwrap();
            let start = kernel.scheduler().jiffies();
            let end = Arc::new(SpinLock::new(None));
            let slot = end.clone();
            let thread = kernel
                .thread_spawn(&group, ThreadAttrs::default(), move |kernel| {
                    kernel.sched_sleep_jiffies(5).unwrap();
                    *slot.lock() = Some(kernel.scheduler().jiffies());
                    0
                })
                .unwrap();
            tick_until(kernel, || end.lock().is_some());
            let end = end.lock().unwrap();
            assert!(end >= start + 5);
            kernel.thread_join(thread.tid()).unwrap();
        });
        kernel.shutdown();
    }

    #[test]
    fn sleep_rounds_ms_up_to_ticks() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let group = kernel.current_tgroup().unwrap();
            let start = kernel.scheduler().jiffies();
            let end = Arc::new(SpinLock::new(None));
            let slot = end.clone();
            let thread = kernel
                .thread_spawn(&group, ThreadAttrs::default(), move |kernel| {
                    // 25ms at 100Hz is three ticks
                    kernel.sched_sleep_ms(25).unwrap();
                    *slot.lock() = Some(kernel.scheduler().jiffies());
                    0
                })
                .unwrap();
            tick_until(kernel, || end.lock().is_some());
            let end = end.lock().unwrap();
            assert!(end >= start + 3);
            kernel.thread_join(thread.tid()).unwrap();
        });
        kernel.shutdown();
    }
}
