use super::{SigInfo, SigSet};
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::{current, SleepKind, ThreadRef};

impl Kernel {
    /// Wait for one of the signals in `interest` and take it off the queue
    /// without running its action.
    ///
    /// The signals in `interest` are accepted while they are blocked. With
    /// a timeout of `Some(jiffies)`, fails with `EAGAIN` when none arrives
    /// in time; a timeout too large to be reached waits forever. Fails with `EINTR` when interrupted by another signal.
    pub fn sigtimedwait(&self, interest: SigSet, timeout: Option<u64>) -> Result<SigInfo> {
        debug!("sigtimedwait: interest = {:?}, timeout = {:?}", interest, timeout);
        let thread = current::get();
        let interest = interest & !SigSet::unblockable();
        let deadline = timeout.and_then(|jiffies| self.sched.deadline_after(jiffies));

        let res = self.do_sigtimedwait(&thread, interest, deadline);
        thread.sig_queues().lock().set_waited(SigSet::new_empty());
        res
    }

    fn do_sigtimedwait(
        &self,
        thread: &ThreadRef,
        interest: SigSet,
        deadline: Option<u64>,
    ) -> Result<SigInfo> {
        loop {
            {
                let mut sig_queues = thread.sig_queues().lock();
                let ready = sig_queues.pending() & interest;
                if let Some(signum) = ready.iter().next() {
                    if let Some(signal) = sig_queues.dequeue(signum) {
                        return Ok(signal.to_info());
                    }
                }
                sig_queues.set_waited(interest);
            }

            let queue = thread.sig_waiters();
            let res = match deadline {
                None => self.sched_sleep(queue, SleepKind::Interruptible),
                Some(deadline) => {
                    let now = self.sched.jiffies();
                    if now >= deadline {
                        return_errno!(EAGAIN, "no signal arrived in time");
                    }
                    self.sched_sleep_timeout(queue, SleepKind::Interruptible, deadline - now)
                }
            };
            match res {
                Ok(()) => {}
                Err(e) if e.errno() == ETIMEDOUT => {}
                Err(e) if e.errno() == EINTR => {
                    // A waited signal interrupts the sleep too
                    let arrived = thread.sig_queues().lock().pending().intersects(interest);
                    if !arrived {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ThreadAttrs, ThreadAttrsBuilder};
    use crate::signal::constants::*;
    use crate::test_util::*;

    type Outcome = Arc<SpinLock<Option<Result<SigInfo>>>>;

    fn spawn_waiter(
        kernel: &Kernel,
        attrs: ThreadAttrs,
        interest: SigSet,
        timeout: Option<u64>,
    ) -> (ThreadRef, Outcome) {
        let group = kernel.current_tgroup().unwrap();
        let outcome: Outcome = Arc::new(SpinLock::new(None));
        let slot = outcome.clone();
        let thread = kernel
            .thread_spawn(&group, attrs, move |kernel| {
                let res = kernel.sigtimedwait(interest, timeout);
                *slot.lock() = Some(res);
                0
            })
            .unwrap();
        (thread, outcome)
    }

    #[test]
    fn take_a_blocked_signal() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let attrs = ThreadAttrsBuilder::default()
                .sig_mask(SigSet::from(SIGUSR1))
                .build()
                .unwrap();
            let (thread, outcome) = spawn_waiter(kernel, attrs, SigSet::from(SIGUSR1), None);
            while !thread.state().is_sleeping() {
                kernel.sched_yield().unwrap();
            }
            let pid = kernel.getpid().unwrap();
            kernel.tgkill(pid, thread.tid(), SIGUSR1.as_u8()).unwrap();
            kernel.thread_join(thread.tid()).unwrap();

            let info = outcome.lock().take().unwrap().unwrap();
            assert_eq!(info.signo, SIGUSR1);
            assert_eq!(info.pid, pid);
            assert!(thread.sig_queues().lock().waited().empty());
        });
        kernel.shutdown();
    }

    #[test]
    fn already_pending() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let me = current::get();
            me.sig_queues().lock().enqueue(Box::new(crate::signal::KernelSignal::new(SIGUSR2)));
            let info = kernel.sigtimedwait(SigSet::from(SIGUSR2), Some(0)).unwrap();
            assert_eq!(info.signo, SIGUSR2);
            assert!(me.sig_queues().lock().is_empty());
        });
        kernel.shutdown();
    }

    #[test]
    fn time_out() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let interest = SigSet::from(SIGUSR2);
            let (thread, outcome) = spawn_waiter(kernel, ThreadAttrs::default(), interest, Some(2));
            tick_until(kernel, || outcome.lock().is_some());
            let res = outcome.lock().take().unwrap();
            assert_eq!(res.unwrap_err().errno(), EAGAIN);
            kernel.thread_join(thread.tid()).unwrap();
        });
        kernel.shutdown();
    }

    #[test]
    fn interrupted_by_another_signal() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let interest = SigSet::from(SIGUSR2);
            let (thread, outcome) = spawn_waiter(kernel, ThreadAttrs::default(), interest, None);
            while !thread.state().is_sleeping() {
                kernel.sched_yield().unwrap();
            }
            let pid = kernel.getpid().unwrap();
            kernel.tgkill(pid, thread.tid(), SIGUSR1.as_u8()).unwrap();
            kernel.thread_join(thread.tid()).unwrap();
            let res = outcome.lock().take().unwrap();
            assert_eq!(res.unwrap_err().errno(), EINTR);
        });
        kernel.shutdown();
    }
}
