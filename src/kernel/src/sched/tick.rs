//! The timer tick.

use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::{Thread, ThreadFlags, ThreadRef, ThreadState, WakeReason};
use crate::util::sync::irq;

/// Pending sleep deadlines.
pub struct Timeouts {
    entries: Vec<TimeoutEntry>,
}

struct TimeoutEntry {
    deadline: u64,
    thread: Weak<Thread>,
    tid: pid_t,
    // Which sleep of the thread the deadline belongs to
    seq: u64,
}

impl Timeouts {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, deadline: u64, thread: Weak<Thread>, seq: u64) {
        let tid = thread.upgrade().map_or(0, |thread| thread.tid());
        self.entries.push(TimeoutEntry {
            deadline,
            thread,
            tid,
            seq,
        });
    }

    pub fn remove(&mut self, tid: pid_t, seq: u64) {
        self.entries
            .retain(|entry| !(entry.tid == tid && entry.seq == seq));
    }

    /// Remove the entries due at `now` and return their threads.
    fn take_expired(&mut self, now: u64) -> Vec<(Weak<Thread>, u64)> {
        let (expired, pending): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.deadline <= now);
        self.entries = pending;
        expired
            .into_iter()
            .map(|entry| (entry.thread, entry.seq))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Account one timer tick.
    ///
    /// Charges the running threads, wakes the jiffies queue, fires expired
    /// sleep deadlines, and periodically ages the run queues and sweeps
    /// detached zombies.
    pub fn jiffies_update(&self) {
        let _irq = irq::disable_local();
        let now = self.sched.jiffies.inc() as u64;

        for cpu in self.sched.cpus.iter() {
            // Never hold a CPU's slot while locking its thread
            let running = cpu.current.lock().clone();
            let thread = match running {
                Some(thread) => thread,
                None => continue,
            };
            let mut inner = thread.inner();
            if inner.state() != ThreadState::Running || inner.cpu != Some(cpu.id()) {
                continue;
            }
            inner.age += 1;
            inner.timeslice = inner.timeslice.saturating_sub(1);
            if inner.timeslice == 0 && !cpu.request_resched() {
                trace!("thread {} used up its timeslice", thread.tid());
            }
        }

        if let Err(e) = self.sched_wakeall(&self.sched.jiffies_queue) {
            warn!("failed to wake the jiffies sleepers: {}", e);
        }

        let expired = self.sched.timeouts.lock().take_expired(now);
        for (thread, seq) in expired {
            if let Some(thread) = thread.upgrade() {
                if let Err(e) = self.interrupt(&thread, WakeReason::Timeout, Some(seq)) {
                    warn!("failed to time out thread {}: {}", thread.tid(), e);
                }
            }
        }

        let config = &self.config().sched;
        if now % config.aging_interval == 0 {
            let promoted = self
                .sched
                .runqueues
                .lock()
                .age(now, config.starvation_threshold);
            if promoted > 0 {
                debug!("aging promoted {} threads", promoted);
            }
        }
        if now % config.zombie_sweep_interval == 0 {
            self.zombie_sweep();
        }
    }

    /// Reap the detached zombies. Returns how many were reaped.
    pub fn zombie_sweep(&self) -> usize {
        let detached: Vec<ThreadRef> = {
            let zombies = self.sched.zombies.lock();
            zombies
                .iter()
                .filter(|thread| thread.flags().contains(ThreadFlags::DETACHED))
                .cloned()
                .collect()
        };
        let mut nr_reaped = 0;
        for thread in detached {
            match self.thread_reap(&thread) {
                Ok(status) => {
                    debug!("swept thread {} ({:?})", thread.tid(), status);
                    nr_reaped += 1;
                }
                Err(e) => trace!("thread {} was reaped elsewhere: {}", thread.tid(), e),
            }
        }
        nr_reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{current, ThreadAttrs, ThreadAttrsBuilder};
    use crate::sched::{Level, Priority, NR_LEVELS};
    use crate::test_util::*;

    fn queued_level(kernel: &Kernel, thread: &ThreadRef) -> Option<usize> {
        let runqueues = kernel.scheduler().runqueues.lock();
        (0..NR_LEVELS).find(|&idx| {
            runqueues
                .level_iter(Level::new(idx).unwrap())
                .any(|entry| Arc::ptr_eq(&entry.item, thread))
        })
    }

    #[test]
    fn used_up_quantum_demotes() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let cpu = kernel.scheduler().cpu(0);
            let level = current::get().inner().level();
            let quantum = kernel.config().sched.level_quantum[level.idx()];
            for _ in 1..quantum {
                kernel.jiffies_update();
            }
            assert!(!cpu.need_resched());
            kernel.jiffies_update();
            assert!(cpu.need_resched());

            kernel.preempt_point();
            assert!(!cpu.need_resched());
            assert_eq!(current::get().inner().level(), level.demote());
            // Nothing asked for the CPU since
            kernel.preempt_point();
            assert_eq!(current::get().inner().level(), level.demote());
        });
        kernel.shutdown();
    }

    #[test]
    fn ticks_age_starving_threads() {
        let kernel = boot_with(
            r#"{ "sched": { "aging_interval": 2, "starvation_threshold": 2 }, "log_level": "warn" }"#,
        );
        run_in_kernel(&kernel, |kernel| {
            let group = kernel.current_tgroup().unwrap();
            let attrs = ThreadAttrsBuilder::default()
                .priority(Priority::LOWEST)
                .build()
                .unwrap();
            let low = kernel.thread_spawn(&group, attrs, |_| 0).unwrap();
            assert_eq!(kernel.scheduler().jiffies(), 0);
            assert_eq!(queued_level(kernel, &low), Some(7));

            kernel.jiffies_update();
            assert_eq!(queued_level(kernel, &low), Some(7));
            kernel.jiffies_update();
            assert_eq!(queued_level(kernel, &low), Some(6));
            kernel.jiffies_update();
            kernel.jiffies_update();
            assert_eq!(queued_level(kernel, &low), Some(5));
            kernel.thread_join(low.tid()).unwrap();
        });
        kernel.shutdown();
    }

    #[test]
    fn ticks_sweep_detached_zombies() {
        let kernel = boot_with(r#"{ "sched": { "zombie_sweep_interval": 3 }, "log_level": "warn" }"#);
        run_in_kernel(&kernel, |kernel| {
            let group = kernel.current_tgroup().unwrap();
            let attrs = ThreadAttrsBuilder::default().detached(true).build().unwrap();
            let thread = kernel.thread_spawn(&group, attrs, |_| 0).unwrap();
            while thread.state() != ThreadState::Zombie {
                kernel.sched_yield().unwrap();
            }
            assert_eq!(kernel.scheduler().nr_zombies(), 1);

            for _ in 0..3 {
                kernel.jiffies_update();
            }
            assert_eq!(thread.state(), ThreadState::Terminated);
            assert_eq!(kernel.scheduler().nr_zombies(), 0);
            assert!(kernel.thread_get(thread.tid()).is_err());

            // Joinable zombies are left for their joiner
            let joinable = kernel.thread_spawn(&group, ThreadAttrs::default(), |_| 0).unwrap();
            while joinable.state() != ThreadState::Zombie {
                kernel.sched_yield().unwrap();
            }
            for _ in 0..3 {
                kernel.jiffies_update();
            }
            assert_eq!(joinable.state(), ThreadState::Zombie);
            kernel.thread_join(joinable.tid()).unwrap();
        });
        kernel.shutdown();
    }

    #[test]
    fn expired_entries() {
        let mut timeouts = Timeouts::new();
        timeouts.add(5, Weak::new(), 1);
        timeouts.add(9, Weak::new(), 2);
        timeouts.add(3, Weak::new(), 3);
        let seqs: Vec<_> = timeouts.take_expired(5).into_iter().map(|(_, seq)| seq).collect();
        assert_eq!(seqs, vec![1, 3]);
        assert_eq!(timeouts.len(), 1);
        timeouts.remove(0, 2);
        assert_eq!(timeouts.len(), 0);
    }
}
