//! Dispatching, parking and the suspend-point lock handoff.
//!
//! A thread that stops running calls `Kernel::sched` with its own lock held
//! and its state already changed. The lock travels with the CPU: the thread
//! relinquishes it, the dispatch loop adopts it right after the switch, and
//! the loop relinquishes it again before it switches to the thread next
//! time. A thread state change is therefore never observed half-done.

use std::sync::Arc;

use super::{Level, RunEntry};
use crate::arch::Context;
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::{current, Thread, ThreadInner, ThreadRef, ThreadState};
use crate::sched::CpuSet;
use crate::util::sync::irq;

impl Kernel {
    /// The dispatch loop of a CPU. Returns once the kernel shuts down.
    pub(crate) fn schedule(&self, cpu: usize) {
        info!("cpu {} enters the dispatch loop", cpu);
        let cpu_ctx = self.arch().cpu_context(cpu);
        while !self.sched.is_shutdown() {
            match self.sched_next(cpu) {
                Some((thread, level)) => self.dispatch(cpu, &cpu_ctx, thread, level),
                None => {
                    let cpu_state = self.sched.cpu(cpu);
                    cpu_state.set_idle(true);
                    self.arch().halt(cpu);
                    cpu_state.set_idle(false);
                }
            }
        }
        info!("cpu {} leaves the dispatch loop", cpu);
    }

    /// Pick the highest-priority ready thread that may run on `cpu`.
    pub(crate) fn sched_next(&self, cpu: usize) -> Option<(ThreadRef, Level)> {
        self.sched
            .runqueues
            .lock()
            .dequeue_for(cpu)
            .map(|entry| (entry.item, entry.level))
    }

    fn dispatch(&self, cpu: usize, cpu_ctx: &Arc<dyn Context>, thread: ThreadRef, level: Level) {
        let cpu_state = self.sched.cpu(cpu);
        let mut inner = thread.inner();
        if inner.state() != ThreadState::Ready {
            panic!(
                "dispatching thread {} in state {:?}",
                thread.tid(),
                inner.state()
            );
        }
        inner.set_state(ThreadState::Running);
        inner.cpu = Some(cpu);
        inner.level = level;
        inner.timeslice = self.config().sched.level_quantum[level.idx()];
        inner.age = 0;
        *cpu_state.current.lock() = Some(thread.clone());
        cpu_state.clear_need_resched();
        cpu_state.nr_switches.inc();
        trace!("switch to thread {} at level {}", thread.tid(), level.idx());

        let lock = SpinLockGuard::relinquish(inner);
        self.arch().switch(&**cpu_ctx, &**thread.context(), cpu);
        let inner = unsafe { lock.adopt() };

        *cpu_state.current.lock() = None;
        let is_zombie = inner.state() == ThreadState::Zombie;
        drop(inner);
        if is_zombie {
            self.sched_putzombie(&thread);
        }
    }

    /// Give up the CPU. The caller is the current thread, holding its own
    /// lock, with its state already changed away from RUNNING.
    ///
    /// Returns with the lock held again once the thread is dispatched.
    pub(crate) fn sched<'a>(
        &self,
        thread: &'a Thread,
        inner: SpinLockGuard<'a, ThreadInner>,
    ) -> SpinLockGuard<'a, ThreadInner> {
        debug_assert!(inner.state() != ThreadState::Running);
        debug_assert_eq!(irq::depth(), 1, "switching away with other locks held");
        let cpu = match inner.cpu {
            Some(cpu) => cpu,
            None => panic!("thread {} is not on any CPU", thread.tid()),
        };
        let lock = SpinLockGuard::relinquish(inner);
        let cpu_ctx = self.arch().cpu_context(cpu);
        self.arch().switch(&**thread.context(), &*cpu_ctx, cpu);
        unsafe { lock.adopt() }
    }

    /// Put a thread on the run queues.
    ///
    /// Legal for EMBRYO, SLEEPING, STOPPED and RUNNING (yield) threads.
    /// Fails with `EINVAL` for any other state or for an affinity that
    /// admits no CPU.
    pub(crate) fn sched_park(&self, thread: &ThreadRef, inner: &mut ThreadInner) -> Result<()> {
        let state = inner.state();
        if !state.is_parkable() {
            return_errno!(EINVAL, "the thread cannot be parked");
        }
        if !inner.affinity.iter().any(|cpu| cpu < self.sched.ncpus()) {
            return_errno!(EINVAL, "the affinity admits no online CPU");
        }
        match state {
            ThreadState::Embryo => {
                self.sched.embryos.lock().remove(thread);
            }
            ThreadState::Sleeping(_) => {
                // Sleeping is voluntary, so drop any decay
                inner.level = inner.prio.level();
                inner.age = 0;
            }
            _ => {}
        }
        inner.set_state(ThreadState::Ready);
        let entry = RunEntry {
            item: thread.clone(),
            level: inner.level,
            affinity: inner.affinity.clone(),
            enqueued_at: self.sched.jiffies(),
        };
        self.sched.runqueues.lock().enqueue(entry);
        self.kick_for(&inner.affinity);
        Ok(())
    }

    /// Let other ready threads run.
    pub fn sched_yield(&self) -> Result<()> {
        let thread = current::get();
        let mut inner = thread.inner();
        self.sched_park(&thread, &mut inner)?;
        drop(self.sched(&thread, inner));
        Ok(())
    }

    /// Give up the CPU if the tick asked for it.
    ///
    /// A thread whose timeslice ran out drops one level.
    pub fn preempt_point(&self) {
        let thread = current::get();
        let mut inner = thread.inner();
        let cpu = match inner.cpu {
            Some(cpu) => cpu,
            None => return,
        };
        if !self.sched.cpu(cpu).take_need_resched() {
            return;
        }
        if inner.timeslice == 0 {
            inner.level = inner.level.demote();
        }
        if let Err(e) = self.sched_park(&thread, &mut inner) {
            warn!("preemption of thread {} failed: {}", thread.tid(), e);
            return;
        }
        drop(self.sched(&thread, inner));
    }

    /// Record a thread that just became a zombie and tell its joiners.
    pub(crate) fn sched_putzombie(&self, thread: &ThreadRef) {
        debug_assert!(thread.state() == ThreadState::Zombie);
        if let Err(e) = self.sched.zombies.lock().enqueue(thread.clone(), true) {
            warn!("thread {} is already a zombie: {}", thread.tid(), e);
        }
        if let Err(e) = thread.exit_cond().broadcast(self) {
            warn!("failed to wake the joiners of {}: {}", thread.tid(), e);
        }
    }

    // Prefer an idle CPU; otherwise poke the first admitted one.
    pub(crate) fn kick_for(&self, affinity: &CpuSet) {
        let ncpus = self.sched.ncpus();
        let mut admitted = affinity.iter().filter(|&cpu| cpu < ncpus);
        let first = admitted.next();
        let target = first
            .into_iter()
            .chain(admitted)
            .find(|&cpu| self.sched.cpu(cpu).is_idle())
            .or(first);
        if let Some(cpu) = target {
            self.arch().kick(cpu);
        }
    }
}
