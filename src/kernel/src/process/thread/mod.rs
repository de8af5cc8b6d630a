use std::fmt;

use spin::Once;

use super::{TermStatus, ThreadGroup, ThreadGroupRef};
use crate::arch::Context;
use crate::events::{Cond, SleepQueue};
use crate::prelude::*;
use crate::sched::{CpuSet, Level, NiceValue, Priority};
use crate::signal::{SigNum, SigQueues, SigSet};

pub use self::attrs::{ThreadAttrs, ThreadAttrsBuilder};
pub use self::state::{SleepKind, ThreadFlags, ThreadState, WakeReason};

mod attrs;
mod state;

pub type ThreadRef = Arc<Thread>;

pub struct Thread {
    // Immutable info
    tid: pid_t,
    name: String,
    tgroup: Weak<ThreadGroup>,
    // Mutable info
    inner: SpinLock<ThreadInner>,
    context: Once<Arc<dyn Context>>,
    // Join
    exit_cond: Cond,
    // Signal
    sig_queues: SpinLock<SigQueues>,
    sig_mask: SpinLock<SigSet>,
    sig_waiters: SleepQueue,
}

/// The part of a thread guarded by the thread's own lock.
pub struct ThreadInner {
    state: ThreadState,
    pub(crate) flags: ThreadFlags,
    // Scheduling
    pub(crate) prio: Priority,
    pub(crate) nice: NiceValue,
    pub(crate) level: Level,
    pub(crate) timeslice: u32,
    pub(crate) age: u64,
    pub(crate) affinity: CpuSet,
    pub(crate) cpu: Option<usize>,
    // Sleeping
    pub(crate) sleeping_on: Option<SleepQueue>,
    pub(crate) wake_reason: WakeReason,
    pub(crate) sleep_seq: u64,
    // Termination
    pub(crate) term_status: Option<TermStatus>,
    pub(crate) kill_signal: Option<SigNum>,
}

impl Thread {
    pub(crate) fn new(
        tid: pid_t,
        name: String,
        tgroup: Weak<ThreadGroup>,
        prio: Priority,
        nice: NiceValue,
        affinity: CpuSet,
        sig_mask: SigSet,
    ) -> Self {
        let inner = ThreadInner {
            state: ThreadState::Embryo,
            flags: ThreadFlags::empty(),
            prio,
            nice,
            level: prio.level(),
            timeslice: 0,
            age: 0,
            affinity,
            cpu: None,
            sleeping_on: None,
            wake_reason: WakeReason::Normal,
            sleep_seq: 0,
            term_status: None,
            kill_signal: None,
        };
        Self {
            tid,
            name,
            tgroup,
            inner: SpinLock::new(inner),
            context: Once::new(),
            exit_cond: Cond::new(),
            sig_queues: SpinLock::new(SigQueues::new()),
            sig_mask: SpinLock::new(sig_mask),
            sig_waiters: SleepQueue::new(),
        }
    }

    pub fn tid(&self) -> pid_t {
        self.tid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The group this thread belongs to, unless the group is already gone.
    pub fn tgroup(&self) -> Option<ThreadGroupRef> {
        self.tgroup.upgrade()
    }

    #[track_caller]
    pub fn inner(&self) -> SpinLockGuard<'_, ThreadInner> {
        self.inner.lock()
    }

    pub(crate) fn inner_lock(&self) -> &SpinLock<ThreadInner> {
        &self.inner
    }

    pub fn state(&self) -> ThreadState {
        self.inner().state()
    }

    pub fn flags(&self) -> ThreadFlags {
        self.inner().flags
    }

    pub fn is_main(&self) -> bool {
        self.flags().contains(ThreadFlags::MAIN)
    }

    pub fn term_status(&self) -> Option<TermStatus> {
        self.inner().term_status
    }

    pub(crate) fn set_context(&self, ctx: Arc<dyn Context>) {
        self.context.call_once(|| ctx);
    }

    /// The arch context. Every thread gets one before it leaves EMBRYO.
    pub(crate) fn context(&self) -> &Arc<dyn Context> {
        match self.context.get() {
            Some(ctx) => ctx,
            None => panic!("thread {} has no context", self.tid),
        }
    }

    /// Broadcast when the thread becomes a zombie.
    pub fn exit_cond(&self) -> &Cond {
        &self.exit_cond
    }

    /// Get the signal queues for thread-directed signals.
    pub fn sig_queues(&self) -> &SpinLock<SigQueues> {
        &self.sig_queues
    }

    /// Get the per-thread signal mask.
    pub fn sig_mask(&self) -> &SpinLock<SigSet> {
        &self.sig_mask
    }

    /// Whether a pending signal should cut an interruptible sleep short:
    /// it is either unblocked or awaited by `sigtimedwait`.
    pub fn has_pending_signal(&self) -> bool {
        let mask = *self.sig_mask.lock();
        let queues = self.sig_queues.lock();
        if queues.is_empty() {
            return false;
        }
        let pending = queues.pending();
        !(pending & !mask).empty() || pending.intersects(queues.waited())
    }

    /// Where the thread sleeps inside `sigtimedwait`.
    pub(crate) fn sig_waiters(&self) -> &SleepQueue {
        &self.sig_waiters
    }
}

impl ThreadInner {
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Move to a new state. An illegal transition is a kernel bug.
    #[track_caller]
    pub(crate) fn set_state(&mut self, next: ThreadState) {
        if !self.state.can_become(next) {
            panic!("illegal thread transition {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    pub fn flags(&self) -> ThreadFlags {
        self.flags
    }

    pub fn is_killed(&self) -> bool {
        self.flags.contains(ThreadFlags::KILLED)
    }

    pub fn priority(&self) -> Priority {
        self.prio
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn affinity(&self) -> &CpuSet {
        &self.affinity
    }

    pub fn cpu(&self) -> Option<usize> {
        self.cpu
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        self.tid == other.tid
    }
}

impl Eq for Thread {}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Thread");
        s.field("tid", &self.tid).field("name", &self.name);
        // Never spin inside a formatter
        match self.inner.try_lock() {
            Some(inner) => s
                .field("state", &inner.state)
                .field("flags", &inner.flags)
                .field("level", &inner.level),
            None => s.field("inner", &"<locked>"),
        };
        s.finish()
    }
}
