//! CPU scheduling for threads.
//!
//! Ready threads live on one set of system-wide run queues with
//! `NR_LEVELS` levels. Every CPU runs a dispatch loop (`Kernel::schedule`)
//! that picks the first thread of the highest non-empty level that its
//! affinity admits, and switches to it. A thread gives the CPU back only at
//! a suspend point: it sleeps, yields, stops, exits or honors a
//! `need_resched` set by the tick.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::events::SleepQueue;
use crate::prelude::*;
use crate::process::ThreadRef;
use crate::util::sync::AtomicWord;

use self::tick::Timeouts;

pub use self::cpu_set::CpuSet;
pub use self::priority::{Level, NiceValue, PrioWhich, Priority, NR_LEVELS};
pub use self::runqueues::{RunEntry, RunQueues};

mod cpu_set;
mod dispatch;
mod do_priority;
mod do_sched_affinity;
mod priority;
mod runqueues;
mod sleep;
mod tick;

/// The scheduler state shared by all CPUs.
pub struct Scheduler {
    pub(crate) runqueues: SpinLock<RunQueues<ThreadRef>>,
    /// Threads created but not yet started
    pub(crate) embryos: SleepQueue,
    /// Dead threads waiting to be reaped
    pub(crate) zombies: SleepQueue,
    pub(crate) cpus: Vec<Cpu>,
    pub(crate) jiffies: AtomicWord,
    /// Woken on every tick
    pub(crate) jiffies_queue: SleepQueue,
    pub(crate) timeouts: SpinLock<Timeouts>,
    shutdown: AtomicBool,
}

/// Per-CPU scheduling state.
pub struct Cpu {
    id: usize,
    pub(crate) current: SpinLock<Option<ThreadRef>>,
    // Nonzero while a reschedule is requested
    need_resched: AtomicWord,
    idle: AtomicBool,
    nr_switches: AtomicWord,
}

impl Scheduler {
    pub fn new(ncpus: usize) -> Self {
        Self {
            runqueues: SpinLock::new(RunQueues::new()),
            embryos: SleepQueue::new(),
            zombies: SleepQueue::new(),
            cpus: (0..ncpus).map(Cpu::new).collect(),
            jiffies: AtomicWord::new(0),
            jiffies_queue: SleepQueue::new(),
            timeouts: SpinLock::new(Timeouts::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn ncpus(&self) -> usize {
        self.cpus.len()
    }

    #[track_caller]
    pub fn cpu(&self, id: usize) -> &Cpu {
        &self.cpus[id]
    }

    pub fn jiffies(&self) -> u64 {
        self.jiffies.load() as u64
    }

    /// The tick `jiffies` from now. `None` when that does not fit in a
    /// `u64`, which callers treat as no deadline at all.
    pub fn deadline_after(&self, jiffies: u64) -> Option<u64> {
        self.jiffies().checked_add(jiffies)
    }

    /// The number of threads on the run queues.
    pub fn nr_ready(&self) -> usize {
        self.runqueues.lock().len()
    }

    pub fn nr_zombies(&self) -> usize {
        self.zombies.len()
    }

    pub fn nr_embryos(&self) -> usize {
        self.embryos.len()
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn set_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release)
    }
}

impl Cpu {
    fn new(id: usize) -> Self {
        Self {
            id,
            current: SpinLock::new(None),
            need_resched: AtomicWord::new(0),
            idle: AtomicBool::new(false),
            nr_switches: AtomicWord::new(0),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// The thread running on this CPU, if any.
    pub fn current(&self) -> Option<ThreadRef> {
        self.current.lock().clone()
    }

    pub fn need_resched(&self) -> bool {
        self.need_resched.load() != 0
    }

    /// Ask the thread running here to give up the CPU at its next preempt
    /// point. Returns whether a request was already pending.
    pub(crate) fn request_resched(&self) -> bool {
        self.need_resched.fetch_or(1) != 0
    }

    /// Consume a pending reschedule request.
    pub(crate) fn take_need_resched(&self) -> bool {
        self.need_resched.cas(1, 0) == 1
    }

    pub(crate) fn clear_need_resched(&self) {
        self.need_resched.store(0)
    }

    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    pub(crate) fn set_idle(&self, val: bool) {
        self.idle.store(val, Ordering::Release)
    }

    /// The number of context switches into threads on this CPU.
    pub fn nr_switches(&self) -> usize {
        self.nr_switches.load()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("id", &self.id)
            .field("need_resched", &self.need_resched())
            .field("idle", &self.is_idle())
            .field("nr_switches", &self.nr_switches())
            .finish()
    }
}
