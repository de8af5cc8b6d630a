/// The scheduling state of a thread.
///
/// Exactly one state holds at a time. Every change happens under the
/// thread's own lock and follows `ThreadState::can_become`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Allocated, not yet admitted to a run queue
    Embryo,
    Ready,
    Running,
    Sleeping(SleepKind),
    Stopped,
    /// Terminated, keeping its exit status until reaped
    Zombie,
    /// Reaped
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepKind {
    /// Woken early by kills, signals and timeouts
    Interruptible,
    /// Woken only by the event slept on
    Uninterruptible,
}

impl ThreadState {
    pub fn is_sleeping(&self) -> bool {
        matches!(self, ThreadState::Sleeping(_))
    }

    pub fn is_interruptible(&self) -> bool {
        *self == ThreadState::Sleeping(SleepKind::Interruptible)
    }

    /// Zombie or terminated.
    pub fn is_dead(&self) -> bool {
        matches!(self, ThreadState::Zombie | ThreadState::Terminated)
    }

    /// Whether `sched_park` may put a thread in this state on a run queue.
    pub fn is_parkable(&self) -> bool {
        matches!(
            self,
            ThreadState::Embryo
                | ThreadState::Sleeping(_)
                | ThreadState::Stopped
                | ThreadState::Running
        )
    }

    /// The legal transitions of the thread state machine.
    pub fn can_become(&self, next: ThreadState) -> bool {
        use ThreadState::*;
        match (*self, next) {
            (Embryo, Ready) | (Embryo, Zombie) => true,
            (Ready, Running) | (Ready, Zombie) => true,
            (Running, Ready) | (Running, Sleeping(_)) | (Running, Stopped) => true,
            (Running, Zombie) => true,
            (Sleeping(_), Ready) | (Sleeping(_), Zombie) => true,
            (Stopped, Ready) => true,
            (Zombie, Terminated) => true,
            _ => false,
        }
    }
}

bitflags! {
    pub struct ThreadFlags: u32 {
        /// Must terminate at its next check
        const KILLED    = 1 << 0;
        /// Job-control stop requested
        const STOPPED   = 1 << 1;
        /// Suspended by another member of the group
        const SUSPENDED = 1 << 2;
        /// Reaped by the zombie sweep instead of a join
        const DETACHED  = 1 << 3;
        /// The main thread of its group
        const MAIN      = 1 << 4;
    }
}

/// Why a sleeping thread was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    Normal,
    Interrupted,
    Timeout,
}
