use std::fmt;

use crate::prelude::*;
use crate::process::ThreadRef;
use crate::util::queue::Queue;

/// A FIFO of sleeping threads.
///
/// The queue itself is only a container; `Kernel::sched_sleep` puts the
/// current thread on it and `Kernel::sched_wake1`/`sched_wakeall` take
/// threads off. Cloning a `SleepQueue` gives another handle to the same queue.
///
/// A sleeping thread remembers the queue it sleeps on, so that it can be
/// interrupted without the waker knowing the queue.
#[derive(Clone, Default)]
pub struct SleepQueue {
    inner: Arc<SpinLock<Queue<ThreadRef>>>,
}

impl SleepQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[track_caller]
    pub fn lock(&self) -> SpinLockGuard<'_, Queue<ThreadRef>> {
        self.inner.lock()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether two handles refer to the same queue.
    pub fn same_as(&self, other: &SleepQueue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// TIDs of the sleepers, head first.
    pub fn tids(&self) -> Vec<pid_t> {
        self.inner.lock().iter().map(|thread| thread.tid()).collect()
    }
}

impl fmt::Debug for SleepQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SleepQueue")
            .field("addr", &Arc::as_ptr(&self.inner))
            .finish()
    }
}
