use std::fmt;

use super::SleepQueue;
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::SleepKind;

/// A condition variable.
///
/// The caller's lock guards the condition itself. `wait` puts the caller on
/// the wait queue before it drops the lock, so a `signal` or `broadcast`
/// issued under the same lock is never lost.
pub struct Cond {
    count: SpinLock<usize>,
    waiters: SleepQueue,
}

impl Cond {
    pub fn new() -> Self {
        Self {
            count: SpinLock::new(0),
            waiters: SleepQueue::new(),
        }
    }

    /// Release `guard`, sleep until signaled, then re-acquire the lock.
    ///
    /// Returns `EINTR` if the sleep was interrupted, e.g., by a kill. The
    /// lock is re-acquired in every case.
    pub fn wait<'a, T: ?Sized>(
        &self,
        kernel: &Kernel,
        guard: SpinLockGuard<'a, T>,
    ) -> (SpinLockGuard<'a, T>, Result<()>) {
        *self.count.lock() += 1;
        let (guard, res) =
            kernel.sched_sleep_with(&self.waiters, SleepKind::Interruptible, guard);
        {
            let mut count = self.count.lock();
            *count = count.saturating_sub(1);
        }
        (guard, res)
    }

    /// Wake the longest waiter, if any.
    pub fn signal(&self, kernel: &Kernel) -> Result<bool> {
        Ok(kernel.sched_wake1(&self.waiters)?.is_some())
    }

    /// Wake every waiter and reset the count. Returns the number woken.
    pub fn broadcast(&self, kernel: &Kernel) -> Result<usize> {
        *self.count.lock() = 0;
        kernel.sched_wakeall(&self.waiters)
    }

    /// The number of threads waiting since the last broadcast.
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    pub fn waiters(&self) -> &SleepQueue {
        &self.waiters
    }
}

impl Default for Cond {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cond")
            .field("count", &self.count())
            .field("waiters", &self.waiters.len())
            .finish()
    }
}
