use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};

use super::SleepQueue;
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::{current, SleepKind};
use crate::util::queue::QueuePos;

/// A sleeping mutex for kernel threads.
///
/// Contenders sleep on a FIFO. Unlocking hands the mutex directly to the
/// longest waiter, so a release wakes exactly one thread and the mutex
/// never appears free while someone waits.
pub struct KMutex<T: ?Sized> {
    owner: SpinLock<Option<pid_t>>,
    waiters: SleepQueue,
    value: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for KMutex<T> {}
unsafe impl<T: ?Sized + Send> Send for KMutex<T> {}

pub struct KMutexGuard<'a, T: ?Sized + 'a> {
    mutex: &'a KMutex<T>,
    kernel: &'a Kernel,
}

impl<T> KMutex<T> {
    pub fn new(val: T) -> Self {
        Self {
            owner: SpinLock::new(None),
            waiters: SleepQueue::new(),
            value: UnsafeCell::new(val),
        }
    }
}

impl<T: ?Sized> KMutex<T> {
    /// Acquire the mutex, sleeping while another thread holds it.
    ///
    /// Returns `EDEADLK` if the caller already holds it and `EINTR` if the
    /// caller is interrupted while waiting.
    pub fn lock<'a>(&'a self, kernel: &'a Kernel) -> Result<KMutexGuard<'a, T>> {
        let me = current::get().tid();
        let mut owner = self.owner.lock();
        match *owner {
            None => {
                *owner = Some(me);
                return Ok(KMutexGuard::new(self, kernel));
            }
            Some(tid) if tid == me => return_errno!(EDEADLK, "the mutex is held by the caller"),
            Some(_) => {}
        }
        loop {
            let (guard, res) =
                kernel.sched_sleep_with(&self.waiters, SleepKind::Interruptible, owner);
            owner = guard;
            let handed_over = *owner == Some(me);
            if let Err(e) = res {
                if handed_over {
                    // The release raced with the interruption
                    self.hand_over(kernel, &mut owner);
                }
                return Err(e);
            }
            if handed_over {
                return Ok(KMutexGuard::new(self, kernel));
            }
        }
    }

    pub fn try_lock<'a>(&'a self, kernel: &'a Kernel) -> Option<KMutexGuard<'a, T>> {
        let mut owner = self.owner.lock();
        if owner.is_some() {
            return None;
        }
        *owner = Some(current::get().tid());
        Some(KMutexGuard::new(self, kernel))
    }

    /// The TID of the holder.
    pub fn owner(&self) -> Option<pid_t> {
        *self.owner.lock()
    }

    pub fn waiters(&self) -> &SleepQueue {
        &self.waiters
    }

    fn unlock(&self, kernel: &Kernel) {
        let mut owner = self.owner.lock();
        self.hand_over(kernel, &mut owner);
    }

    // A contender that cannot be woken goes to the back of the line and
    // the next one is tried.
    fn hand_over(&self, kernel: &Kernel, owner: &mut SpinLockGuard<'_, Option<pid_t>>) {
        **owner = None;
        for _ in 0..self.waiters.len() {
            match kernel.sched_wake1(&self.waiters) {
                Ok(Some(next)) => {
                    **owner = Some(next.tid());
                    return;
                }
                Ok(None) => return,
                Err(e) => {
                    warn!("failed to hand the mutex over: {}", e);
                    let mut waiters = self.waiters.lock();
                    if let Some(head) = waiters.front().cloned() {
                        let _ = waiters.rellocate(&head, QueuePos::Tail);
                    }
                }
            }
        }
    }
}

impl<'a, T: ?Sized> KMutexGuard<'a, T> {
    fn new(mutex: &'a KMutex<T>, kernel: &'a Kernel) -> Self {
        Self { mutex, kernel }
    }
}

impl<T: ?Sized> Deref for KMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T: ?Sized> DerefMut for KMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T: ?Sized> Drop for KMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock(self.kernel);
    }
}

impl<T: ?Sized> fmt::Debug for KMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KMutex")
            .field("owner", &self.owner())
            .field("waiters", &self.waiters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ThreadAttrs;
    use crate::sched::CpuSet;
    use crate::signal::constants::SIGKILL;
    use crate::test_util::*;

    #[test]
    fn release_hands_over_to_the_longest_waiter() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let group = kernel.current_tgroup().unwrap();
            let mutex = Arc::new(KMutex::new(Vec::new()));
            let guard = mutex.lock(kernel).unwrap();

            let mut tids = Vec::new();
            for name in ["second", "third"] {
                let contender = mutex.clone();
                let thread = kernel
                    .thread_spawn(&group, ThreadAttrs::default(), move |kernel| {
                        contender.lock(kernel).unwrap().push(name);
                        0
                    })
                    .unwrap();
                tids.push(thread.tid());
                while mutex.waiters().len() < tids.len() {
                    kernel.sched_yield().unwrap();
                }
            }

            drop(guard);
            assert_eq!(mutex.owner(), Some(tids[0]));
            assert_eq!(mutex.waiters().tids(), vec![tids[1]]);

            for tid in tids {
                kernel.thread_join(tid).unwrap();
            }
            assert_eq!(mutex.owner(), None);
            let guard = mutex.try_lock(kernel).unwrap();
            assert_eq!(*guard, vec!["second", "third"]);
        });
        kernel.shutdown();
    }

    #[test]
    fn unwakeable_contender_goes_to_the_back() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let group = kernel.current_tgroup().unwrap();
            let mutex = Arc::new(KMutex::new(0));
            let guard = mutex.lock(kernel).unwrap();

            let mut contenders = Vec::new();
            for _ in 0..2 {
                let contender = mutex.clone();
                let thread = kernel
                    .thread_spawn(&group, ThreadAttrs::default(), move |kernel| {
                        match contender.lock(kernel) {
                            Ok(mut guard) => {
                                *guard += 1;
                                0
                            }
                            Err(_) => 1,
                        }
                    })
                    .unwrap();
                contenders.push(thread);
                while mutex.waiters().len() < contenders.len() {
                    kernel.sched_yield().unwrap();
                }
            }
            let (stuck, next) = (contenders[0].clone(), contenders[1].clone());
            // Only CPU 1 is admitted, which this kernel does not have
            let offline = CpuSet::from_cpus(2, &[1]).unwrap();
            let online = std::mem::replace(&mut stuck.inner().affinity, offline);

            drop(guard);
            assert_eq!(mutex.owner(), Some(next.tid()));
            assert_eq!(mutex.waiters().tids(), vec![stuck.tid()]);

            stuck.inner().affinity = online;
            kernel.thread_kill(&stuck, SIGKILL).unwrap();
            kernel.thread_join(next.tid()).unwrap();
            kernel.thread_join(stuck.tid()).unwrap();
            assert_eq!(mutex.owner(), None);
            assert_eq!(*mutex.try_lock(kernel).unwrap(), 1);
        });
        kernel.shutdown();
    }

    #[test]
    fn relock_is_a_deadlock() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let mutex = KMutex::new(0);
            let _guard = mutex.lock(kernel).unwrap();
            let relock = mutex.lock(kernel).err().map(|e| e.errno());
            assert_eq!(relock, Some(EDEADLK));
            assert!(mutex.try_lock(kernel).is_none());
        });
        kernel.shutdown();
    }
}
