use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize};

use atomic::{Atomic, Ordering};

use super::irq;
use crate::util::context;

const NO_HOLDER: u64 = 0;
const NO_CPU: usize = usize::MAX;

/// A spinlock that knows who holds it.
///
/// Acquiring the lock disables local interrupts (`pushcli`) and records the
/// holder context, its CPU and the caller's source location. Releasing a
/// lock that the current context does not hold is a kernel bug and panics.
///
/// A held lock can be handed from one execution context to another across a
/// context switch: the releasing side calls `SpinLockGuard::relinquish` and
/// the receiving side calls `SpinLock::adopt`. Between the two the lock stays
/// locked but belongs to nobody.
pub struct SpinLock<T: ?Sized> {
    locked: AtomicBool,
    holder: AtomicU64,
    cpu: AtomicUsize,
    location: Atomic<Option<&'static Location<'static>>>,
    value: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}

pub struct SpinLockGuard<'a, T: ?Sized + 'a> {
    lock: &'a SpinLock<T>,
    // A guard is tied to the execution context that acquired it.
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for SpinLockGuard<'_, T> {}

/// Diagnostic snapshot of a lock holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOwner {
    pub cpu: Option<usize>,
    pub location: Option<&'static Location<'static>>,
}

impl<T> SpinLock<T> {
    pub fn new(val: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            holder: AtomicU64::new(NO_HOLDER),
            cpu: AtomicUsize::new(NO_CPU),
            location: Atomic::new(None),
            value: UnsafeCell::new(val),
        }
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    #[track_caller]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        irq::pushcli();
        if self.holding() {
            panic!(
                "spinlock deadlock: re-acquired at {} while held since {:?}",
                Location::caller(),
                self.owner()
            );
        }
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
        self.set_owner(Location::caller());
        SpinLockGuard::new(self)
    }

    #[track_caller]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        irq::pushcli();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.set_owner(Location::caller());
            Some(SpinLockGuard::new(self))
        } else {
            irq::popcli();
            None
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Whether the current execution context holds the lock.
    pub fn holding(&self) -> bool {
        self.is_locked() && self.holder.load(Ordering::Relaxed) == context::holder_id()
    }

    /// Debug-only check that the caller holds the lock.
    #[track_caller]
    pub fn assert_locked(&self) {
        debug_assert!(
            self.holding(),
            "spinlock is not held by the caller at {}",
            Location::caller()
        );
    }

    /// Who holds the lock, if anyone.
    pub fn owner(&self) -> Option<LockOwner> {
        if !self.is_locked() {
            return None;
        }
        let cpu = match self.cpu.load(Ordering::Relaxed) {
            NO_CPU => None,
            cpu => Some(cpu),
        };
        Some(LockOwner {
            cpu,
            location: self.location.load(Ordering::Relaxed),
        })
    }

    /// Take over a lock that another execution context relinquished.
    ///
    /// # Safety
    ///
    /// The lock must have been relinquished with `SpinLockGuard::relinquish`
    /// and not adopted since. The caller becomes responsible for releasing it.
    #[track_caller]
    pub unsafe fn adopt(&self) -> SpinLockGuard<'_, T> {
        assert!(
            self.is_locked() && self.holder.load(Ordering::Acquire) == NO_HOLDER,
            "adopting a spinlock that was not handed off"
        );
        irq::pushcli();
        self.set_owner(Location::caller());
        SpinLockGuard::new(self)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    fn set_owner(&self, location: &'static Location<'static>) {
        self.holder.store(context::holder_id(), Ordering::Relaxed);
        self.cpu
            .store(context::cpu_hint().unwrap_or(NO_CPU), Ordering::Relaxed);
        self.location.store(Some(location), Ordering::Relaxed);
    }

    fn clear_owner(&self) {
        self.cpu.store(NO_CPU, Ordering::Relaxed);
        self.location.store(None, Ordering::Relaxed);
        self.holder.store(NO_HOLDER, Ordering::Release);
    }

    fn unlock(&self) {
        if !self.holding() {
            panic!(
                "unlocking a spinlock not held by the caller (owner = {:?})",
                self.owner()
            );
        }
        self.clear_owner();
        self.locked.store(false, Ordering::Release);
        irq::popcli();
    }
}

impl<'a, T: ?Sized> SpinLockGuard<'a, T> {
    fn new(lock: &'a SpinLock<T>) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }

    /// Release the lock and give back the lock itself, so that it can be
    /// re-acquired later by the same caller.
    pub fn unlock(this: Self) -> &'a SpinLock<T> {
        let lock = this.lock;
        drop(this);
        lock
    }

    /// Give up ownership without releasing the lock.
    ///
    /// The lock stays locked until some execution context calls
    /// `SpinLock::adopt` on it.
    pub fn relinquish(this: Self) -> &'a SpinLock<T> {
        let lock = this.lock;
        lock.assert_locked();
        std::mem::forget(this);
        lock.clear_owner();
        irq::popcli();
        lock
    }

    pub fn lock(this: &Self) -> &'a SpinLock<T> {
        this.lock
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SpinLockGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f
                .debug_struct("SpinLock")
                .field("value", &&*guard)
                .finish(),
            None => f
                .debug_struct("SpinLock")
                .field("owner", &self.owner())
                .finish(),
        }
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
