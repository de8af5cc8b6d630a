//! Synchronization primitives at the bottom of the kernel.

pub mod irq;

mod atomic_word;
mod spinlock;

pub use self::atomic_word::AtomicWord;
pub use self::spinlock::{LockOwner, SpinLock, SpinLockGuard};
