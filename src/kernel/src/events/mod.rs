//! Primitives that put threads to sleep and wake them up.
//!
//! * `SleepQueue` is a lock-protected FIFO of sleeping threads. The
//! scheduler moves threads on and off it.
//! * `Cond` is a condition variable built on a sleep queue.
//! * `KMutex` is a sleeping mutex that hands itself over to the longest
//! waiter on release.

mod cond;
mod mutex;
mod sleep_queue;

pub use self::cond::Cond;
pub use self::mutex::{KMutex, KMutexGuard};
pub use self::sleep_queue::SleepQueue;
