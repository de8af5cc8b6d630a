//! The architecture layer as seen by the scheduler.
//!
//! The scheduler only decides *which* execution context runs next and *when*
//! to switch. Saving and restoring registers, creating a context for a new
//! thread, and idling a CPU are the business of an `Arch` implementation.

use crate::prelude::*;

pub use self::host::HostArch;

mod host;

/// The unwinding payload used to abandon the stack of a context that has
/// switched away for the last time.
///
/// It never reaches a panic hook; the code that created the context swallows it.
#[derive(Debug)]
pub struct Retired;

/// A saved execution context: either a kernel thread or the scheduler loop
/// of a CPU.
pub trait Context: Send + Sync {
    /// Let this context continue on `cpu`.
    fn resume(&self, cpu: usize);

    /// Block the calling context, which must be this one, until it is
    /// resumed. Returns the CPU it was resumed on, or `None` if the context
    /// was discarded instead.
    fn park(&self) -> Option<usize>;

    /// Wake a context that never ran so that it can vanish.
    fn cancel(&self);
}

pub trait Arch: Send + Sync {
    fn ncpus(&self) -> usize;

    /// The CPU the caller runs on, if the caller runs on a CPU at all.
    fn cpu_id(&self) -> Option<usize>;

    /// Create the context of a new thread. `entry` runs the first time the
    /// context is switched to.
    fn fork(&self, name: &str, entry: Box<dyn FnOnce() + Send>) -> Result<Arc<dyn Context>>;

    /// The context of the scheduler loop of `cpu`.
    fn cpu_context(&self, cpu: usize) -> Arc<dyn Context>;

    /// Save `from`, which must be the caller, and continue `to` on `cpu`.
    ///
    /// Returns once some CPU switches back to `from`; the return value is
    /// that CPU.
    fn switch(&self, from: &dyn Context, to: &dyn Context, cpu: usize) -> usize;

    /// Switch from the calling context to `to` for the last time.
    fn retire(&self, to: &dyn Context, cpu: usize) -> !;

    /// Throw away a context that never ran.
    fn discard(&self, ctx: &dyn Context);

    /// Bring up `cpu` and run `main` as its scheduler loop.
    fn start_cpu(&self, cpu: usize, main: Box<dyn FnOnce() + Send>) -> Result<()>;

    /// Idle `cpu` until it is kicked or a short while passes.
    fn halt(&self, cpu: usize);

    /// Send an IPI to `cpu` to pull it out of `halt`.
    fn kick(&self, cpu: usize);

    /// Wait for every scheduler loop to return.
    fn join_cpus(&self);
}
