//! An `Arch` that runs every execution context on its own host thread.
//!
//! Each context owns a baton. Switching hands the baton to the target and
//! then waits for the caller's own baton to come back, so at most one
//! context per simulated CPU executes kernel code at any time.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{Arch, Context, Retired};
use crate::prelude::*;
use crate::util::context;

const HALT_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permit {
    Run(usize),
    Cancel,
}

/// A context backed by a host thread.
#[derive(Debug, Default)]
pub struct HostContext {
    permit: Mutex<Option<Permit>>,
    cond: Condvar,
}

impl HostContext {
    fn new() -> Self {
        Self::default()
    }

    fn give(&self, permit: Permit) {
        let mut slot = lock_ignore_poison(&self.permit);
        assert!(slot.is_none(), "context resumed twice");
        *slot = Some(permit);
        self.cond.notify_one();
    }

    fn take(&self) -> Permit {
        let mut slot = lock_ignore_poison(&self.permit);
        loop {
            if let Some(permit) = slot.take() {
                return permit;
            }
            slot = self
                .cond
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

impl Context for HostContext {
    fn resume(&self, cpu: usize) {
        self.give(Permit::Run(cpu));
    }

    fn park(&self) -> Option<usize> {
        match self.take() {
            Permit::Run(cpu) => Some(cpu),
            Permit::Cancel => None,
        }
    }

    fn cancel(&self) {
        self.give(Permit::Cancel);
    }
}

#[derive(Debug, Default)]
struct HostCpu {
    sched_ctx: Arc<HostContext>,
    ipi_pending: Mutex<bool>,
    ipi_cond: Condvar,
}

pub struct HostArch {
    cpus: Vec<HostCpu>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl HostArch {
    pub fn new(ncpus: usize) -> Self {
        let cpus = (0..ncpus).map(|_| HostCpu::default()).collect();
        Self {
            cpus,
            handles: Mutex::new(Vec::new()),
        }
    }

    fn cpu(&self, cpu: usize) -> &HostCpu {
        &self.cpus[cpu]
    }
}

impl Arch for HostArch {
    fn ncpus(&self) -> usize {
        self.cpus.len()
    }

    fn cpu_id(&self) -> Option<usize> {
        context::cpu_hint()
    }

    fn fork(&self, name: &str, entry: Box<dyn FnOnce() + Send>) -> Result<Arc<dyn Context>> {
        let ctx = Arc::new(HostContext::new());
        let thread_ctx = ctx.clone();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let cpu = match thread_ctx.park() {
                    Some(cpu) => cpu,
                    None => return,
                };
                drop(thread_ctx);
                context::set_cpu_hint(Some(cpu));
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
                    if !payload.is::<Retired>() {
                        panic::resume_unwind(payload);
                    }
                }
            })
            .map_err(|_| errno!(EAGAIN, "failed to spawn a host thread"))?;
        Ok(ctx)
    }

    fn cpu_context(&self, cpu: usize) -> Arc<dyn Context> {
        self.cpu(cpu).sched_ctx.clone()
    }

    fn switch(&self, from: &dyn Context, to: &dyn Context, cpu: usize) -> usize {
        to.resume(cpu);
        match from.park() {
            Some(cpu) => {
                context::set_cpu_hint(Some(cpu));
                cpu
            }
            None => panic::resume_unwind(Box::new(Retired)),
        }
    }

    fn retire(&self, to: &dyn Context, cpu: usize) -> ! {
        context::set_cpu_hint(None);
        to.resume(cpu);
        panic::resume_unwind(Box::new(Retired))
    }

    fn discard(&self, ctx: &dyn Context) {
        ctx.cancel();
    }

    fn start_cpu(&self, cpu: usize, main: Box<dyn FnOnce() + Send>) -> Result<()> {
        if cpu >= self.ncpus() {
            return_errno!(EINVAL, "no such CPU");
        }
        let handle = thread::Builder::new()
            .name(format!("cpu{}", cpu))
            .spawn(move || {
                context::set_cpu_hint(Some(cpu));
                main();
            })
            .map_err(|_| errno!(EAGAIN, "failed to spawn a host thread"))?;
        lock_ignore_poison(&self.handles).push(handle);
        Ok(())
    }

    fn halt(&self, cpu: usize) {
        let cpu = self.cpu(cpu);
        let mut pending = lock_ignore_poison(&cpu.ipi_pending);
        if !*pending {
            pending = match cpu.ipi_cond.wait_timeout(pending, HALT_TIMEOUT) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *pending = false;
    }

    fn kick(&self, cpu: usize) {
        let cpu = self.cpu(cpu);
        *lock_ignore_poison(&cpu.ipi_pending) = true;
        cpu.ipi_cond.notify_one();
    }

    fn join_cpus(&self) {
        let handles: Vec<_> = lock_ignore_poison(&self.handles).drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("a scheduler loop panicked");
            }
        }
    }
}

// A panicking host thread must not take the others down with it.
fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn switch_back_and_forth() {
        let arch = Arc::new(HostArch::new(1));
        let (tx, rx) = mpsc::channel();

        let sched_ctx = arch.cpu_context(0);
        let arch2 = arch.clone();
        let thread_ctx: Arc<Mutex<Option<Arc<dyn Context>>>> = Arc::new(Mutex::new(None));
        let thread_ctx2 = thread_ctx.clone();
        let ctx = arch
            .fork(
                "worker",
                Box::new(move || {
                    tx.send(context::cpu_hint()).unwrap();
                    let me = thread_ctx2.lock().unwrap().clone().unwrap();
                    let cpu = arch2.switch(&*me, &*arch2.cpu_context(0), 0);
                    tx.send(Some(cpu)).unwrap();
                    arch2.retire(&*arch2.cpu_context(0), cpu);
                }),
            )
            .unwrap();
        *thread_ctx.lock().unwrap() = Some(ctx.clone());

        let arch3 = arch.clone();
        arch.start_cpu(
            0,
            Box::new(move || {
                let sched_ctx = arch3.cpu_context(0);
                arch3.switch(&*sched_ctx, &*ctx, 0);
                arch3.switch(&*sched_ctx, &*ctx, 0);
            }),
        )
        .unwrap();
        arch.join_cpus();
        drop(sched_ctx);

        assert_eq!(rx.recv().unwrap(), Some(0));
        assert_eq!(rx.recv().unwrap(), Some(0));
    }

    #[test]
    fn discarded_context_never_runs() {
        let arch = HostArch::new(1);
        let (tx, rx) = mpsc::channel::<()>();
        let ctx = arch
            .fork(
                "never",
                Box::new(move || {
                    tx.send(()).unwrap();
                }),
            )
            .unwrap();
        arch.discard(&*ctx);
        // The sender is dropped without sending once the host thread exits
        assert!(rx.recv().is_err());
    }

    #[test]
    fn kick_ends_halt() {
        let arch = HostArch::new(2);
        arch.kick(1);
        arch.halt(1);
        assert!(!*arch.cpu(1).ipi_pending.lock().unwrap());
        // Without a kick, halt still returns after the timeout
        arch.halt(0);
    }
}
