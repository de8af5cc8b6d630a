//! The kernel context object.
//!
//! Everything that would be a global in a C kernel (the scheduler, the ID
//! tables, the ID allocators) hangs off one `Kernel`. Kernel threads get an
//! `Arc<Kernel>` as the argument of their entry; the dispatch loops of the
//! CPUs hold one too.

use crate::arch::{Arch, HostArch};
use crate::config::KernelConfig;
use crate::prelude::*;
use crate::process::{ProcessGrpRef, SessionRef, Table, ThreadGroupRef, ThreadRef};
use crate::sched::Scheduler;
use crate::util::id_alloc::IdAlloc;

/// The largest TID and PID handed out.
pub const PID_MAX: pid_t = 32768;

pub struct Kernel {
    config: KernelConfig,
    arch: Arc<dyn Arch>,
    pub(crate) sched: Scheduler,
    // ID tables. Lock order: pgrps, sessions, tgroups, then the allocators.
    pub(crate) threads: SpinLock<Table<ThreadRef>>,
    pub(crate) tgroups: SpinLock<Table<ThreadGroupRef>>,
    pub(crate) pgrps: SpinLock<Table<ProcessGrpRef>>,
    pub(crate) sessions: SpinLock<Table<SessionRef>>,
    pub(crate) tids: SpinLock<IdAlloc>,
    pub(crate) pids: SpinLock<IdAlloc>,
    weak_self: Weak<Kernel>,
}

impl Kernel {
    /// Create a kernel on host threads, one per configured CPU.
    pub fn new(config: KernelConfig) -> Arc<Kernel> {
        let arch = Arc::new(HostArch::new(config.sched.ncpus));
        Self::with_arch(config, arch)
    }

    pub fn with_arch(config: KernelConfig, arch: Arc<dyn Arch>) -> Arc<Kernel> {
        let ncpus = min(config.sched.ncpus, arch.ncpus());
        let capacity = min(config.thread.max_threads, 64);
        Arc::new_cyclic(|weak_self| Kernel {
            sched: Scheduler::new(ncpus),
            threads: SpinLock::new(Table::with_capacity(capacity)),
            tgroups: SpinLock::new(Table::with_capacity(capacity)),
            pgrps: SpinLock::new(Table::with_capacity(capacity)),
            sessions: SpinLock::new(Table::with_capacity(capacity)),
            tids: SpinLock::new(IdAlloc::new(PID_MAX)),
            pids: SpinLock::new(IdAlloc::new(PID_MAX)),
            weak_self: weak_self.clone(),
            config,
            arch,
        })
    }

    /// Bring up the dispatch loop of every CPU.
    pub fn boot(&self) -> Result<()> {
        log::set_max_level(self.config.log_level);
        for cpu in 0..self.sched.ncpus() {
            let kernel = self
                .weak_self
                .upgrade()
                .ok_or_else(|| errno!(EINVAL, "the kernel is being dropped"))?;
            self.arch
                .start_cpu(cpu, Box::new(move || kernel.schedule(cpu)))?;
        }
        info!("kernel booted with {} CPUs", self.sched.ncpus());
        Ok(())
    }

    /// Stop the dispatch loops and wait for them to return.
    ///
    /// Threads that are still alive are left where they are.
    pub fn shutdown(&self) {
        self.sched.set_shutdown();
        for cpu in 0..self.sched.ncpus() {
            self.arch.kick(cpu);
        }
        self.arch.join_cpus();
        info!("kernel shut down");
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn arch(&self) -> &Arc<dyn Arch> {
        &self.arch
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }

    pub(crate) fn weak_self(&self) -> Weak<Kernel> {
        self.weak_self.clone()
    }

    /// Convert milliseconds to jiffies, rounding up. Saturates at the
    /// largest representable timeout.
    pub fn ms_to_jiffies(&self, ms: u64) -> u64 {
        let hz = self.config.sched.hz as u64;
        ms.saturating_mul(hz).saturating_add(999) / 1000
    }

    pub fn thread_get(&self, tid: pid_t) -> Result<ThreadRef> {
        self.threads.lock().get(tid)
    }

    pub fn tgroup_get(&self, pid: pid_t) -> Result<ThreadGroupRef> {
        self.tgroups.lock().get(pid)
    }

    pub fn nr_threads(&self) -> usize {
        self.threads.lock().len()
    }

    pub fn nr_tgroups(&self) -> usize {
        self.tgroups.lock().len()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("ncpus", &self.sched.ncpus())
            .field("jiffies", &self.sched.jiffies())
            .field("nr_threads", &self.nr_threads())
            .field("nr_tgroups", &self.nr_tgroups())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jiffies_conversion() {
        let kernel = Kernel::new(KernelConfig::default());
        assert_eq!(kernel.ms_to_jiffies(0), 0);
        assert_eq!(kernel.ms_to_jiffies(10), 1);
        assert_eq!(kernel.ms_to_jiffies(11), 2);
        assert_eq!(kernel.ms_to_jiffies(1000), 100);
        assert_eq!(kernel.ms_to_jiffies(u64::MAX), u64::MAX / 1000);
    }

    #[test]
    fn boot_and_shutdown() {
        let config = KernelConfig::from_json(r#"{ "sched": { "ncpus": 2 } }"#).unwrap();
        let kernel = Kernel::new(config);
        kernel.boot().unwrap();
        assert_eq!(kernel.scheduler().ncpus(), 2);
        kernel.shutdown();
        assert_eq!(kernel.nr_threads(), 0);
    }
}
