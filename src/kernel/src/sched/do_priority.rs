use super::priority::{NiceValue, PrioWhich, Priority};
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::ThreadGroupRef;

impl Kernel {
    /// Set the nice value of every thread of the selected thread groups.
    ///
    /// `who == 0` selects the caller's group, process group or user. Only
    /// root may touch groups of other users (`EPERM`) or lower a nice value
    /// (`EACCES`).
    pub fn setpriority(&self, which: PrioWhich, who: i32, nice: NiceValue) -> Result<()> {
        debug!("setpriority: which = {:?}, who = {}, nice = {:?}", which, who, nice);
        let caller = self.current_tgroup()?.credentials();
        let groups = self.prio_targets(which, who)?;
        for group in groups.iter() {
            let target = group.credentials();
            if !caller.is_root() && caller.euid != target.uid && caller.euid != target.euid {
                return_errno!(EPERM, "not allowed to change the priority");
            }
            for thread in group.threads() {
                let mut inner = thread.inner();
                if inner.state().is_dead() {
                    continue;
                }
                if nice < inner.nice && !caller.is_root() {
                    return_errno!(EACCES, "only root may lower the nice value");
                }
                inner.nice = nice;
                inner.prio = Priority::from(nice);
                inner.level = inner.prio.level();
                self.sched_requeue(&thread, &inner);
            }
        }
        Ok(())
    }

    /// The lowest nice value, i.e., the highest priority, among the
    /// selected thread groups.
    pub fn getpriority(&self, which: PrioWhich, who: i32) -> Result<NiceValue> {
        debug!("getpriority: which = {:?}, who = {}", which, who);
        let groups = self.prio_targets(which, who)?;
        groups
            .iter()
            .filter_map(|group| group.main_thread())
            .map(|thread| thread.inner().nice)
            .min()
            .ok_or_else(|| errno!(ESRCH, "no such process"))
    }

    fn prio_targets(&self, which: PrioWhich, who: i32) -> Result<Vec<ThreadGroupRef>> {
        if who < 0 {
            return_errno!(ESRCH, "no such process");
        }
        let who = who as pid_t;
        let groups = match which {
            PrioWhich::PRIO_PROCESS => {
                let group = if who == 0 {
                    self.current_tgroup()?
                } else {
                    self.tgroups.lock().get(who)?
                };
                vec![group]
            }
            PrioWhich::PRIO_PGRP => {
                let pgid = if who == 0 {
                    self.current_tgroup()?.pgid()
                } else {
                    who
                };
                self.pgrp_get(pgid)?.members()
            }
            PrioWhich::PRIO_USER => {
                let uid = if who == 0 {
                    self.current_tgroup()?.credentials().uid
                } else {
                    who
                };
                self.tgroups
                    .lock()
                    .values()
                    .into_iter()
                    .filter(|group| group.credentials().uid == uid)
                    .collect()
            }
        };
        let groups: Vec<ThreadGroupRef> =
            groups.into_iter().filter(|group| !group.is_zombie()).collect();
        if groups.is_empty() {
            return_errno!(ESRCH, "no such process");
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Credentials;
    use crate::test_util::*;

    #[test]
    fn nice_to_priority() {
        assert_eq!(Priority::from(NiceValue::new(0)), Priority::NORMAL);
        assert!(Priority::from(NiceValue::MIN) < Priority::NORMAL);
        assert!(Priority::from(NiceValue::MAX).level() > Priority::NORMAL.level());
    }

    #[test]
    fn nice_moves_the_level() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let me = crate::process::current::get();
            assert_eq!(kernel.getpriority(PrioWhich::PRIO_PROCESS, 0).unwrap(), NiceValue::new(0));

            kernel
                .setpriority(PrioWhich::PRIO_PROCESS, 0, NiceValue::MIN)
                .unwrap();
            assert_eq!(kernel.getpriority(PrioWhich::PRIO_PGRP, 0).unwrap(), NiceValue::MIN);
            assert_eq!(me.inner().level(), Priority::from(NiceValue::MIN).level());

            kernel
                .setpriority(PrioWhich::PRIO_USER, 0, NiceValue::MAX)
                .unwrap();
            assert_eq!(kernel.getpriority(PrioWhich::PRIO_USER, 0).unwrap(), NiceValue::MAX);
            assert_eq!(me.inner().level(), Priority::from(NiceValue::MAX).level());

            let err = kernel.getpriority(PrioWhich::PRIO_PROCESS, -1).unwrap_err();
            assert_eq!(err.errno(), ESRCH);
        });
        kernel.shutdown();
    }

    #[test]
    fn only_root_may_raise_priority() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let other = kernel.tgroup_create(None).unwrap();
            let group = kernel.current_tgroup().unwrap();
            group.set_credentials(Credentials::new(1000));

            let err = kernel
                .setpriority(PrioWhich::PRIO_PROCESS, other.pid() as i32, NiceValue::new(1))
                .unwrap_err();
            assert_eq!(err.errno(), EPERM);

            kernel
                .setpriority(PrioWhich::PRIO_PROCESS, 0, NiceValue::new(5))
                .unwrap();
            let err = kernel
                .setpriority(PrioWhich::PRIO_PROCESS, 0, NiceValue::new(4))
                .unwrap_err();
            assert_eq!(err.errno(), EACCES);
            assert_eq!(kernel.getpriority(PrioWhich::PRIO_PROCESS, 0).unwrap(), NiceValue::new(5));
        });
        kernel.shutdown();
    }
}
