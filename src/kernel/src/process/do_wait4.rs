use super::{current, GroupStatus, JobReport, TermStatus, ThreadGroupRef};
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::signal::SigNum;

/// Which children `waitpid` waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildFilter {
    Any,
    Pid(pid_t),
    Pgid(pid_t),
}

impl ChildFilter {
    /// Decode the `pid` argument of wait4(2): `-1` is any child, `0` is the
    /// caller's process group, below `-1` is the process group `-pid`.
    pub fn from_raw(pid: i32, own_pgid: pid_t) -> Self {
        match pid {
            -1 => ChildFilter::Any,
            0 => ChildFilter::Pgid(own_pgid),
            pid if pid < -1 => ChildFilter::Pgid((-pid) as pid_t),
            pid => ChildFilter::Pid(pid as pid_t),
        }
    }

    fn matches(&self, pid: pid_t, pgid: pid_t) -> bool {
        match *self {
            ChildFilter::Any => true,
            ChildFilter::Pid(required) => pid == required,
            ChildFilter::Pgid(required) => pgid == required,
        }
    }
}

// Based on waitflags.h
bitflags! {
    pub struct WaitOptions: u32 {
        const WNOHANG = 0x1;
        const WUNTRACED = 0x2;
        const WCONTINUED = 0x8;
    }
}

impl WaitOptions {
    pub fn from_u32(bits: u32) -> Result<Self> {
        Self::from_bits(bits).ok_or_else(|| errno!(EINVAL, "unknown wait options"))
    }
}

/// What `waitpid` observed about a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Exited(TermStatus),
    Stopped(SigNum),
    Continued,
}

impl WaitStatus {
    /// Encode as the status word of wait(2).
    pub fn as_u32(&self) -> u32 {
        match *self {
            WaitStatus::Exited(status) => status.as_u32(),
            WaitStatus::Stopped(signum) => ((signum.as_u8() as u32) << 8) | 0x7f,
            WaitStatus::Continued => 0xffff,
        }
    }
}

impl Kernel {
    /// Wait for a child of the caller's thread group to change state.
    ///
    /// An exited child is reaped and reported first. Stops and continues
    /// are reported with `WUNTRACED` and `WCONTINUED`. With `WNOHANG`,
    /// returns `None` instead of sleeping. Fails with `ECHILD` when no child
    /// matches and with `EINTR` when interrupted.
    pub fn waitpid(
        &self,
        filter: ChildFilter,
        options: WaitOptions,
    ) -> Result<Option<(pid_t, WaitStatus)>> {
        debug!("waitpid: filter = {:?}, options = {:?}", filter, options);
        let group = current::get()
            .tgroup()
            .ok_or_else(|| errno!(ESRCH, "the caller has no thread group"))?;

        // Lock order: always lock parent then child
        let mut group_inner = group.inner();
        loop {
            let candidates: Vec<ThreadGroupRef> = group_inner
                .children()
                .iter()
                .filter(|child| filter.matches(child.pid(), child.inner().pgid()))
                .cloned()
                .collect();
            if candidates.is_empty() {
                return_errno!(ECHILD, "no child to wait for");
            }

            let mut exited = None;
            for child in candidates.iter() {
                let mut child_inner = child.inner();
                if let GroupStatus::Zombie(status) = child_inner.status() {
                    exited = Some((child.pid(), status));
                    break;
                }
                let report = match child_inner.report() {
                    Some(JobReport::Stopped(signum))
                        if options.contains(WaitOptions::WUNTRACED) =>
                    {
                        WaitStatus::Stopped(signum)
                    }
                    Some(JobReport::Continued) if options.contains(WaitOptions::WCONTINUED) => {
                        WaitStatus::Continued
                    }
                    _ => continue,
                };
                child_inner.set_report(None);
                return Ok(Some((child.pid(), report)));
            }

            if let Some((pid, status)) = exited {
                let child = group_inner.remove_child(pid);
                drop(group_inner);
                if let Some(child) = child {
                    self.tgroup_release(&child);
                }
                debug!("waitpid: child {} reaped with {:?}", pid, status);
                return Ok(Some((pid, WaitStatus::Exited(status))));
            }

            if options.contains(WaitOptions::WNOHANG) {
                return Ok(None);
            }
            let (guard, res) = group.child_cond().wait(self, group_inner);
            group_inner = guard;
            res?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SleepQueue;
    use crate::process::{SleepKind, ThreadAttrs};
    use crate::signal::constants::*;
    use crate::test_util::*;

    #[test]
    fn filters() {
        assert_eq!(ChildFilter::from_raw(-1, 7), ChildFilter::Any);
        assert_eq!(ChildFilter::from_raw(0, 7), ChildFilter::Pgid(7));
        assert_eq!(ChildFilter::from_raw(-9, 7), ChildFilter::Pgid(9));
        assert_eq!(ChildFilter::from_raw(12, 7), ChildFilter::Pid(12));
        assert!(ChildFilter::Pgid(3).matches(5, 3));
        assert!(!ChildFilter::Pid(3).matches(5, 3));
    }

    #[test]
    fn status_words() {
        assert_eq!(WaitStatus::Stopped(SIGTSTP).as_u32(), (20 << 8) | 0x7f);
        assert_eq!(WaitStatus::Continued.as_u32(), 0xffff);
        assert_eq!(
            WaitStatus::Exited(TermStatus::Exited(1)).as_u32(),
            0x100
        );
        assert!(WaitOptions::from_u32(0x40).is_err());
    }

    fn spawn_sleeping_child(kernel: &Kernel, code: i32) -> (ThreadGroupRef, SleepQueue) {
        let parent = kernel.current_tgroup().unwrap();
        let queue = SleepQueue::new();
        let sleep_queue = queue.clone();
        let child = kernel
            .process_spawn(Some(&parent), ThreadAttrs::default(), move |kernel| {
                let _ = kernel.sched_sleep(&sleep_queue, SleepKind::Uninterruptible);
                code
            })
            .unwrap();
        (child, queue)
    }

    #[test]
    fn wait_by_pid_and_pgid() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let (a, a_queue) = spawn_sleeping_child(kernel, 1);
            let (b, b_queue) = spawn_sleeping_child(kernel, 2);
            kernel.setpgid(b.pid(), 0).unwrap();
            assert_eq!(kernel.getpgid(b.pid()).unwrap(), b.pid());

            let b_only = ChildFilter::Pgid(b.pid());
            assert_eq!(kernel.waitpid(b_only, WaitOptions::WNOHANG).unwrap(), None);
            while a_queue.is_empty() || b_queue.is_empty() {
                kernel.sched_yield().unwrap();
            }

            kernel.sched_wakeall(&b_queue).unwrap();
            let res = kernel.waitpid(b_only, WaitOptions::empty()).unwrap();
            assert_eq!(
                res,
                Some((b.pid(), WaitStatus::Exited(TermStatus::Exited(2))))
            );
            let err = kernel.waitpid(b_only, WaitOptions::empty()).unwrap_err();
            assert_eq!(err.errno(), ECHILD);
            assert!(kernel.pgrp_get(b.pid()).is_err());

            let any = ChildFilter::from_raw(-1, 0);
            assert_eq!(kernel.waitpid(any, WaitOptions::WNOHANG).unwrap(), None);
            kernel.sched_wakeall(&a_queue).unwrap();
            let res = kernel.waitpid(any, WaitOptions::empty()).unwrap();
            assert_eq!(
                res,
                Some((a.pid(), WaitStatus::Exited(TermStatus::Exited(1))))
            );
        });
        kernel.shutdown();
    }
}
