use super::{current, KillTarget, TermStatus, ThreadFlags, ThreadGroupRef, ThreadRef, ThreadState};
use super::WakeReason;
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::signal::constants::SIGKILL;
use crate::signal::SigNum;

impl Kernel {
    /// Make a thread terminate at its next check.
    ///
    /// A sleeping or stopped thread is woken; its sleep fails with `EINTR`.
    /// An embryo becomes a zombie right away, without ever running. Killing
    /// a dead thread does nothing.
    pub fn thread_kill(&self, thread: &ThreadRef, signum: SigNum) -> Result<()> {
        let mut inner = thread.inner();
        if inner.state().is_dead() {
            return Ok(());
        }
        inner.flags.insert(ThreadFlags::KILLED);
        inner.kill_signal.get_or_insert(signum);
        debug!("thread {} killed by {:?}", thread.tid(), signum);

        match inner.state() {
            ThreadState::Embryo => {
                self.sched.embryos.lock().remove(thread);
                inner.term_status = Some(TermStatus::Killed(signum));
                inner.set_state(ThreadState::Zombie);
                drop(inner);
                self.arch().discard(&**thread.context());
                if let Some(group) = thread.tgroup() {
                    let status = self.tgroup_exit_thread(&group, thread, TermStatus::Killed(signum));
                    thread.inner().term_status = Some(status);
                }
                self.sched_putzombie(thread);
            }
            ThreadState::Stopped => {
                self.sched_park(thread, &mut inner)?;
            }
            _ => {
                drop(inner);
                self.interrupt(thread, WakeReason::Interrupted, None)?;
            }
        }
        Ok(())
    }

    /// Kill members of a thread group.
    ///
    /// `KillTarget::All` kills every member but the caller, skipping those
    /// whose flags intersect `except`, and then re-elects the main thread,
    /// preferring the caller when it is a member that survives.
    /// With `wait`, returns once every victim is a zombie.
    pub fn tgroup_kill_thread(
        &self,
        group: &ThreadGroupRef,
        target: KillTarget,
        except: ThreadFlags,
        wait: bool,
    ) -> Result<()> {
        let me = current::try_get().map(|thread| thread.tid());
        let victims: Vec<ThreadRef> = {
            let group_inner = group.inner();
            match target {
                KillTarget::All => group_inner
                    .threads()
                    .iter()
                    .filter(|thread| Some(thread.tid()) != me)
                    .filter(|thread| {
                        let inner = thread.inner();
                        !inner.state().is_dead() && !inner.flags().intersects(except)
                    })
                    .cloned()
                    .collect(),
                KillTarget::Tid(tid) => {
                    let thread = group_inner
                        .threads()
                        .iter()
                        .find(|thread| thread.tid() == tid)
                        .cloned()
                        .ok_or_else(|| errno!(ESRCH, "no such thread in the group"))?;
                    if wait && Some(tid) == me {
                        return_errno!(EDEADLK, "waiting for oneself to die");
                    }
                    vec![thread]
                }
            }
        };

        let signum = SIGKILL;
        for thread in victims.iter() {
            self.thread_kill(thread, signum)?;
        }
        if target == KillTarget::All {
            group.inner().elect_main(None, me);
        }
        if wait {
            for thread in victims.iter() {
                match self.wait_zombie(thread) {
                    // Swept already
                    Err(e) if e.errno() == ESRCH => {}
                    res => res?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SleepQueue;
    use crate::process::{SleepKind, ThreadAttrs, ThreadAttrsBuilder};
    use crate::test_util::*;

    #[test]
    fn kill_all_from_a_member() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let parent = kernel.current_tgroup().unwrap();
            let group = kernel.tgroup_create(Some(&parent)).unwrap();
            let queue = SleepQueue::new();

            let sleep_queue = queue.clone();
            let a = kernel
                .thread_spawn(&group, ThreadAttrs::default(), move |kernel| {
                    let _ = kernel.sched_sleep(&sleep_queue, SleepKind::Interruptible);
                    0
                })
                .unwrap();
            while queue.is_empty() {
                kernel.sched_yield().unwrap();
            }
            assert!(a.is_main());

            let observed = Arc::new(SpinLock::new(None));
            let slot = observed.clone();
            let (a_tid, victim_group) = (a.tid(), group.clone());
            let b = kernel
                .thread_spawn(&group, ThreadAttrs::default(), move |kernel| {
                    kernel
                        .tgroup_kill_thread(
                            &victim_group,
                            KillTarget::All,
                            ThreadFlags::empty(),
                            true,
                        )
                        .unwrap();
                    let a = kernel.thread_get(a_tid).unwrap();
                    let a_state = a.state();
                    let me_main = current::get().is_main();
                    let a_status = kernel.thread_join(a_tid).unwrap();
                    *slot.lock() = Some((a_state, me_main, a_status));
                    0
                })
                .unwrap();
            kernel.thread_join(b.tid()).unwrap();

            let (a_state, b_main, a_status) = observed.lock().take().unwrap();
            assert_eq!(a_state, ThreadState::Zombie);
            assert!(b_main);
            assert_eq!(a_status, TermStatus::Killed(SIGKILL));
            assert!(group.is_zombie());
        });
        kernel.shutdown();
    }

    #[test]
    fn surviving_caller_leads_over_spared_members() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let parent = kernel.current_tgroup().unwrap();
            let group = kernel.tgroup_create(Some(&parent)).unwrap();
            let queue = SleepQueue::new();

            let sleep_queue = queue.clone();
            let attrs = ThreadAttrsBuilder::default().detached(true).build().unwrap();
            let spared = kernel
                .thread_spawn(&group, attrs, move |kernel| {
                    let _ = kernel.sched_sleep(&sleep_queue, SleepKind::Interruptible);
                    0
                })
                .unwrap();
            while queue.is_empty() {
                kernel.sched_yield().unwrap();
            }
            assert!(spared.is_main());

            let victim_group = group.clone();
            let caller = kernel
                .thread_spawn(&group, ThreadAttrs::default(), move |kernel| {
                    kernel
                        .tgroup_kill_thread(
                            &victim_group,
                            KillTarget::All,
                            ThreadFlags::DETACHED,
                            true,
                        )
                        .unwrap();
                    current::get().is_main() as i32
                })
                .unwrap();
            assert!(spared.tid() < caller.tid());
            assert_eq!(kernel.thread_join(caller.tid()).unwrap(), TermStatus::Exited(1));
            assert!(!spared.inner().is_killed());
            assert_eq!(queue.len(), 1);

            kernel.thread_kill(&spared, SIGKILL).unwrap();
            while spared.state() != ThreadState::Zombie {
                kernel.sched_yield().unwrap();
            }
        });
        kernel.shutdown();
    }

    #[test]
    fn kill_one_member() {
        let kernel = boot(1);
        run_in_kernel(&kernel, |kernel| {
            let group = kernel.current_tgroup().unwrap();
            let queue = SleepQueue::new();
            let sleep_queue = queue.clone();
            let thread = kernel
                .thread_spawn(&group, ThreadAttrs::default(), move |kernel| {
                    let _ = kernel.sched_sleep(&sleep_queue, SleepKind::Interruptible);
                    0
                })
                .unwrap();
            while queue.is_empty() {
                kernel.sched_yield().unwrap();
            }

            let me = KillTarget::Tid(kernel.gettid());
            let err = kernel
                .tgroup_kill_thread(&group, me, ThreadFlags::empty(), true)
                .unwrap_err();
            assert_eq!(err.errno(), EDEADLK);
            let err = kernel
                .tgroup_kill_thread(&group, KillTarget::Tid(9999), ThreadFlags::empty(), false)
                .unwrap_err();
            assert_eq!(err.errno(), ESRCH);

            let target = KillTarget::Tid(thread.tid());
            kernel
                .tgroup_kill_thread(&group, target, ThreadFlags::empty(), true)
                .unwrap();
            assert_eq!(thread.state(), ThreadState::Zombie);
            assert!(current::get().is_main());
            assert_eq!(
                kernel.thread_join(thread.tid()).unwrap(),
                TermStatus::Killed(SIGKILL)
            );
            assert!(!group.is_zombie());
        });
        kernel.shutdown();
    }
}
