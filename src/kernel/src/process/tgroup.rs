use std::fmt;

use super::{Credentials, TermStatus, ThreadFlags, ThreadInner, ThreadRef, ThreadState};
use crate::events::Cond;
use crate::prelude::*;
use crate::signal::{SigDispositions, SigNum};
use crate::util::queue::Queue;

pub type ThreadGroupRef = Arc<ThreadGroup>;

/// A thread group, i.e., a process.
///
/// Members share the signal dispositions and the credentials. Exactly one
/// member, the main thread, carries `ThreadFlags::MAIN` while the group has
/// members.
pub struct ThreadGroup {
    // Immutable info
    pid: pid_t,
    // Mutable info
    inner: SpinLock<ThreadGroupInner>,
    sig_dispositions: SpinLock<SigDispositions>,
    credentials: SpinLock<Credentials>,
    // Broadcast when a child changes state
    child_cond: Cond,
}

pub struct ThreadGroupInner {
    threads: Queue<ThreadRef>,
    // Members that are not zombies yet
    nr_live: usize,
    status: GroupStatus,
    // Set by a group exit and shared by every member
    exit_status: Option<TermStatus>,
    parent: Weak<ThreadGroup>,
    children: Vec<ThreadGroupRef>,
    pgid: pid_t,
    sid: pid_t,
    job: JobState,
    report: Option<JobReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Live,
    Zombie(TermStatus),
}

/// Job control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped(SigNum),
}

/// A job control change not yet collected by the parent's `waitpid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobReport {
    Stopped(SigNum),
    Continued,
}

impl ThreadGroup {
    pub(crate) fn new(
        pid: pid_t,
        parent: Weak<ThreadGroup>,
        pgid: pid_t,
        sid: pid_t,
        sig_dispositions: SigDispositions,
        credentials: Credentials,
    ) -> Self {
        let inner = ThreadGroupInner {
            threads: Queue::new(),
            nr_live: 0,
            status: GroupStatus::Live,
            exit_status: None,
            parent,
            children: Vec::new(),
            pgid,
            sid,
            job: JobState::Running,
            report: None,
        };
        Self {
            pid,
            inner: SpinLock::new(inner),
            sig_dispositions: SpinLock::new(sig_dispositions),
            credentials: SpinLock::new(credentials),
            child_cond: Cond::new(),
        }
    }

    pub fn pid(&self) -> pid_t {
        self.pid
    }

    #[track_caller]
    pub fn inner(&self) -> SpinLockGuard<'_, ThreadGroupInner> {
        self.inner.lock()
    }

    pub fn status(&self) -> GroupStatus {
        self.inner().status
    }

    pub fn is_zombie(&self) -> bool {
        matches!(self.status(), GroupStatus::Zombie(_))
    }

    pub fn parent(&self) -> Option<ThreadGroupRef> {
        self.inner().parent.upgrade()
    }

    pub fn pgid(&self) -> pid_t {
        self.inner().pgid
    }

    pub fn sid(&self) -> pid_t {
        self.inner().sid
    }

    /// The members, in the order they joined.
    pub fn threads(&self) -> Vec<ThreadRef> {
        self.inner().threads.iter().cloned().collect()
    }

    pub fn main_thread(&self) -> Option<ThreadRef> {
        self.inner().main_thread()
    }

    pub fn sig_dispositions(&self) -> &SpinLock<SigDispositions> {
        &self.sig_dispositions
    }

    pub fn credentials(&self) -> Credentials {
        *self.credentials.lock()
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.lock() = credentials;
    }

    pub fn child_cond(&self) -> &Cond {
        &self.child_cond
    }
}

impl ThreadGroupInner {
    pub fn threads(&self) -> &Queue<ThreadRef> {
        &self.threads
    }

    pub fn nr_live(&self) -> usize {
        self.nr_live
    }

    pub fn status(&self) -> GroupStatus {
        self.status
    }

    pub fn exit_status(&self) -> Option<TermStatus> {
        self.exit_status
    }

    pub fn parent(&self) -> Option<ThreadGroupRef> {
        self.parent.upgrade()
    }

    pub fn children(&self) -> &[ThreadGroupRef] {
        &self.children
    }

    pub fn pgid(&self) -> pid_t {
        self.pgid
    }

    pub fn sid(&self) -> pid_t {
        self.sid
    }

    pub fn job(&self) -> JobState {
        self.job
    }

    pub fn main_thread(&self) -> Option<ThreadRef> {
        self.threads.iter().find(|thread| thread.is_main()).cloned()
    }

    /// Add a member. Both locks must be held, the group's first.
    ///
    /// The first member of a group becomes its main thread.
    pub fn add_thread(&mut self, thread: &ThreadRef, thread_inner: &mut ThreadInner) -> Result<()> {
        if let GroupStatus::Zombie(_) = self.status {
            return_errno!(ESRCH, "the thread group has exited");
        }
        self.threads.enqueue(thread.clone(), true)?;
        if self.threads.len() == 1 {
            thread_inner.flags.insert(ThreadFlags::MAIN);
        }
        if !thread_inner.state().is_dead() {
            self.nr_live += 1;
        }
        Ok(())
    }

    /// Remove a member. Both locks must be held, the group's first.
    ///
    /// Returns whether the member was the main thread; if so, the caller
    /// must elect a new one with `elect_main` once the thread lock is gone.
    pub fn remove_thread(
        &mut self,
        thread: &ThreadRef,
        thread_inner: &mut ThreadInner,
    ) -> Result<bool> {
        if !self.threads.remove(thread) {
            return_errno!(ESRCH, "not a member of the thread group");
        }
        if !thread_inner.state().is_dead() {
            self.nr_live -= 1;
        }
        let was_main = thread_inner.flags.contains(ThreadFlags::MAIN);
        thread_inner.flags.remove(ThreadFlags::MAIN);
        Ok(was_main && !self.threads.is_empty())
    }

    /// Move MAIN by the leadership rule.
    ///
    /// Candidates are the members other than `skip`. The first of them by
    /// (alive before dead, not killed before killed, `prefer` before the
    /// others, lower TID) becomes main. Without candidates nothing changes.
    /// Locks each member in turn, so the caller must hold no thread lock.
    pub fn elect_main(&mut self, skip: Option<pid_t>, prefer: Option<pid_t>) -> Option<ThreadRef> {
        let winner = self
            .threads
            .iter()
            .filter(|thread| Some(thread.tid()) != skip)
            .min_by_key(|thread| {
                let inner = thread.inner();
                let preferred = Some(thread.tid()) == prefer;
                (inner.state().is_dead(), inner.is_killed(), !preferred, thread.tid())
            })
            .cloned()?;
        for thread in self.threads.iter() {
            let mut inner = thread.inner();
            if Arc::ptr_eq(thread, &winner) {
                inner.flags.insert(ThreadFlags::MAIN);
            } else {
                inner.flags.remove(ThreadFlags::MAIN);
            }
        }
        Some(winner)
    }

    /// Account for a member that is about to become a zombie.
    ///
    /// Returns the group's final status if it was the last live member.
    pub(crate) fn thread_exited(&mut self, status: TermStatus) -> Option<TermStatus> {
        assert!(self.nr_live > 0, "more threads exited than lived");
        self.nr_live -= 1;
        if self.nr_live > 0 {
            return None;
        }
        let status = self.exit_status.unwrap_or(status);
        self.status = GroupStatus::Zombie(status);
        Some(status)
    }

    /// Record the status every member exits with. The first exit wins.
    pub(crate) fn set_exit_status(&mut self, status: TermStatus) -> TermStatus {
        *self.exit_status.get_or_insert(status)
    }

    pub(crate) fn set_parent(&mut self, parent: Weak<ThreadGroup>) {
        self.parent = parent;
    }

    pub(crate) fn add_child(&mut self, child: ThreadGroupRef) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, pid: pid_t) -> Option<ThreadGroupRef> {
        let idx = self.children.iter().position(|child| child.pid() == pid)?;
        Some(self.children.remove(idx))
    }

    pub(crate) fn take_children(&mut self) -> Vec<ThreadGroupRef> {
        std::mem::take(&mut self.children)
    }

    pub(crate) fn set_pgid(&mut self, pgid: pid_t) {
        self.pgid = pgid;
    }

    pub(crate) fn set_sid(&mut self, sid: pid_t) {
        self.sid = sid;
    }

    pub(crate) fn set_job(&mut self, job: JobState) {
        self.job = job;
    }

    pub(crate) fn set_report(&mut self, report: Option<JobReport>) {
        self.report = report;
    }

    pub(crate) fn report(&self) -> Option<JobReport> {
        self.report
    }
}

impl PartialEq for ThreadGroup {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
    }
}

impl fmt::Debug for ThreadGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ThreadGroup");
        s.field("pid", &self.pid);
        match self.inner.try_lock() {
            Some(inner) => s
                .field("threads", &inner.threads.iter().map(|t| t.tid()).collect::<Vec<_>>())
                .field("status", &inner.status)
                .field("pgid", &inner.pgid)
                .field("sid", &inner.sid),
            None => s.field("inner", &"<locked>"),
        };
        s.finish()
    }
}

/// Which members `Kernel::tgroup_kill_thread` kills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillTarget {
    /// Every member except the caller
    All,
    Tid(pid_t),
}

impl KillTarget {
    /// `-1` means every member; a positive value is a TID.
    pub fn from_raw(tid: i32) -> Result<Self> {
        match tid {
            -1 => Ok(KillTarget::All),
            tid if tid > 0 => Ok(KillTarget::Tid(tid as pid_t)),
            _ => return_errno!(EINVAL, "invalid kill target"),
        }
    }
}

/// Which member `Kernel::tgroup_get_thread` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadSelector {
    Tid(pid_t),
    /// The first member in the given state
    InState(ThreadState),
    /// Any member, the main thread if there is one
    Any,
}

impl ThreadSelector {
    /// A positive value is a TID, `0` selects by `state` and `-1` selects
    /// any member.
    pub fn from_raw(tid: i32, state: ThreadState) -> Result<Self> {
        match tid {
            -1 => Ok(ThreadSelector::Any),
            0 => Ok(ThreadSelector::InState(state)),
            tid if tid > 0 => Ok(ThreadSelector::Tid(tid as pid_t)),
            _ => return_errno!(EINVAL, "invalid thread selector"),
        }
    }
}
