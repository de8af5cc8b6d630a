//! Process groups and sessions.
//!
//! Membership changes hold the process group table and then the session
//! table for their whole duration. Below them come the thread group table
//! and the pid allocator, then a process group, then a thread group.

use std::fmt;

use super::{current, Session, SessionRef, Table, ThreadGroupRef};
use crate::kernel::Kernel;
use crate::prelude::*;

pub type ProcessGrpRef = Arc<ProcessGrp>;

pub struct ProcessGrp {
    pgid: pid_t,
    sid: pid_t,
    members: SpinLock<HashMap<pid_t, ThreadGroupRef>>,
}

impl ProcessGrp {
    fn new(pgid: pid_t, sid: pid_t) -> Self {
        Self {
            pgid,
            sid,
            members: SpinLock::new(HashMap::new()),
        }
    }

    pub fn pgid(&self) -> pid_t {
        self.pgid
    }

    pub fn sid(&self) -> pid_t {
        self.sid
    }

    /// The member thread groups, ordered by pid.
    pub fn members(&self) -> Vec<ThreadGroupRef> {
        let mut members: Vec<ThreadGroupRef> = self.members.lock().values().cloned().collect();
        members.sort_unstable_by_key(|group| group.pid());
        members
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }
}

impl fmt::Debug for ProcessGrp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pids: Vec<pid_t> = self.members().iter().map(|group| group.pid()).collect();
        f.debug_struct("ProcessGrp")
            .field("pgid", &self.pgid)
            .field("sid", &self.sid)
            .field("members", &pids)
            .finish()
    }
}

impl Kernel {
    /// Move a thread group into another process group.
    ///
    /// `pid == 0` means the caller's group and `pgid == 0` means `pid`. The
    /// target must be the caller or one of its children. A new process group
    /// is created when `pgid` equals the target's pid; otherwise `pgid` must
    /// name a group in the target's session.
    pub fn setpgid(&self, pid: pid_t, pgid: i32) -> Result<()> {
        if pgid < 0 {
            return_errno!(EINVAL, "negative pgid");
        }
        let caller = self.current_tgroup()?;
        let pid = if pid == 0 { caller.pid() } else { pid };
        let pgid = if pgid == 0 { pid } else { pgid as pid_t };
        debug!("setpgid: pid = {}, pgid = {}", pid, pgid);

        let target = self.tgroups.lock().get(pid)?;
        let is_child = target
            .parent()
            .map_or(false, |parent| parent.pid() == caller.pid());
        if target.pid() != caller.pid() && !is_child {
            return_errno!(ESRCH, "neither the caller nor its child");
        }

        let mut pgrps = self.pgrps.lock();
        let mut sessions = self.sessions.lock();
        let (old_pgid, sid) = {
            let inner = target.inner();
            (inner.pgid(), inner.sid())
        };
        if sid == target.pid() {
            return_errno!(EPERM, "a session leader cannot change its process group");
        }
        if pgid != target.pid() {
            let pgrp = pgrps
                .get(pgid)
                .map_err(|_| errno!(EPERM, "no such process group"))?;
            if pgrp.sid() != sid {
                return_errno!(EPERM, "the process group is in another session");
            }
        }
        if old_pgid == pgid {
            return Ok(());
        }

        let released = self.pgrp_remove(&mut pgrps, &mut sessions, &target);
        self.pgrp_insert(&mut pgrps, &mut sessions, &target, pgid, sid);
        self.release_ids(&pgrps, &sessions, released);
        Ok(())
    }

    /// `pid == 0` means the caller's group.
    pub fn getpgid(&self, pid: pid_t) -> Result<pid_t> {
        let group = self.lookup_tgroup(pid)?;
        Ok(group.pgid())
    }

    /// Make the caller's group the leader of a new session and of a new
    /// process group in it. Returns the new sid.
    pub fn setsid(&self) -> Result<pid_t> {
        let caller = self.current_tgroup()?;
        let pid = caller.pid();

        let mut pgrps = self.pgrps.lock();
        let mut sessions = self.sessions.lock();
        if pgrps.contains(pid) {
            return_errno!(EPERM, "the caller already leads a process group");
        }
        let released = self.pgrp_remove(&mut pgrps, &mut sessions, &caller);
        self.pgrp_insert(&mut pgrps, &mut sessions, &caller, pid, pid);
        self.release_ids(&pgrps, &sessions, released);
        info!("thread group {} starts session {}", pid, pid);
        Ok(pid)
    }

    /// `pid == 0` means the caller's group.
    pub fn getsid(&self, pid: pid_t) -> Result<pid_t> {
        let group = self.lookup_tgroup(pid)?;
        Ok(group.sid())
    }

    pub fn pgrp_get(&self, pgid: pid_t) -> Result<ProcessGrpRef> {
        self.pgrps.lock().get(pgid)
    }

    pub fn session_get(&self, sid: pid_t) -> Result<SessionRef> {
        self.sessions.lock().get(sid)
    }

    /// Put a new thread group into its process group, creating the group
    /// and the session if they do not exist yet.
    pub(crate) fn pgrp_join(&self, group: &ThreadGroupRef, pgid: pid_t, sid: pid_t) {
        let mut pgrps = self.pgrps.lock();
        let mut sessions = self.sessions.lock();
        self.pgrp_insert(&mut pgrps, &mut sessions, group, pgid, sid);
    }

    /// Take a thread group out of the thread group table and its process
    /// group, and give back the IDs nothing goes by any more.
    pub(crate) fn tgroup_unlink(&self, group: &ThreadGroupRef) {
        let mut pgrps = self.pgrps.lock();
        let mut sessions = self.sessions.lock();
        if self.tgroups.lock().del(group.pid()).is_ok() {
            debug!("thread group {} unlinked", group.pid());
        }
        let mut released = self.pgrp_remove(&mut pgrps, &mut sessions, group);
        released.push(group.pid());
        self.release_ids(&pgrps, &sessions, released);
    }

    fn pgrp_insert(
        &self,
        pgrps: &mut Table<ProcessGrpRef>,
        sessions: &mut Table<SessionRef>,
        group: &ThreadGroupRef,
        pgid: pid_t,
        sid: pid_t,
    ) {
        let pgrp = match pgrps.get(pgid) {
            Ok(pgrp) => pgrp,
            Err(_) => {
                let pgrp = Arc::new(ProcessGrp::new(pgid, sid));
                // Cannot fail: the lookup just missed under the same lock
                let _ = pgrps.add(pgid, pgrp.clone());
                let session = match sessions.get(sid) {
                    Ok(session) => session,
                    Err(_) => {
                        let session = Arc::new(Session::new(sid));
                        let _ = sessions.add(sid, session.clone());
                        debug!("session {} created", sid);
                        session
                    }
                };
                session.add_pgrp(pgid);
                debug!("process group {} created in session {}", pgid, sid);
                pgrp
            }
        };
        pgrp.members.lock().insert(group.pid(), group.clone());
        let mut group_inner = group.inner();
        group_inner.set_pgid(pgid);
        group_inner.set_sid(sid);
    }

    // Returns the IDs of the process group and session it deleted.
    fn pgrp_remove(
        &self,
        pgrps: &mut Table<ProcessGrpRef>,
        sessions: &mut Table<SessionRef>,
        group: &ThreadGroupRef,
    ) -> Vec<pid_t> {
        let (pgid, sid) = {
            let inner = group.inner();
            (inner.pgid(), inner.sid())
        };
        let pgrp = match pgrps.get(pgid) {
            Ok(pgrp) => pgrp,
            Err(_) => return Vec::new(),
        };
        let now_empty = {
            let mut members = pgrp.members.lock();
            members.remove(&group.pid());
            members.is_empty()
        };
        if !now_empty {
            return Vec::new();
        }

        let _ = pgrps.del(pgid);
        debug!("process group {} deleted", pgid);
        let mut deleted = vec![pgid];
        if let Ok(session) = sessions.get(sid) {
            if session.remove_pgrp(pgid) {
                let _ = sessions.del(sid);
                debug!("session {} deleted", sid);
                deleted.push(sid);
            }
        }
        deleted
    }

    // An ID is shared by a thread group, its process group and its session.
    // Each one is freed once, when its last user has gone; the callers hold
    // both tables so no user can appear or vanish meanwhile.
    fn release_ids(
        &self,
        pgrps: &Table<ProcessGrpRef>,
        sessions: &Table<SessionRef>,
        mut ids: Vec<pid_t>,
    ) {
        ids.sort_unstable();
        ids.dedup();
        let tgroups = self.tgroups.lock();
        let mut pids = self.pids.lock();
        for id in ids {
            if pgrps.contains(id) || sessions.contains(id) || tgroups.contains(id) {
                continue;
            }
            if pids.free(id).is_some() {
                trace!("pid {} freed", id);
            }
        }
    }

    pub(crate) fn current_tgroup(&self) -> Result<ThreadGroupRef> {
        current::get()
            .tgroup()
            .ok_or_else(|| errno!(ESRCH, "the caller has no thread group"))
    }

    fn lookup_tgroup(&self, pid: pid_t) -> Result<ThreadGroupRef> {
        if pid == 0 {
            return self.current_tgroup();
        }
        self.tgroups.lock().get(pid)
    }
}
